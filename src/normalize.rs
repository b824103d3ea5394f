//! String normalization for approximate matching.
//!
//! Lowercases, drops stop words and collapses separator punctuation, while
//! keeping parentheses that belong to compound-like tokens such as
//! `interleukin(il)-2` or `(r)-warfarin`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// `(...)` immediately followed by a non-space character.
static RE_COMPOUND_TRAILING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^()]{1,100}\)\S").expect("valid compound regex"));

/// A non-space character immediately followed by `(...)`.
static RE_COMPOUND_LEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S\([^()]{1,100}\)").expect("valid compound regex"));

static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Whether the parentheses in `text` look like part of a chemical-compound token.
///
/// Best-effort heuristic: a bracket group glued to a neighbouring non-space
/// character on either side.
pub fn is_compound(text: &str) -> bool {
    RE_COMPOUND_TRAILING.is_match(text) || RE_COMPOUND_LEADING.is_match(text)
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Prepares patterns and dictionary values for approximate comparison.
#[derive(Debug, Clone)]
pub struct StringNormalizer {
    stop_words: HashSet<String>,
}

impl StringNormalizer {
    pub fn new(stop_words: HashSet<String>) -> Self {
        Self { stop_words }
    }

    /// Lowercase, remove stop words, then collapse separators.
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let without_stop_words = self.remove_stop_words(&lowered);
        remove_separators(&without_stop_words)
    }

    /// Drop whitespace-delimited tokens that are stop words.
    pub fn remove_stop_words(&self, text: &str) -> String {
        text.split_whitespace()
            .filter(|token| !self.stop_words.contains(*token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Replace separator punctuation with spaces, keeping compound brackets.
pub fn remove_separators(text: &str) -> String {
    let mut out = text.replace(", ", " ").replace(" _ ", " ").replace(" - ", " ");
    if !is_compound(&out) {
        out = out.replace(" (", " ").replace(") ", " ");
        if let Some(stripped) = out.strip_suffix(')') {
            out = stripped.to_string();
        }
        if let Some(stripped) = out.strip_prefix('(') {
            out = stripped.to_string();
        }
    }
    collapse_whitespace(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> StringNormalizer {
        StringNormalizer::new(["the", "of", "in"].into_iter().map(String::from).collect())
    }

    #[test]
    fn lowercases_and_drops_stop_words() {
        assert_eq!(normalizer().normalize("Cancer of the Liver"), "cancer liver");
    }

    #[test]
    fn collapses_separators() {
        assert_eq!(normalizer().normalize("liver , kidney - lung _ heart"), "liver kidney lung heart");
        assert_eq!(normalizer().normalize("blood, serum"), "blood serum");
    }

    #[test]
    fn strips_free_standing_brackets() {
        assert_eq!(normalizer().normalize("liver (adult) tissue"), "liver adult tissue");
        assert_eq!(normalizer().normalize("liver (adult)"), "liver adult");
    }

    #[test]
    fn keeps_compound_brackets() {
        assert!(is_compound("interleukin(il)-2"));
        assert!(is_compound("(r)-warfarin"));
        assert!(!is_compound("liver (adult) tissue"));
        assert_eq!(normalizer().normalize("Interleukin(IL)-2 treated"), "interleukin(il)-2 treated");
    }

    #[test]
    fn empty_in_empty_out() {
        assert_eq!(normalizer().normalize(""), "");
        assert_eq!(normalizer().normalize("   "), "");
    }
}
