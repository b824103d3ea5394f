//! Text analysis shared by indexing and querying.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::normalize::collapse_whitespace;

/// Runs of letters and digits; `.` and `'` are kept between alphanumerics (`12.5`, `crohn's`).
///
/// Shared with the index tokenizer so indexed and queried terms agree.
pub const TOKEN_PATTERN: &str = r"[\p{L}\p{N}]+(?:[.'][\p{L}\p{N}]+)*";

static RE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(TOKEN_PATTERN).expect("valid token regex"));

/// Unicode compatibility folding plus lowercasing.
pub fn fold(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Split text into index terms.
pub fn tokenize(text: &str) -> Vec<String> {
    let folded = fold(text);
    RE_TOKEN
        .find_iter(&folded)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The whole value as a single term, for exact and keyword matching.
pub fn keyword(text: &str) -> String {
    collapse_whitespace(&fold(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_lowercased_alphanumeric_runs() {
        assert_eq!(tokenize("Homo Sapiens"), vec!["homo", "sapiens"]);
        assert_eq!(tokenize("liver, (adult) 12.5 h"), vec!["liver", "adult", "12.5", "h"]);
        assert_eq!(tokenize("Crohn's disease"), vec!["crohn's", "disease"]);
        assert!(tokenize("!!! --- ()").is_empty());
    }

    #[test]
    fn compatibility_folding() {
        // Full-width letters fold to ASCII.
        assert_eq!(tokenize("\u{FF28}\u{FF25}\u{FF2C}\u{FF21}"), vec!["hela"]);
    }

    #[test]
    fn keyword_keeps_punctuation() {
        assert_eq!(keyword("  Breast   Cancer (Stage II) "), "breast cancer (stage ii)");
    }
}
