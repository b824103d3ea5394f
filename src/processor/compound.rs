//! Strips dose quantities and concentration units from compound names.
//!
//! `metformin 50 milligram per kilogram` -> `metformin`. When no unit matches
//! exactly, leading/trailing word runs are compared against the unit
//! dictionary allowing one edit, which catches plurals like `milligrams`.

use std::sync::LazyLock;

use regex::Regex;

use super::{ProcessorKind, SearchStringProcessor, remove_phrase, type_is_one_of};
use crate::dictionary::Dictionary;
use crate::normalize::collapse_whitespace;

const COMPOUND_TYPES: &[&str] = &["compound", "compounds", "growth condition"];

/// A number followed by whitespace; digits glued to letters (`indole-3-acetic`) are left alone.
static RE_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)\d{1,10}(?:\.\d{1,10})?\s").expect("valid quantity regex"));

/// Units shorter than this are abbreviations and never fuzzy-matched.
const MIN_FUZZY_UNIT_LEN: usize = 3;

#[derive(Debug, Clone)]
pub struct CompoundProcessor {
    /// Longest first, so multi-word units win over their prefixes.
    units: Vec<String>,
    boost: f64,
}

impl CompoundProcessor {
    pub fn new(units: Dictionary, boost: f64) -> Self {
        let mut units = units.entries().to_vec();
        units.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { units, boost }
    }

    fn strip_units(&self, text: &str) -> Option<String> {
        let mut current = text.to_string();
        let mut removed = false;
        for unit in &self.units {
            if let Some(next) = remove_phrase(&current, unit) {
                current = next;
                removed = true;
            }
        }
        removed.then_some(current)
    }

    fn strip_fuzzy_unit(&self, text: &str) -> Option<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() < 2 {
            return None;
        }
        // Drop 1..=3 leading words, then 1..=3 trailing words.
        let max_drop = (words.len() - 1).min(3);
        let mut candidates: Vec<(String, String)> = Vec::new();
        for k in 1..=max_drop {
            candidates.push((words[k..].join(" "), words[..k].join(" ")));
        }
        for k in 1..=max_drop {
            candidates.push((words[..words.len() - k].join(" "), words[words.len() - k..].join(" ")));
        }
        candidates.into_iter().find_map(|(candidate, rest)| {
            let hit = self
                .units
                .iter()
                .filter(|u| u.chars().count() >= MIN_FUZZY_UNIT_LEN)
                .any(|u| strsim::levenshtein(&candidate, u) <= 1);
            hit.then_some(rest)
        })
    }
}

impl SearchStringProcessor for CompoundProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Compound
    }

    fn boost_factor(&self) -> f64 {
        self.boost
    }

    fn can_process(&self, _text: &str, property_type: Option<&str>) -> bool {
        type_is_one_of(property_type, COMPOUND_TYPES)
    }

    fn process(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let without_quantity = match RE_QUANTITY.find(&lowered) {
            Some(m) => format!("{} {}", &lowered[..m.start()], &lowered[m.end()..]),
            None => lowered.clone(),
        };
        let without_quantity = collapse_whitespace(&without_quantity);

        let processed = self
            .strip_units(&without_quantity)
            .or_else(|| self.strip_fuzzy_unit(&without_quantity))
            .unwrap_or(without_quantity);

        if processed.is_empty() || processed == collapse_whitespace(&lowered) {
            Vec::new()
        } else {
            vec![processed]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> CompoundProcessor {
        CompoundProcessor::new(
            Dictionary::from_entries(["milligram per kilogram", "micromolar", "mg", "molar"]),
            0.95,
        )
    }

    #[test]
    fn applies_only_to_compound_types() {
        let p = processor();
        assert!(p.can_process("x", Some("compound")));
        assert!(p.can_process("x", Some("growth_condition")));
        assert!(!p.can_process("x", Some("organism")));
        assert!(!p.can_process("x", None));
    }

    #[test]
    fn strips_quantity_and_exact_unit() {
        let p = processor();
        assert_eq!(p.process("Metformin 50 milligram per kilogram"), vec!["metformin".to_string()]);
        assert_eq!(p.process("cisplatin 2.5 micromolar"), vec!["cisplatin".to_string()]);
    }

    #[test]
    fn prefers_longest_unit() {
        let p = processor();
        // "molar" alone must not eat part of "micromolar".
        assert_eq!(p.process("nacl 10 micromolar"), vec!["nacl".to_string()]);
    }

    #[test]
    fn fuzzy_matches_plural_units() {
        let p = processor();
        assert_eq!(p.process("metformin 50 milligrams per kilogram"), vec!["metformin".to_string()]);
    }

    #[test]
    fn leaves_numbers_inside_names() {
        let p = processor();
        assert!(p.process("indole-3-acetic acid").is_empty());
    }

    #[test]
    fn unchanged_text_yields_nothing() {
        let p = processor();
        assert!(p.process("aspirin").is_empty());
    }
}
