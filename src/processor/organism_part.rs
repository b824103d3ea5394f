//! Strips anatomical and positional qualifiers: `left kidney` -> `kidney`.

use super::{ProcessorKind, SearchStringProcessor, remove_phrase, type_is_one_of};
use crate::dictionary::Dictionary;
use crate::normalize::collapse_whitespace;

const ORGANISM_PART_TYPES: &[&str] = &["organism part", "organismpart"];

#[derive(Debug, Clone)]
pub struct OrganismPartProcessor {
    qualifiers: Vec<String>,
    boost: f64,
}

impl OrganismPartProcessor {
    pub fn new(qualifiers: Dictionary, boost: f64) -> Self {
        let mut qualifiers = qualifiers.entries().to_vec();
        qualifiers.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { qualifiers, boost }
    }
}

impl SearchStringProcessor for OrganismPartProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::OrganismPart
    }

    fn boost_factor(&self) -> f64 {
        self.boost
    }

    fn can_process(&self, _text: &str, property_type: Option<&str>) -> bool {
        type_is_one_of(property_type, ORGANISM_PART_TYPES)
    }

    fn process(&self, text: &str) -> Vec<String> {
        let original = collapse_whitespace(&text.to_lowercase());
        let mut current = original.clone();
        for qualifier in &self.qualifiers {
            if let Some(next) = remove_phrase(&current, qualifier) {
                current = next;
            }
        }
        if current.is_empty() || current == original {
            Vec::new()
        } else {
            vec![current]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> OrganismPartProcessor {
        OrganismPartProcessor::new(Dictionary::from_entries(["left", "left side", "upper", "lobe"]), 0.9)
    }

    #[test]
    fn synonymous_type_spellings() {
        let p = processor();
        for t in ["organism_part", "organism part", "OrganismPart", "Organism Part"] {
            assert!(p.can_process("x", Some(t)), "{t}");
        }
        assert!(!p.can_process("x", Some("cell type")));
    }

    #[test]
    fn strips_qualifiers() {
        let p = processor();
        assert_eq!(p.process("Left Kidney"), vec!["kidney".to_string()]);
        assert_eq!(p.process("upper lung left side"), vec!["lung".to_string()]);
    }

    #[test]
    fn only_qualifiers_or_none_yields_nothing() {
        let p = processor();
        assert!(p.process("upper lobe").is_empty());
        assert!(p.process("kidney").is_empty());
    }
}
