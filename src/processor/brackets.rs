//! Removes a free-standing `(...)` group, e.g. `liver (adult)` -> `liver`.

use super::{ProcessorKind, SearchStringProcessor};
use crate::normalize::{collapse_whitespace, is_compound};

#[derive(Debug, Clone)]
pub struct BracketsProcessor {
    boost: f64,
}

impl BracketsProcessor {
    pub fn new(boost: f64) -> Self {
        Self { boost }
    }
}

impl SearchStringProcessor for BracketsProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Brackets
    }

    fn boost_factor(&self) -> f64 {
        self.boost
    }

    fn can_process(&self, text: &str, _property_type: Option<&str>) -> bool {
        text.contains('(') && text.contains(')') && !is_compound(text)
    }

    fn process(&self, text: &str) -> Vec<String> {
        let Some(open) = text.find('(') else {
            return Vec::new();
        };
        let Some(close) = text[open..].find(')').map(|i| open + i) else {
            return Vec::new();
        };
        let processed = collapse_whitespace(&format!("{} {}", &text[..open], &text[close + 1..]));
        if processed.is_empty() || processed == text {
            Vec::new()
        } else {
            vec![processed]
        }
    }
}
