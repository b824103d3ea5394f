//! Splits a conjunction into its two halves: `cancer and diabetes` -> `cancer`, `diabetes`.

use super::{ProcessorKind, SearchStringProcessor};

const CONJUNCTION: &str = " and ";

#[derive(Debug, Clone)]
pub struct SplitterProcessor {
    boost: f64,
}

impl SplitterProcessor {
    pub fn new(boost: f64) -> Self {
        Self { boost }
    }
}

impl SearchStringProcessor for SplitterProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Splitter
    }

    /// Also the discount applied when the two halves are merged back together.
    fn boost_factor(&self) -> f64 {
        self.boost
    }

    fn can_process(&self, text: &str, _property_type: Option<&str>) -> bool {
        text.matches(CONJUNCTION).count() == 1
    }

    fn process(&self, text: &str) -> Vec<String> {
        let parts: Vec<String> = text.split(CONJUNCTION).map(|p| p.trim().to_string()).collect();
        if parts.len() == 2 && parts.iter().all(|p| !p.is_empty()) {
            parts
        } else {
            Vec::new()
        }
    }
}
