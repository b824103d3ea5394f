//! Strips numbers, intervals and time spans from time-like values.
//!
//! Patterns are tried in priority order: float interval, integer interval,
//! float, integer. A time unit directly after the number is removed with it
//! (`liver biopsy 24 hours` -> `liver biopsy`) unless that would leave
//! nothing, in which case only the number goes (`3-4 days` -> `days`).

use std::sync::LazyLock;

use regex::Regex;

use super::{ProcessorKind, SearchStringProcessor, type_is_one_of};
use crate::normalize::collapse_whitespace;

const TIME_TYPES: &[&str] = &[
    "time",
    "time unit",
    "timeunit",
    "age",
    "derived time unit",
    "time derived unit",
    "period",
];

const FLOAT: &str = r"\d{1,10}\.\d{1,10}";
const INT: &str = r"\d{1,10}";
const UNIT: &str = r"(?:\s{0,2}(?:seconds?|secs?|minutes?|mins?|hours?|hrs?|h|days?|d|weeks?|wks?|months?|years?|yrs?|y)\b)";

/// (number only, number with trailing unit), in priority order.
static PATTERNS: LazyLock<Vec<(Regex, Regex)>> = LazyLock::new(|| {
    let interval = |n: &str| format!(r"{n}\s{{0,2}}(?:-|to)\s{{0,2}}{n}");
    [interval(FLOAT), interval(INT), FLOAT.to_string(), INT.to_string()]
        .into_iter()
        .map(|core| {
            let bare = Regex::new(&format!(r"\b{core}\b")).expect("valid time regex");
            let with_unit = Regex::new(&format!(r"\b{core}{UNIT}")).expect("valid time regex");
            (bare, with_unit)
        })
        .collect()
});

#[derive(Debug, Clone)]
pub struct TimeProcessor {
    boost: f64,
}

impl TimeProcessor {
    pub fn new(boost: f64) -> Self {
        Self { boost }
    }
}

fn cut(text: &str, m: regex::Match<'_>) -> String {
    collapse_whitespace(&format!("{} {}", &text[..m.start()], &text[m.end()..]))
}

impl SearchStringProcessor for TimeProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Time
    }

    fn boost_factor(&self) -> f64 {
        self.boost
    }

    fn can_process(&self, _text: &str, property_type: Option<&str>) -> bool {
        type_is_one_of(property_type, TIME_TYPES)
    }

    fn process(&self, text: &str) -> Vec<String> {
        for (bare, with_unit) in PATTERNS.iter() {
            let Some(number) = bare.find(text) else {
                continue;
            };
            let mut processed = with_unit
                .find(text)
                .map(|m| cut(text, m))
                .unwrap_or_default();
            if processed.is_empty() {
                processed = cut(text, number);
            }
            if processed.is_empty() || processed == text {
                return Vec::new();
            }
            return vec![processed];
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_to_time_types() {
        let p = TimeProcessor::new(0.95);
        for t in ["time", "Time_Unit", "age", "period", "derived time unit"] {
            assert!(p.can_process("x", Some(t)), "{t}");
        }
        assert!(!p.can_process("x", Some("organism")));
    }

    #[test]
    fn strips_number_with_unit() {
        let p = TimeProcessor::new(0.95);
        assert_eq!(p.process("liver biopsy 24 hours"), vec!["liver biopsy".to_string()]);
        assert_eq!(p.process("post infection 12.5 h"), vec!["post infection".to_string()]);
    }

    #[test]
    fn interval_beats_plain_number() {
        let p = TimeProcessor::new(0.95);
        assert_eq!(p.process("growth 3-4 days old"), vec!["growth old".to_string()]);
        assert_eq!(p.process("stage 2 to 3 weeks"), vec!["stage".to_string()]);
    }

    #[test]
    fn keeps_unit_when_nothing_else_remains() {
        let p = TimeProcessor::new(0.95);
        assert_eq!(p.process("3-4 days"), vec!["days".to_string()]);
    }

    #[test]
    fn no_number_no_alternate() {
        let p = TimeProcessor::new(0.95);
        assert!(p.process("adult").is_empty());
        assert!(p.process("12").is_empty());
    }
}
