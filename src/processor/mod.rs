//! Search-string processors: pluggable rewrites for queries that found nothing.
//!
//! Each processor declares whether it applies to a (text, property type) pair
//! and, if so, produces alternative search strings plus a boost factor that
//! discounts results found through the rewrite.

pub mod brackets;
pub mod compound;
pub mod organism_part;
pub mod splitter;
pub mod time;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ProcessorConfig;
use crate::dictionary::Dictionaries;

pub use brackets::BracketsProcessor;
pub use compound::CompoundProcessor;
pub use organism_part::OrganismPartProcessor;
pub use splitter::SplitterProcessor;
pub use time::TimeProcessor;

/// A strategy that rewrites a search string into alternates likely to match.
pub trait SearchStringProcessor: Send + Sync + std::fmt::Debug {
    /// Which processor this is.
    fn kind(&self) -> ProcessorKind;

    /// Discount in `(0, 1]` applied to results found through this processor.
    fn boost_factor(&self) -> f64;

    /// Whether this processor applies to `text` given its property type.
    fn can_process(&self, text: &str, property_type: Option<&str>) -> bool;

    /// Alternate search strings; empty when the rewrite changes nothing.
    fn process(&self, text: &str) -> Vec<String>;
}

/// The available processors, by configuration name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    Brackets,
    Compound,
    OrganismPart,
    Time,
    Splitter,
}

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 5] = [
        ProcessorKind::Brackets,
        ProcessorKind::Compound,
        ProcessorKind::OrganismPart,
        ProcessorKind::Time,
        ProcessorKind::Splitter,
    ];
}

impl std::fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Brackets => write!(f, "brackets"),
            Self::Compound => write!(f, "compound"),
            Self::OrganismPart => write!(f, "organism_part"),
            Self::Time => write!(f, "time"),
            Self::Splitter => write!(f, "splitter"),
        }
    }
}

impl FromStr for ProcessorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.to_string() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown processor \"{s}\""))
    }
}

/// Lowercase a property type and treat underscores as spaces.
pub(crate) fn normalize_type(property_type: &str) -> String {
    property_type.trim().to_lowercase().replace('_', " ")
}

/// Whether `property_type` names one of `accepted` (already normalized).
pub(crate) fn type_is_one_of(property_type: Option<&str>, accepted: &[&str]) -> bool {
    property_type
        .map(normalize_type)
        .is_some_and(|t| accepted.contains(&t.as_str()))
}

/// Remove every whole-word occurrence of `phrase` from `text`.
///
/// Returns `None` when the phrase does not occur.
pub(crate) fn remove_phrase(text: &str, phrase: &str) -> Option<String> {
    let padded = format!(" {text} ");
    let needle = format!(" {phrase} ");
    if !padded.contains(&needle) {
        return None;
    }
    let mut out = padded;
    while out.contains(&needle) {
        out = out.replacen(&needle, " ", 1);
    }
    Some(crate::normalize::collapse_whitespace(&out))
}

/// Instantiate the configured processors, in configured order.
pub fn build_processors(
    config: &ProcessorConfig,
    dictionaries: &Dictionaries,
) -> Vec<Box<dyn SearchStringProcessor>> {
    config
        .enabled
        .iter()
        .map(|kind| -> Box<dyn SearchStringProcessor> {
            match kind {
                ProcessorKind::Brackets => Box::new(BracketsProcessor::new(config.brackets_boost)),
                ProcessorKind::Compound => Box::new(CompoundProcessor::new(
                    dictionaries.units.clone(),
                    config.compound_boost,
                )),
                ProcessorKind::OrganismPart => Box::new(OrganismPartProcessor::new(
                    dictionaries.qualifiers.clone(),
                    config.organism_part_boost,
                )),
                ProcessorKind::Time => Box::new(TimeProcessor::new(config.time_boost)),
                ProcessorKind::Splitter => Box::new(SplitterProcessor::new(config.splitter_boost)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip_through_config_strings() {
        for kind in ProcessorKind::ALL {
            assert_eq!(kind.to_string().parse::<ProcessorKind>().unwrap(), kind);
        }
        assert!("stemmer".parse::<ProcessorKind>().is_err());
    }

    #[test]
    fn remove_phrase_matches_whole_words_only() {
        assert_eq!(remove_phrase("left kidney", "left").as_deref(), Some("kidney"));
        assert_eq!(remove_phrase("cleft palate", "left"), None);
        assert_eq!(
            remove_phrase("metformin milligram per kilogram", "milligram per kilogram").as_deref(),
            Some("metformin")
        );
    }

    #[test]
    fn type_matching_folds_case_and_underscores() {
        assert!(type_is_one_of(Some("Growth_Condition"), &["growth condition"]));
        assert!(!type_is_one_of(None, &["growth condition"]));
    }

    #[test]
    fn default_config_builds_all_processors_in_order() {
        let processors = build_processors(&ProcessorConfig::default(), &Dictionaries::bundled());
        let kinds: Vec<_> = processors.iter().map(|p| p.kind()).collect();
        assert_eq!(kinds, ProcessorKind::ALL.to_vec());
    }
}
