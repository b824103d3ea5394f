//! Engine configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) yields a working
//! engine. The configuration is immutable once the engine is constructed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::approximate::SimilarityFilter;
use crate::error::ConfigError;
use crate::processor::ProcessorKind;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub scoring: ScoringConfig,
    pub processors: ProcessorConfig,
    pub approximate: ApproximateConfig,
    pub origin: OriginConfig,
    pub index: IndexConfig,
    pub prediction: PredictionConfig,
    pub dictionaries: DictionaryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Extra positions allowed between the words of a multi-word pattern.
    pub proximity_slop: u32,
    /// Weight of the value match inside a type-qualified query.
    pub typed_value_boost: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            proximity_slop: 1,
            typed_value_boost: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Rescale scores into `[window_center, window_center + window_half_width]`.
    pub calibrate: bool,
    pub window_center: f64,
    pub window_half_width: f64,
    /// Rank assumed for the weakest plausible hit when calibrating.
    pub calibration_worst_rank: usize,
    /// Source uris, most preferred first.
    pub source_ranking: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            calibrate: true,
            window_center: 50.0,
            window_half_width: 50.0,
            calibration_worst_rank: 200,
            source_ranking: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Processors to consult, in order.
    pub enabled: Vec<ProcessorKind>,
    pub brackets_boost: f64,
    pub compound_boost: f64,
    pub organism_part_boost: f64,
    pub time_boost: f64,
    /// Also the discount applied to merged split results.
    pub splitter_boost: f64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            enabled: ProcessorKind::ALL.to_vec(),
            brackets_boost: 0.95,
            compound_boost: 0.95,
            organism_part_boost: 0.9,
            time_boost: 0.95,
            splitter_boost: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproximateConfig {
    pub enabled: bool,
    /// Results whose best score is below this count as poor and trigger the approximate stage.
    pub poor_score: f64,
    /// Needleman-Wunsch pass.
    pub alignment: SimilarityFilter,
    /// Jaccard fallback pass.
    pub token_set: SimilarityFilter,
}

impl Default for ApproximateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poor_score: 0.0,
            alignment: SimilarityFilter {
                min_score: 0.90,
                max_results: 1,
                pct_cutoff: 0.0,
            },
            token_set: SimilarityFilter {
                min_score: 0.525,
                max_results: 1,
                pct_cutoff: 0.999,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Multiplier for results from a preferred origin.
    pub boost: f64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self { boost: 1.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Annotations per build chunk.
    pub chunk_size: usize,
    /// Build worker threads; `None` uses the global pool.
    pub threads: Option<usize>,
    /// How long a search waits for the first build; `None` waits indefinitely.
    pub wait_timeout_ms: Option<u64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            threads: None,
            wait_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Score a result must exceed for HIGH confidence.
    pub cutoff_score: f64,
    /// Results scoring at or below `top * cutoff_percentage` are dropped.
    pub cutoff_percentage: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            cutoff_score: 80.0,
            cutoff_percentage: 0.8,
        }
    }
}

/// Overrides for the bundled lexical resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    pub units: Option<PathBuf>,
    pub qualifiers: Option<PathBuf>,
    pub stop_words: Option<PathBuf>,
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Load and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            message: format!("cannot serialize config: {e}"),
        })
    }

    /// Reject values that would make scoring or searching meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        let boosts = [
            ("processors.brackets_boost", self.processors.brackets_boost),
            ("processors.compound_boost", self.processors.compound_boost),
            ("processors.organism_part_boost", self.processors.organism_part_boost),
            ("processors.time_boost", self.processors.time_boost),
            ("processors.splitter_boost", self.processors.splitter_boost),
        ];
        for (name, boost) in boosts {
            if !(boost > 0.0 && boost <= 1.0) {
                return invalid(format!("{name} must be in (0, 1], got {boost}"));
            }
        }
        if self.index.chunk_size == 0 {
            return invalid("index.chunk_size must be > 0".into());
        }
        if self.index.threads == Some(0) {
            return invalid("index.threads must be > 0 when set".into());
        }
        if !(self.origin.boost > 0.0) {
            return invalid(format!("origin.boost must be > 0, got {}", self.origin.boost));
        }
        if !(self.search.typed_value_boost > 0.0) {
            return invalid(format!(
                "search.typed_value_boost must be > 0, got {}",
                self.search.typed_value_boost
            ));
        }
        if self.scoring.calibrate && !(self.scoring.window_half_width > 0.0) {
            return invalid("scoring.window_half_width must be > 0 when calibrating".into());
        }
        for (name, filter) in [
            ("approximate.alignment", &self.approximate.alignment),
            ("approximate.token_set", &self.approximate.token_set),
        ] {
            if !(0.0..=1.0).contains(&filter.min_score) || !(0.0..=1.0).contains(&filter.pct_cutoff) {
                return invalid(format!("{name} thresholds must be within [0, 1]"));
            }
        }
        if !(0.0..=1.0).contains(&self.prediction.cutoff_percentage) {
            return invalid("prediction.cutoff_percentage must be within [0, 1]".into());
        }
        Ok(())
    }
}
