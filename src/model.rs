//! Core data model: annotations, their provenance, and the summaries derived from them.
//!
//! Annotations are the raw, immutable input corpus. Summaries are derived
//! aggregates, rebuilt from scratch on every index build and never persisted.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sentinel used in place of a property type for untyped properties.
pub const UNTYPED: &str = "##ontomap.untyped.property.key##";

/// How an annotation was established, ordered from most to least trusted.
///
/// Deserializes leniently through [`Evidence::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum Evidence {
    /// Asserted by a human curator.
    ManualCurated,
    /// Predicted from curated annotations and then accepted.
    ZoomaInferredFromCurated,
    /// Produced by an automated pipeline.
    Automatic,
    /// Derived from ontology structure.
    ComputedFromOntology,
    /// Derived by text matching.
    ComputedFromTextMatch,
    /// Supplied by the data submitter.
    SubmitterProvided,
    /// Origin cannot be traced.
    NonTraceable,
    /// Explicitly carries no evidence.
    NoEvidence,
    /// Anything unrecognised.
    Unknown,
}

impl From<String> for Evidence {
    fn from(name: String) -> Self {
        Self::lookup(&name)
    }
}

impl Evidence {
    /// All evidence kinds in trust order.
    pub const ALL: [Evidence; 9] = [
        Evidence::ManualCurated,
        Evidence::ZoomaInferredFromCurated,
        Evidence::Automatic,
        Evidence::ComputedFromOntology,
        Evidence::ComputedFromTextMatch,
        Evidence::SubmitterProvided,
        Evidence::NonTraceable,
        Evidence::NoEvidence,
        Evidence::Unknown,
    ];

    /// Position in trust order, 0 for the most trusted kind.
    pub fn ordinal(self) -> usize {
        Self::ALL.iter().position(|e| *e == self).unwrap_or(Self::ALL.len() - 1)
    }

    /// Inverted ordinal: the most trusted kind scores highest, `Unknown` scores 1.
    pub fn trust_score(self) -> f64 {
        (Self::ALL.len() - self.ordinal()) as f64
    }

    /// Parse an evidence name, falling back to [`Evidence::Unknown`].
    pub fn lookup(name: &str) -> Self {
        let wanted = name.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted)
            .unwrap_or(Evidence::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManualCurated => "MANUAL_CURATED",
            Self::ZoomaInferredFromCurated => "ZOOMA_INFERRED_FROM_CURATED",
            Self::Automatic => "AUTOMATIC",
            Self::ComputedFromOntology => "COMPUTED_FROM_ONTOLOGY",
            Self::ComputedFromTextMatch => "COMPUTED_FROM_TEXT_MATCH",
            Self::SubmitterProvided => "SUBMITTER_PROVIDED",
            Self::NonTraceable => "NON_TRACEABLE",
            Self::NoEvidence => "NO_EVIDENCE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Evidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of resource an annotation source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Database,
    Ontology,
    #[default]
    #[serde(other)]
    Unknown,
}

/// The datasource an annotation was collected from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationSource {
    /// Identity of the source.
    pub uri: String,
    /// Short human-readable name, e.g. `gwas`.
    pub name: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// Topics the source covers; matched by origin filters alongside uri and name.
    #[serde(default)]
    pub topics: Vec<String>,
}

impl AnnotationSource {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            kind: SourceKind::Unknown,
            topics: Vec::new(),
        }
    }

    /// Whether an origin identifier names this source (by uri, name or topic).
    pub fn matches_origin(&self, origin: &str) -> bool {
        self.uri == origin
            || self.name.eq_ignore_ascii_case(origin)
            || self.topics.iter().any(|t| t.eq_ignore_ascii_case(origin))
    }
}

/// Who asserted an annotation, how, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: AnnotationSource,
    pub evidence: Evidence,
    /// Creation time of the annotation.
    pub generated: DateTime<Utc>,
    /// Agent (person or pipeline) that generated the annotation.
    #[serde(default)]
    pub generator: Option<String>,
}

/// A (type, value) textual attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Property {
    #[serde(default)]
    pub uri: Option<String>,
    /// Property type; `None` for untyped properties.
    #[serde(default, rename = "type")]
    pub property_type: Option<String>,
    pub value: String,
}

impl Property {
    pub fn typed(property_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            uri: None,
            property_type: Some(property_type.into()),
            value: value.into(),
        }
    }

    pub fn untyped(value: impl Into<String>) -> Self {
        Self {
            uri: None,
            property_type: None,
            value: value.into(),
        }
    }

    /// The property type, or `None` when missing or blank.
    pub fn type_name(&self) -> Option<&str> {
        self.property_type.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// An asserted mapping from a property to zero or more semantic tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub uri: String,
    pub property: Property,
    #[serde(default)]
    pub semantic_tags: Vec<String>,
    pub provenance: Provenance,
    /// Uri of the annotation that supersedes this one, if any.
    #[serde(default)]
    pub replaced_by: Option<String>,
}

impl Annotation {
    pub fn is_superseded(&self) -> bool {
        self.replaced_by.is_some()
    }

    /// Non-blank semantic tags, sorted and deduplicated.
    pub fn tag_set(&self) -> BTreeSet<String> {
        self.semantic_tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A deduplicated aggregate of annotations sharing one property and one exact tag set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSummary {
    /// Content hash; `None` for summaries synthesized at query time.
    pub id: Option<String>,
    pub property_type: Option<String>,
    pub property_value: String,
    /// Sorted semantic tag uris.
    pub semantic_tags: Vec<String>,
    /// Uris of the supporting annotations.
    pub annotation_uris: Vec<String>,
    /// Distinct sources that verified this summary.
    pub sources: Vec<AnnotationSource>,
    /// Best intrinsic quality among the supporting annotations.
    pub quality: f64,
}

impl AnnotationSummary {
    pub fn frequency(&self) -> usize {
        self.annotation_uris.len()
    }

    pub fn times_verified(&self) -> usize {
        self.sources.len()
    }

    /// Whether any verifying source matches one of the origins.
    pub fn matches_any_origin(&self, origins: &[String]) -> bool {
        origins
            .iter()
            .any(|o| self.sources.iter().any(|s| s.matches_origin(o)))
    }

    /// Stable key for merging results: the id when present, otherwise the content.
    pub fn merge_key(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => summary_id(
                self.property_type.as_deref(),
                &self.property_value,
                self.semantic_tags.iter().map(String::as_str),
            ),
        }
    }
}

/// A summary paired with its search score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSummary {
    pub summary: AnnotationSummary,
    pub score: f64,
}

/// Ordered source uris, most preferred first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRanking {
    sources: Vec<String>,
}

impl SourceRanking {
    pub fn new(sources: Vec<String>) -> Self {
        Self { sources }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// `len - i + 1` for the source at index `i`, or 1 when unranked.
    pub fn position_score(&self, source_uri: &str) -> usize {
        self.sources
            .iter()
            .position(|s| s == source_uri)
            .map(|i| self.sources.len() - i + 1)
            .unwrap_or(1)
    }

    /// Best position score among several sources, 1 when none is ranked.
    pub fn best_position_score<'a>(&self, source_uris: impl IntoIterator<Item = &'a str>) -> usize {
        source_uris
            .into_iter()
            .map(|uri| self.position_score(uri))
            .max()
            .unwrap_or(1)
    }
}

/// Deterministic summary id over type, value and tags.
///
/// Tags are sorted and deduplicated before hashing, so any permutation of the
/// same tag set yields the same id. Each component is terminated by a unit
/// separator so that shifting characters between components changes the id.
pub fn summary_id<'a>(
    property_type: Option<&str>,
    property_value: &str,
    tags: impl IntoIterator<Item = &'a str>,
) -> String {
    let tags: BTreeSet<&str> = tags.into_iter().collect();
    let mut hasher = Sha256::new();
    hasher.update(property_type.unwrap_or(UNTYPED).as_bytes());
    hasher.update([0x1f]);
    hasher.update(property_value.as_bytes());
    hasher.update([0x1f]);
    for tag in tags {
        hasher.update(tag.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}
