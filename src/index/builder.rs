//! Batch construction of summary records from the annotation corpus.
//!
//! The corpus is split into fixed-size chunks that are folded in parallel.
//! Each chunk appends its partial summaries to a shared map keyed by summary
//! id; nothing is merged until every chunk has landed. A single validation
//! pass then checks every id for content collisions and merges the partials.

use std::collections::HashMap;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::error::IndexError;
use crate::model::{Annotation, AnnotationSource, AnnotationSummary, SourceRanking, UNTYPED, summary_id};
use crate::score::annotation_quality;

/// What a summary id was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryContent {
    pub property_type: Option<String>,
    pub property_value: String,
    pub semantic_tags: Vec<String>,
}

impl SummaryContent {
    fn of(annotation: &Annotation) -> Option<Self> {
        let tags: Vec<String> = annotation.tag_set().into_iter().collect();
        if tags.is_empty() {
            return None;
        }
        Some(Self {
            property_type: annotation.property.type_name().map(str::to_string),
            property_value: annotation.property.value.trim().to_string(),
            semantic_tags: tags,
        })
    }

    pub fn id(&self) -> String {
        summary_id(
            self.property_type.as_deref(),
            &self.property_value,
            self.semantic_tags.iter().map(String::as_str),
        )
    }

    fn describe(&self) -> String {
        format!(
            "{}, {}, {}",
            self.property_type.as_deref().unwrap_or(UNTYPED),
            self.property_value,
            self.semantic_tags.join(" ")
        )
    }
}

/// One chunk's view of a summary.
#[derive(Debug, Clone)]
pub struct PartialSummary {
    pub content: SummaryContent,
    pub annotation_uris: Vec<String>,
    pub sources: Vec<AnnotationSource>,
    pub top_quality: f64,
}

impl PartialSummary {
    fn new(content: SummaryContent) -> Self {
        Self {
            content,
            annotation_uris: Vec::new(),
            sources: Vec::new(),
            top_quality: f64::NEG_INFINITY,
        }
    }

    fn absorb(&mut self, annotation: &Annotation, quality: f64) {
        self.annotation_uris.push(annotation.uri.clone());
        let source = &annotation.provenance.source;
        if !self.sources.iter().any(|s| s.uri == source.uri) {
            self.sources.push(source.clone());
        }
        self.top_quality = self.top_quality.max(quality);
    }

    fn merge(&mut self, other: PartialSummary) {
        self.annotation_uris.extend(other.annotation_uris);
        for source in other.sources {
            if !self.sources.iter().any(|s| s.uri == source.uri) {
                self.sources.push(source);
            }
        }
        self.top_quality = self.top_quality.max(other.top_quality);
    }

    fn into_summary(mut self, id: String) -> AnnotationSummary {
        self.annotation_uris.sort();
        self.annotation_uris.dedup();
        self.sources.sort_by(|a, b| a.uri.cmp(&b.uri));
        AnnotationSummary {
            id: Some(id),
            property_type: self.content.property_type,
            property_value: self.content.property_value,
            semantic_tags: self.content.semantic_tags,
            annotation_uris: self.annotation_uris,
            sources: self.sources,
            quality: self.top_quality,
        }
    }
}

/// Output of a build: records plus corpus counts.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// One record per summary, sorted by id.
    pub records: Vec<AnnotationSummary>,
    /// Annotations that count towards frequency normalization (not superseded).
    pub annotation_count: usize,
    pub superseded: usize,
    pub untagged: usize,
}

/// Groups annotations into summaries.
#[derive(Debug, Clone)]
pub struct SummaryIndexBuilder {
    chunk_size: usize,
    threads: Option<usize>,
    ranking: SourceRanking,
}

impl SummaryIndexBuilder {
    pub fn new(chunk_size: usize, threads: Option<usize>, ranking: SourceRanking) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            threads,
            ranking,
        }
    }

    /// Build summary records from `annotations`.
    ///
    /// Fails with [`IndexError::HashCollision`] if two different contents
    /// share an id.
    pub fn build(&self, annotations: &[Annotation]) -> Result<BuildOutput, IndexError> {
        let landed: DashMap<String, Vec<PartialSummary>> = DashMap::new();

        let fold_all = || {
            annotations
                .par_chunks(self.chunk_size)
                .for_each(|chunk| self.fold_chunk(chunk, &landed));
        };
        match self.threads {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| IndexError::WorkerPool {
                    message: e.to_string(),
                })?
                .install(fold_all),
            None => fold_all(),
        }

        let records = validate_and_merge(landed.into_iter().collect())?;

        let superseded = annotations.iter().filter(|a| a.is_superseded()).count();
        let untagged = annotations
            .iter()
            .filter(|a| !a.is_superseded() && a.tag_set().is_empty())
            .count();

        Ok(BuildOutput {
            records,
            annotation_count: annotations.len() - superseded,
            superseded,
            untagged,
        })
    }

    fn fold_chunk(&self, chunk: &[Annotation], landed: &DashMap<String, Vec<PartialSummary>>) {
        let mut local: HashMap<String, Vec<PartialSummary>> = HashMap::new();
        for annotation in chunk {
            if annotation.is_superseded() {
                tracing::trace!(uri = %annotation.uri, "skipping superseded annotation");
                continue;
            }
            let Some(content) = SummaryContent::of(annotation) else {
                continue;
            };
            let quality = annotation_quality(annotation, &self.ranking);
            let partials = local.entry(content.id()).or_default();
            match partials.iter_mut().find(|p| p.content == content) {
                Some(partial) => partial.absorb(annotation, quality),
                None => {
                    let mut partial = PartialSummary::new(content);
                    partial.absorb(annotation, quality);
                    partials.push(partial);
                }
            }
        }
        for (id, partials) in local {
            landed.entry(id).or_default().extend(partials);
        }
    }
}

/// Global pass over all landed partials: reject collisions, merge the rest.
pub fn validate_and_merge(
    landed: Vec<(String, Vec<PartialSummary>)>,
) -> Result<Vec<AnnotationSummary>, IndexError> {
    let mut records = Vec::with_capacity(landed.len());
    for (id, partials) in landed {
        let mut partials = partials.into_iter();
        let Some(mut merged) = partials.next() else {
            continue;
        };
        for partial in partials {
            if partial.content != merged.content {
                return Err(IndexError::HashCollision {
                    id,
                    existing: merged.content.describe(),
                    incoming: partial.content.describe(),
                });
            }
            merged.merge(partial);
        }
        records.push(merged.into_summary(id));
    }
    records.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Evidence, Property, Provenance};
    use chrono::{TimeZone, Utc};

    fn annotation(uri: &str, ty: Option<&str>, value: &str, tags: &[&str], source: &str) -> Annotation {
        Annotation {
            uri: uri.into(),
            property: Property {
                uri: None,
                property_type: ty.map(str::to_string),
                value: value.into(),
            },
            semantic_tags: tags.iter().map(|t| t.to_string()).collect(),
            provenance: Provenance {
                source: AnnotationSource::new(source, source),
                evidence: Evidence::ManualCurated,
                generated: Utc.with_ymd_and_hms(2015, 6, 1, 0, 0, 0).unwrap(),
                generator: None,
            },
            replaced_by: None,
        }
    }

    fn builder(chunk_size: usize) -> SummaryIndexBuilder {
        SummaryIndexBuilder::new(chunk_size, None, SourceRanking::default())
    }

    #[test]
    fn groups_by_exact_tag_set() {
        let corpus = vec![
            annotation("a1", Some("organism"), "homo sapiens", &["http://t/9606"], "http://s1"),
            annotation("a2", Some("organism"), "homo sapiens", &["http://t/9606"], "http://s2"),
            annotation("a3", Some("organism"), "homo sapiens", &["http://t/9606", "http://t/x"], "http://s1"),
        ];
        let out = builder(1).build(&corpus).unwrap();
        assert_eq!(out.records.len(), 2);

        let single = out
            .records
            .iter()
            .find(|r| r.semantic_tags.len() == 1)
            .unwrap();
        assert_eq!(single.frequency(), 2);
        assert_eq!(single.times_verified(), 2);
        assert_eq!(single.annotation_uris, vec!["a1".to_string(), "a2".to_string()]);
    }

    #[test]
    fn tag_order_does_not_split_summaries() {
        let corpus = vec![
            annotation("a1", None, "x", &["http://b", "http://a"], "http://s"),
            annotation("a2", None, "x", &["http://a", "http://b"], "http://s"),
        ];
        let out = builder(1).build(&corpus).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].frequency(), 2);
        assert_eq!(out.records[0].times_verified(), 1);
    }

    #[test]
    fn untagged_and_superseded_are_excluded() {
        let mut replaced = annotation("a3", None, "z", &["http://z"], "http://s");
        replaced.replaced_by = Some("a4".into());
        let corpus = vec![
            annotation("a1", None, "x", &[], "http://s"),
            annotation("a2", None, "y", &["  "], "http://s"),
            replaced,
        ];
        let out = builder(2).build(&corpus).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.untagged, 2);
        assert_eq!(out.superseded, 1);
        assert_eq!(out.annotation_count, 2);
    }

    #[test]
    fn chunking_does_not_change_the_result() {
        let corpus: Vec<Annotation> = (0..50)
            .map(|i| {
                annotation(
                    &format!("a{i}"),
                    Some("disease"),
                    &format!("value {}", i % 7),
                    &[&format!("http://tag/{}", i % 3)],
                    &format!("http://s{}", i % 4),
                )
            })
            .collect();
        let one = builder(1).build(&corpus).unwrap();
        let many = builder(1000).build(&corpus).unwrap();
        assert_eq!(one.records, many.records);
    }

    #[test]
    fn quality_is_max_over_annotations() {
        let mut weak = annotation("a1", None, "x", &["http://a"], "http://s");
        weak.provenance.evidence = Evidence::Unknown;
        let strong = annotation("a2", None, "x", &["http://a"], "http://s");
        let expected = annotation_quality(&strong, &SourceRanking::default());
        let out = builder(1).build(&[weak, strong]).unwrap();
        assert_eq!(out.records[0].quality, expected);
    }

    #[test]
    fn collision_aborts_the_build() {
        let content = |value: &str| SummaryContent {
            property_type: None,
            property_value: value.into(),
            semantic_tags: vec!["http://a".into()],
        };
        let landed = vec![(
            "deadbeef".to_string(),
            vec![PartialSummary::new(content("x")), PartialSummary::new(content("y"))],
        )];
        let err = validate_and_merge(landed).unwrap_err();
        assert!(matches!(err, IndexError::HashCollision { id, .. } if id == "deadbeef"));
    }

    #[test]
    fn dedicated_thread_pool() {
        let corpus = vec![annotation("a1", None, "x", &["http://a"], "http://s")];
        let out = SummaryIndexBuilder::new(8, Some(2), SourceRanking::default())
            .build(&corpus)
            .unwrap();
        assert_eq!(out.records.len(), 1);
    }
}
