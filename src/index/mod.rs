//! The immutable summary index and the snapshot that wraps it.
//!
//! Summary records live in an in-memory tantivy index built once per
//! snapshot. Relevance is tantivy's BM25 and is used only to order hits and
//! assign retrieval ranks; summary scores come from [`SummaryScorer`].

pub mod builder;
pub mod schema;

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tantivy::collector::TopDocs;
use tantivy::query::Query;
use tantivy::schema::Value;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

use crate::error::{IndexError, QueryError};
use crate::model::{Annotation, AnnotationSummary};
use crate::normalize::StringNormalizer;
use crate::score::{Calibration, CorpusStats, SummaryScorer};

pub use builder::{BuildOutput, SummaryIndexBuilder};
use schema::SummaryFields;

/// Position of a record in the index.
pub type DocId = u32;

/// Writer heap budget for one build.
const WRITER_MEMORY_BYTES: usize = 50_000_000;

/// A retrieved record and how well it matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub doc: DocId,
    pub relevance: f64,
}

/// Immutable full-text index over summary records.
pub struct SummaryIndex {
    records: Vec<AnnotationSummary>,
    fields: SummaryFields,
    reader: IndexReader,
}

impl std::fmt::Debug for SummaryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryIndex")
            .field("records", &self.records.len())
            .finish()
    }
}

impl SummaryIndex {
    /// Index every record in a fresh in-memory index.
    pub fn new(records: Vec<AnnotationSummary>) -> Result<Self, IndexError> {
        let (schema, fields) = schema::build_summary_schema();
        let index = Index::create_in_ram(schema);
        schema::register_tokenizers(&index)?;

        let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        for (ordinal, record) in records.iter().enumerate() {
            writer.add_document(schema::summary_document(ordinal as u64, record, &fields))?;
        }
        writer.commit()?;
        writer.wait_merging_threads()?;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            records,
            fields,
            reader,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, doc: DocId) -> Option<&AnnotationSummary> {
        self.records.get(doc as usize)
    }

    pub fn records(&self) -> &[AnnotationSummary] {
        &self.records
    }

    /// All matching records, most relevant first (ties by doc id).
    pub fn search(&self, query: &dyn Query) -> Result<Vec<Hit>, QueryError> {
        if self.records.is_empty() {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(query, &TopDocs::with_limit(self.records.len()))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let Some(ordinal) = doc.get_first(self.fields.ordinal).and_then(|v| v.as_u64()) else {
                continue;
            };
            hits.push(Hit {
                doc: ordinal as DocId,
                relevance: f64::from(score),
            });
        }
        hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance).then(a.doc.cmp(&b.doc)));
        Ok(hits)
    }
}

/// Normalized property values of the indexed corpus, for approximate matching.
#[derive(Debug, Clone, Default)]
pub struct ValueDictionary {
    normalized: Vec<String>,
    originals: HashMap<String, Vec<String>>,
}

impl ValueDictionary {
    pub fn build(records: &[AnnotationSummary], normalizer: &StringNormalizer) -> Self {
        let mut originals: HashMap<String, Vec<String>> = HashMap::new();
        for record in records {
            let normalized = normalizer.normalize(&record.property_value);
            if normalized.is_empty() {
                continue;
            }
            let spellings = originals.entry(normalized).or_default();
            if !spellings.contains(&record.property_value) {
                spellings.push(record.property_value.clone());
            }
        }
        let mut normalized: Vec<String> = originals.keys().cloned().collect();
        normalized.sort();
        Self {
            normalized,
            originals,
        }
    }

    pub fn normalized(&self) -> &[String] {
        &self.normalized
    }

    /// Original spellings behind a normalized value.
    pub fn originals(&self, normalized: &str) -> &[String] {
        self.originals.get(normalized).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// Summary of one index build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub summaries: usize,
    pub annotations: usize,
    pub superseded_skipped: usize,
    pub untagged_skipped: usize,
    pub distinct_values: usize,
    pub calibration: Calibration,
    pub built_at: DateTime<Utc>,
    pub build_millis: u128,
}

/// A fully built, immutable index plus everything queries need alongside it.
#[derive(Debug)]
pub struct IndexSnapshot {
    index: SummaryIndex,
    corpus: CorpusStats,
    calibration: Calibration,
    values: ValueDictionary,
    stats: IndexStats,
}

impl IndexSnapshot {
    /// Build a snapshot from the corpus.
    pub fn build(
        annotations: &[Annotation],
        builder: &SummaryIndexBuilder,
        scorer: &SummaryScorer,
        normalizer: &StringNormalizer,
    ) -> Result<Self, IndexError> {
        let started = Instant::now();
        let output = builder.build(annotations)?;
        let corpus = CorpusStats {
            summary_count: output.records.len(),
            annotation_count: output.annotation_count,
        };
        let calibration = scorer.calibrate(&output.records, corpus);
        let values = ValueDictionary::build(&output.records, normalizer);
        let index = SummaryIndex::new(output.records)?;
        let stats = IndexStats {
            summaries: index.len(),
            annotations: output.annotation_count,
            superseded_skipped: output.superseded,
            untagged_skipped: output.untagged,
            distinct_values: values.len(),
            calibration,
            built_at: Utc::now(),
            build_millis: started.elapsed().as_millis(),
        };
        tracing::info!(
            summaries = stats.summaries,
            annotations = stats.annotations,
            untagged = stats.untagged_skipped,
            superseded = stats.superseded_skipped,
            millis = stats.build_millis as u64,
            "summary index built"
        );
        Ok(Self {
            index,
            corpus,
            calibration,
            values,
            stats,
        })
    }

    pub fn index(&self) -> &SummaryIndex {
        &self.index
    }

    pub fn corpus(&self) -> CorpusStats {
        self.corpus
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn values(&self) -> &ValueDictionary {
        &self.values
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}
