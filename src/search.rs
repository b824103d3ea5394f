//! Search pipeline over an index snapshot.
//!
//! A query runs through fixed stages: raw, then processed when the raw query
//! found nothing, then approximate when the results are still poor, and
//! finally the origin boost. Each stage reads the snapshot and the results
//! gathered so far; none mutates shared state.

use std::collections::{BTreeMap, BTreeSet};

use crate::approximate::{self, ApproximateMatcher};
use crate::config::EngineConfig;
use crate::dictionary::Dictionaries;
use crate::error::QueryError;
use crate::index::{Hit, IndexSnapshot};
use crate::model::{AnnotationSource, AnnotationSummary, ScoredSummary, SourceRanking};
use crate::normalize::StringNormalizer;
use crate::processor::{self, ProcessorKind, SearchStringProcessor};
use crate::query::{Field, QueryFormulator, QueryKind, SummaryQuery};
use crate::score::{ScoreWindow, SummaryScorer};

/// Origins a caller prefers, and whether to keep only results from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPreference {
    /// Source uris, source names or topics.
    pub origins: Vec<String>,
    /// Drop non-matching results instead of boosting matching ones.
    pub filter_only: bool,
}

impl OriginPreference {
    pub fn boost(origins: Vec<String>) -> Self {
        Self {
            origins,
            filter_only: false,
        }
    }

    pub fn filter(origins: Vec<String>) -> Self {
        Self {
            origins,
            filter_only: true,
        }
    }

    fn admits(&self, summary: &AnnotationSummary) -> bool {
        self.origins.is_empty() || summary.matches_any_origin(&self.origins)
    }
}

/// Results keyed by summary, keeping the best score seen for each.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    entries: BTreeMap<String, ScoredSummary>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record `score` for `summary` unless a higher score is already recorded.
    pub fn merge_max(&mut self, summary: AnnotationSummary, score: f64) {
        let key = summary.merge_key();
        match self.entries.get_mut(&key) {
            Some(existing) => {
                if score > existing.score {
                    existing.score = score;
                }
            }
            None => {
                self.entries.insert(key, ScoredSummary { summary, score });
            }
        }
    }

    pub fn best_score(&self) -> Option<f64> {
        self.entries.values().map(|r| r.score).reduce(f64::max)
    }

    fn scaled(self, factor: f64) -> Self {
        let mut entries = self.entries;
        for result in entries.values_mut() {
            result.score *= factor;
        }
        Self { entries }
    }

    fn absorb(&mut self, other: ResultSet) {
        for (_, result) in other.entries {
            self.merge_max(result.summary, result.score);
        }
    }

    fn iter(&self) -> impl Iterator<Item = &ScoredSummary> {
        self.entries.values()
    }

    /// Highest score first; ties ordered by value, then key.
    pub fn into_ranked(self) -> Vec<ScoredSummary> {
        let mut ranked: Vec<(String, ScoredSummary)> = self.entries.into_iter().collect();
        ranked.sort_by(|(ka, a), (kb, b)| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.summary.property_value.cmp(&b.summary.property_value))
                .then_with(|| ka.cmp(kb))
        });
        ranked.into_iter().map(|(_, r)| r).collect()
    }
}

/// Multiply the score of every result from a preferred origin by `boost`, once.
pub fn origin_stage(results: Vec<ScoredSummary>, origins: &[String], boost: f64) -> Vec<ScoredSummary> {
    let mut boosted: Vec<ScoredSummary> = results
        .into_iter()
        .map(|mut r| {
            if r.summary.matches_any_origin(origins) {
                r.score *= boost;
            }
            r
        })
        .collect();
    boosted.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.summary.property_value.cmp(&b.summary.property_value))
    });
    boosted
}

/// Assign 1-based dense ranks to hits sorted by descending relevance.
fn dense_ranks(hits: &[Hit]) -> Vec<usize> {
    let mut ranks = Vec::with_capacity(hits.len());
    let mut rank = 0;
    let mut previous: Option<f64> = None;
    for hit in hits {
        if previous != Some(hit.relevance) {
            rank += 1;
            previous = Some(hit.relevance);
        }
        ranks.push(rank);
    }
    ranks
}

/// Runs the staged search pipeline.
#[derive(Debug)]
pub struct Searcher {
    formulator: QueryFormulator,
    scorer: SummaryScorer,
    processors: Vec<Box<dyn SearchStringProcessor>>,
    matcher: ApproximateMatcher,
    normalizer: StringNormalizer,
    approximate_enabled: bool,
    poor_score: f64,
    origin_boost: f64,
}

impl Searcher {
    pub fn from_config(config: &EngineConfig, dictionaries: &Dictionaries) -> Self {
        let window = config.scoring.calibrate.then_some(ScoreWindow {
            center: config.scoring.window_center,
            half_width: config.scoring.window_half_width,
        });
        let ranking = SourceRanking::new(config.scoring.source_ranking.clone());
        Self {
            formulator: QueryFormulator::new(config.search.proximity_slop, config.search.typed_value_boost),
            scorer: SummaryScorer::new(ranking, window, config.scoring.calibration_worst_rank),
            processors: processor::build_processors(&config.processors, dictionaries),
            matcher: ApproximateMatcher::new(config.approximate.alignment, config.approximate.token_set),
            normalizer: StringNormalizer::new(dictionaries.stop_words.clone()),
            approximate_enabled: config.approximate.enabled,
            poor_score: config.approximate.poor_score,
            origin_boost: config.origin.boost,
        }
    }

    pub fn scorer(&self) -> &SummaryScorer {
        &self.scorer
    }

    pub fn normalizer(&self) -> &StringNormalizer {
        &self.normalizer
    }

    /// Full pipeline for one property, best results first.
    pub fn search(
        &self,
        snapshot: &IndexSnapshot,
        property_type: Option<&str>,
        value: &str,
        origin: Option<&OriginPreference>,
    ) -> Result<Vec<ScoredSummary>, QueryError> {
        let filter = origin.filter(|o| o.filter_only);

        let mut results = self.raw_stage(snapshot, property_type, value, filter)?;
        tracing::debug!(value, results = results.len(), "raw stage");

        if results.is_empty() {
            results = self.processed_stage(snapshot, property_type, value, filter, true);
            tracing::debug!(value, results = results.len(), "processed stage");
        }

        if self.is_poor(&results) {
            self.approximate_stage(snapshot, property_type, value, filter, &mut results);
            tracing::debug!(value, results = results.len(), "approximate stage");
        }

        let ranked = results.into_ranked();
        Ok(match origin {
            Some(o) if !o.filter_only && !o.origins.is_empty() => origin_stage(ranked, &o.origins, self.origin_boost),
            _ => ranked,
        })
    }

    /// Values starting with `prefix`, optionally preferring a property type.
    pub fn search_by_prefix(
        &self,
        snapshot: &IndexSnapshot,
        property_type: Option<&str>,
        prefix: &str,
    ) -> Result<Vec<ScoredSummary>, QueryError> {
        let value_query = self
            .formulator
            .formulate(Field::PropertyValue, prefix, QueryKind::Prefix, false)?;
        let query = self.with_type(property_type, value_query);
        Ok(self.score_hits(snapshot, &query, None)?.into_ranked())
    }

    /// Summaries whose tag uris end with the given short names.
    ///
    /// With `all_must_match` a summary needs every short name, otherwise any.
    pub fn search_by_semantic_tags(
        &self,
        snapshot: &IndexSnapshot,
        short_names: &[String],
        all_must_match: bool,
    ) -> Result<Vec<ScoredSummary>, QueryError> {
        if short_names.is_empty() {
            return Err(QueryError::NoTerms { pattern: String::new() });
        }
        let queries = short_names
            .iter()
            .map(|name| {
                self.formulator
                    .formulate(Field::SemanticTag, name, QueryKind::Suffix, false)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let query = self.formulator.combined(false, all_must_match, queries);
        Ok(self.score_hits(snapshot, &query, None)?.into_ranked())
    }

    fn is_poor(&self, results: &ResultSet) -> bool {
        self.approximate_enabled
            && results
                .best_score()
                .is_none_or(|best| best < self.poor_score)
    }

    /// Exact-phrase query on the value, preferring a matching type.
    fn raw_stage(
        &self,
        snapshot: &IndexSnapshot,
        property_type: Option<&str>,
        value: &str,
        filter: Option<&OriginPreference>,
    ) -> Result<ResultSet, QueryError> {
        let value_query = self
            .formulator
            .formulate(Field::PropertyValue, value, QueryKind::Full, false)?;
        let query = self.with_type(property_type, value_query);
        self.score_hits(snapshot, &query, filter)
    }

    /// Raw stage for rewritten strings, where an unsearchable rewrite just finds nothing.
    fn requery(
        &self,
        snapshot: &IndexSnapshot,
        property_type: Option<&str>,
        value: &str,
        filter: Option<&OriginPreference>,
    ) -> ResultSet {
        match self.raw_stage(snapshot, property_type, value, filter) {
            Ok(results) => results,
            Err(QueryError::NoTerms { .. }) => {
                tracing::debug!(value, "rewritten pattern has no searchable terms");
                ResultSet::default()
            }
            Err(e) => {
                tracing::warn!(value, error = %e, "rewritten pattern failed to search");
                ResultSet::default()
            }
        }
    }

    fn with_type(&self, property_type: Option<&str>, value_query: SummaryQuery) -> SummaryQuery {
        let type_query = property_type.and_then(|t| {
            self.formulator
                .formulate(Field::PropertyType, t, QueryKind::Full, true)
                .ok()
        });
        match type_query {
            Some(type_query) => self.formulator.typed(type_query, value_query),
            None => value_query,
        }
    }

    fn score_hits(
        &self,
        snapshot: &IndexSnapshot,
        query: &SummaryQuery,
        filter: Option<&OriginPreference>,
    ) -> Result<ResultSet, QueryError> {
        let index = snapshot.index();
        let mut hits = index.search(query.as_ref())?;
        if let Some(filter) = filter {
            hits.retain(|hit| index.record(hit.doc).is_some_and(|r| filter.admits(r)));
        }
        let ranks = dense_ranks(&hits);
        let mut results = ResultSet::default();
        for (hit, rank) in hits.iter().zip(ranks) {
            let Some(record) = index.record(hit.doc) else {
                continue;
            };
            let score = self
                .scorer
                .score(record, rank, snapshot.corpus(), snapshot.calibration());
            results.merge_max(record.clone(), score);
        }
        Ok(results)
    }

    /// Rewrite the pattern with every applicable processor and requery.
    fn processed_stage(
        &self,
        snapshot: &IndexSnapshot,
        property_type: Option<&str>,
        value: &str,
        filter: Option<&OriginPreference>,
        allow_split: bool,
    ) -> ResultSet {
        let mut results = ResultSet::default();
        for processor in &self.processors {
            if !allow_split && processor.kind() == ProcessorKind::Splitter {
                continue;
            }
            if !processor.can_process(value, property_type) {
                continue;
            }
            let alternates = processor.process(value);
            let boost = processor.boost_factor();
            match alternates.as_slice() {
                [] => {}
                [single] => {
                    let found = self.requery(snapshot, property_type, single, filter);
                    results.absorb(found.scaled(boost));
                }
                [first, second] => {
                    let parts = (first.as_str(), second.as_str());
                    let merged = self.split_merge(snapshot, property_type, value, filter, parts, boost);
                    results.absorb(merged);
                }
                more => {
                    tracing::warn!(
                        processor = %processor.kind(),
                        value,
                        parts = more.len(),
                        "merging more than two alternates is unsupported, skipping"
                    );
                }
            }
        }
        results
    }

    /// Search both halves of a split pattern and combine every pair of results.
    fn split_merge(
        &self,
        snapshot: &IndexSnapshot,
        property_type: Option<&str>,
        value: &str,
        filter: Option<&OriginPreference>,
        (first, second): (&str, &str),
        boost: f64,
    ) -> ResultSet {
        let part = |text: &str| {
            let found = self.requery(snapshot, property_type, text, filter);
            if found.is_empty() {
                self.processed_stage(snapshot, property_type, text, filter, false)
            } else {
                found
            }
        };
        let left = part(first);
        let right = part(second);

        let left_len = first.chars().count() as f64;
        let right_len = second.chars().count() as f64;
        let total = left_len + right_len;

        let mut merged = ResultSet::default();
        for a in left.iter() {
            for b in right.iter() {
                let weighted = |x: f64, y: f64| (left_len * x + right_len * y) / total * boost;
                let summary = combine_summaries(value, &a.summary, &b.summary, weighted(a.summary.quality, b.summary.quality));
                merged.merge_max(summary, weighted(a.score, b.score));
            }
        }
        merged
    }

    /// Requery close spellings from the value dictionary, discounted by similarity squared.
    fn approximate_stage(
        &self,
        snapshot: &IndexSnapshot,
        property_type: Option<&str>,
        value: &str,
        filter: Option<&OriginPreference>,
        results: &mut ResultSet,
    ) {
        if value.contains(" and ") {
            return;
        }
        let normalized = self.normalizer.normalize(value);
        if normalized.is_empty() {
            return;
        }
        let dictionary = snapshot.values();
        for candidate in self.matcher.find(&normalized, dictionary.normalized()) {
            if !approximate::same_polarity(&normalized, &candidate.value) {
                tracing::trace!(value = %candidate.value, "approximate match has opposite polarity");
                continue;
            }
            let discount = candidate.similarity * candidate.similarity;
            for spelling in dictionary.originals(&candidate.value) {
                let mut found = self.requery(snapshot, property_type, spelling, filter);
                if found.is_empty() {
                    found = self.processed_stage(snapshot, property_type, spelling, filter, true);
                }
                results.absorb(found.scaled(discount));
            }
        }
    }
}

/// A query-time summary covering both halves of a split pattern.
fn combine_summaries(value: &str, a: &AnnotationSummary, b: &AnnotationSummary, quality: f64) -> AnnotationSummary {
    let property_type = match (&a.property_type, &b.property_type) {
        (Some(x), Some(y)) if x == y => Some(x.clone()),
        _ => None,
    };
    let semantic_tags: BTreeSet<&String> = a.semantic_tags.iter().chain(&b.semantic_tags).collect();
    let annotation_uris: BTreeSet<&String> = a.annotation_uris.iter().chain(&b.annotation_uris).collect();
    let mut sources: Vec<AnnotationSource> = a.sources.clone();
    for source in &b.sources {
        if !sources.iter().any(|s| s.uri == source.uri) {
            sources.push(source.clone());
        }
    }
    AnnotationSummary {
        id: None,
        property_type,
        property_value: value.to_string(),
        semantic_tags: semantic_tags.into_iter().cloned().collect(),
        annotation_uris: annotation_uris.into_iter().cloned().collect(),
        sources,
        quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SummaryIndexBuilder;
    use crate::model::{Annotation, Evidence, Property, Provenance};
    use chrono::{TimeZone, Utc};

    fn annotation(uri: &str, ty: Option<&str>, value: &str, tags: &[&str], source: (&str, &str)) -> Annotation {
        Annotation {
            uri: uri.into(),
            property: Property {
                uri: None,
                property_type: ty.map(str::to_string),
                value: value.into(),
            },
            semantic_tags: tags.iter().map(|t| t.to_string()).collect(),
            provenance: Provenance {
                source: AnnotationSource::new(source.0, source.1),
                evidence: Evidence::ManualCurated,
                generated: Utc.with_ymd_and_hms(2015, 6, 1, 0, 0, 0).unwrap(),
                generator: None,
            },
            replaced_by: None,
        }
    }

    const GXA: (&str, &str) = ("http://www.ebi.ac.uk/gxa", "atlas");
    const GWAS: (&str, &str) = ("http://www.ebi.ac.uk/gwas", "gwas");

    fn corpus() -> Vec<Annotation> {
        vec![
            annotation("urn:1", Some("organism"), "homo sapiens", &["http://purl.org/NCBITaxon_9606"], GXA),
            annotation("urn:2", Some("organism part"), "liver biopsy", &["http://efo/EFO_0010001"], GXA),
            annotation("urn:3", Some("disease"), "cancer", &["http://efo/X"], GXA),
            annotation("urn:4", Some("disease"), "diabetes", &["http://efo/Y"], GXA),
            annotation("urn:5", Some("cell type"), "hepatocyte", &["http://cl/A"], GXA),
            annotation("urn:6", Some("cell type"), "hepatocyte", &["http://cl/B"], GWAS),
        ]
    }

    fn setup() -> (Searcher, IndexSnapshot) {
        let searcher = Searcher::from_config(&EngineConfig::default(), &Dictionaries::bundled());
        let builder = SummaryIndexBuilder::new(2, None, SourceRanking::default());
        let snapshot = IndexSnapshot::build(&corpus(), &builder, searcher.scorer(), searcher.normalizer()).unwrap();
        (searcher, snapshot)
    }

    #[test]
    fn exact_hit() {
        let (searcher, snapshot) = setup();
        let results = searcher
            .search(&snapshot, Some("organism"), "homo sapiens", None)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].summary.semantic_tags, vec!["http://purl.org/NCBITaxon_9606"]);
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn unsearchable_pattern_is_a_query_error() {
        let (searcher, snapshot) = setup();
        assert!(matches!(
            searcher.search(&snapshot, None, "  ?! ", None),
            Err(QueryError::NoTerms { .. })
        ));
    }

    #[test]
    fn time_processor_fallback_is_discounted() {
        let (searcher, snapshot) = setup();
        let exact = searcher.search(&snapshot, Some("time"), "liver biopsy", None).unwrap();
        let processed = searcher
            .search(&snapshot, Some("time"), "liver biopsy 24 hours", None)
            .unwrap();
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].summary.semantic_tags, vec!["http://efo/EFO_0010001"]);
        assert!((processed[0].score - exact[0].score * 0.95).abs() < 1e-9);
    }

    #[test]
    fn split_query_merges_both_halves() {
        let (searcher, snapshot) = setup();
        let cancer = searcher.search(&snapshot, None, "cancer", None).unwrap()[0].score;
        let diabetes = searcher.search(&snapshot, None, "diabetes", None).unwrap()[0].score;

        let results = searcher.search(&snapshot, None, "cancer and diabetes", None).unwrap();
        assert_eq!(results.len(), 1);
        let merged = &results[0];
        assert_eq!(merged.summary.semantic_tags, vec!["http://efo/X", "http://efo/Y"]);
        assert_eq!(merged.summary.id, None);
        assert_eq!(merged.summary.property_type.as_deref(), Some("disease"));
        assert_eq!(merged.summary.property_value, "cancer and diabetes");
        let expected = (6.0 * cancer + 8.0 * diabetes) / 14.0 * 0.7;
        assert!((merged.score - expected).abs() < 1e-9);
    }

    #[test]
    fn approximate_match_recovers_misspelling() {
        let (searcher, snapshot) = setup();
        let exact = searcher.search(&snapshot, None, "homo sapiens", None).unwrap()[0].score;
        let results = searcher.search(&snapshot, None, "homo sapien", None).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score > 0.0);
        assert!(results[0].score < exact);
    }

    #[test]
    fn origin_boost_reorders_equal_results() {
        let (searcher, snapshot) = setup();
        let plain = searcher.search(&snapshot, None, "hepatocyte", None).unwrap();
        assert_eq!(plain.len(), 2);
        assert_eq!(plain[0].score, plain[1].score);

        let boosted = searcher
            .search(&snapshot, None, "hepatocyte", Some(&OriginPreference::boost(vec!["gwas".into()])))
            .unwrap();
        assert_eq!(boosted[0].summary.semantic_tags, vec!["http://cl/B"]);
        assert!((boosted[0].score - plain[0].score * 1.5).abs() < 1e-9);
        assert_eq!(boosted[1].score, plain[0].score);
    }

    #[test]
    fn origin_filter_drops_other_sources() {
        let (searcher, snapshot) = setup();
        let filtered = searcher
            .search(
                &snapshot,
                None,
                "hepatocyte",
                Some(&OriginPreference::filter(vec!["http://www.ebi.ac.uk/gwas".into()])),
            )
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].summary.semantic_tags, vec!["http://cl/B"]);
    }

    #[test]
    fn prefix_and_tag_searches() {
        let (searcher, snapshot) = setup();
        let results = searcher.search_by_prefix(&snapshot, None, "hepa").unwrap();
        assert_eq!(results.len(), 2);

        let tags = searcher
            .search_by_semantic_tags(&snapshot, &["NCBITaxon_9606".into()], false)
            .unwrap();
        assert_eq!(tags.len(), 1);
        let both = searcher
            .search_by_semantic_tags(&snapshot, &["x".into(), "y".into()], true)
            .unwrap();
        assert!(both.is_empty());
        let either = searcher
            .search_by_semantic_tags(&snapshot, &["/x".into(), "/y".into()], false)
            .unwrap();
        assert_eq!(either.len(), 2);
    }

    #[test]
    fn merge_max_never_lowers_a_score() {
        let summary = AnnotationSummary {
            id: Some("a".into()),
            property_type: None,
            property_value: "x".into(),
            semantic_tags: vec!["http://t".into()],
            annotation_uris: vec!["urn:a".into()],
            sources: Vec::new(),
            quality: 1.0,
        };
        let mut results = ResultSet::default();
        results.merge_max(summary.clone(), 80.0);
        results.merge_max(summary.clone(), 60.0);
        assert_eq!(results.best_score(), Some(80.0));
        results.merge_max(summary, 90.0);
        assert_eq!(results.best_score(), Some(90.0));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn dense_ranks_share_ties() {
        let hits = [
            Hit { doc: 0, relevance: 3.0 },
            Hit { doc: 1, relevance: 3.0 },
            Hit { doc: 2, relevance: 1.0 },
        ];
        assert_eq!(dense_ranks(&hits), vec![1, 1, 2]);
    }
}
