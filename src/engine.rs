//! Engine facade: top-level API for the ontomap system.
//!
//! The `Engine` owns the configuration, the search pipeline, the registered
//! annotation stores and the active index snapshot. Searches wait on the
//! readiness gate until the first build completes, then run against whichever
//! snapshot was active when they started.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::dictionary::Dictionaries;
use crate::error::{IndexError, OntomapResult};
use crate::gate::ReadinessGate;
use crate::index::{IndexSnapshot, IndexStats, SummaryIndexBuilder};
use crate::model::{Annotation, ScoredSummary, SourceRanking};
use crate::prediction::{self, Prediction};
use crate::search::{OriginPreference, Searcher};
use crate::store::{self, AnnotationStore};

/// The ontomap annotation search engine.
pub struct Engine {
    config: EngineConfig,
    searcher: Searcher,
    builder: SummaryIndexBuilder,
    gate: ReadinessGate,
    active: RwLock<Option<Arc<IndexSnapshot>>>,
    /// Serializes rebuilds.
    building: Mutex<()>,
    stores: RwLock<Vec<Arc<dyn AnnotationStore>>>,
}

impl Engine {
    /// Create an engine, loading dictionaries from the configured paths.
    pub fn new(config: EngineConfig) -> OntomapResult<Self> {
        config.validate()?;
        let dictionaries = Dictionaries::from_config(&config.dictionaries)?;
        Self::with_dictionaries(config, dictionaries)
    }

    /// Create an engine with preloaded dictionaries.
    pub fn with_dictionaries(config: EngineConfig, dictionaries: Dictionaries) -> OntomapResult<Self> {
        config.validate()?;
        tracing::info!(
            processors = config.processors.enabled.len(),
            calibrate = config.scoring.calibrate,
            ranked_sources = config.scoring.source_ranking.len(),
            "initializing ontomap engine"
        );
        let searcher = Searcher::from_config(&config, &dictionaries);
        let builder = SummaryIndexBuilder::new(
            config.index.chunk_size,
            config.index.threads,
            SourceRanking::new(config.scoring.source_ranking.clone()),
        );
        Ok(Self {
            config,
            searcher,
            builder,
            gate: ReadinessGate::new(),
            active: RwLock::new(None),
            building: Mutex::new(()),
            stores: RwLock::new(Vec::new()),
        })
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Make a datasource available to [`Engine::load`].
    pub fn register_store(&self, store: Arc<dyn AnnotationStore>) {
        tracing::debug!(store = store.name(), "registered annotation store");
        self.stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(store);
    }

    /// Rebuild the index from the single store called `name`.
    pub fn load(&self, name: &str) -> OntomapResult<IndexStats> {
        let store = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(store::resolve(&stores, name)?)
        };
        let annotations = store.annotations()?;
        self.rebuild(&annotations)
    }

    /// Rebuild the index from every registered store.
    pub fn load_all(&self) -> OntomapResult<IndexStats> {
        let stores: Vec<Arc<dyn AnnotationStore>> = self
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut annotations = Vec::new();
        for store in &stores {
            annotations.extend(store.annotations()?);
        }
        self.rebuild(&annotations)
    }

    /// Build a new snapshot and swap it in whole.
    ///
    /// Searches already running keep the snapshot they started with. A failed
    /// build leaves the previous snapshot (or the pending gate) untouched.
    pub fn rebuild(&self, annotations: &[Annotation]) -> OntomapResult<IndexStats> {
        let _guard = self.building.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = IndexSnapshot::build(
            annotations,
            &self.builder,
            self.searcher.scorer(),
            self.searcher.normalizer(),
        )?;
        let stats = snapshot.stats().clone();
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(snapshot));
        self.gate.open();
        Ok(stats)
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Fail all current and future searches.
    pub fn close(&self) {
        tracing::info!("closing ontomap engine");
        self.gate.close();
    }

    /// The active snapshot, waiting for the first build if needed.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>, IndexError> {
        let timeout = self.config.index.wait_timeout_ms.map(Duration::from_millis);
        self.gate.wait(timeout)?;
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| IndexError::Unavailable {
                reason: "no index has been built".into(),
            })
    }

    /// Search an untyped property value.
    pub fn search(&self, value: &str) -> OntomapResult<Vec<ScoredSummary>> {
        self.search_typed(None, value)
    }

    /// Search a property value, preferring summaries of the given type.
    pub fn search_typed(&self, property_type: Option<&str>, value: &str) -> OntomapResult<Vec<ScoredSummary>> {
        let snapshot = self.snapshot()?;
        Ok(self.searcher.search(&snapshot, property_type, value, None)?)
    }

    /// Search, boosting or restricting results to preferred origins.
    pub fn search_with_origin(
        &self,
        property_type: Option<&str>,
        value: &str,
        origin: &OriginPreference,
    ) -> OntomapResult<Vec<ScoredSummary>> {
        let snapshot = self.snapshot()?;
        Ok(self.searcher.search(&snapshot, property_type, value, Some(origin))?)
    }

    /// Summaries whose value starts with `prefix`.
    pub fn search_by_prefix(&self, property_type: Option<&str>, prefix: &str) -> OntomapResult<Vec<ScoredSummary>> {
        let snapshot = self.snapshot()?;
        Ok(self.searcher.search_by_prefix(&snapshot, property_type, prefix)?)
    }

    /// Summaries tagged with uris ending in the given short names.
    pub fn search_by_semantic_tags(
        &self,
        short_names: &[String],
        all_must_match: bool,
    ) -> OntomapResult<Vec<ScoredSummary>> {
        let snapshot = self.snapshot()?;
        Ok(self
            .searcher
            .search_by_semantic_tags(&snapshot, short_names, all_must_match)?)
    }

    /// Predict semantic tags for a property, with a confidence tier.
    pub fn predict(
        &self,
        property_type: Option<&str>,
        value: &str,
        origin: Option<&OriginPreference>,
    ) -> OntomapResult<Vec<Prediction>> {
        let snapshot = self.snapshot()?;
        let results = self.searcher.search(&snapshot, property_type, value, origin)?;
        Ok(prediction::predict(results, &self.config.prediction))
    }

    /// Statistics of the active snapshot, `None` before the first build.
    pub fn stats(&self) -> Option<IndexStats> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.stats().clone())
    }

    /// Summary information about the engine state.
    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            ready: self.is_ready(),
            stores: self.stores.read().unwrap_or_else(PoisonError::into_inner).len(),
            processors: self.config.processors.enabled.len(),
            index: self.stats(),
        }
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub ready: bool,
    pub stores: usize,
    pub processors: usize,
    pub index: Option<IndexStats>,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ontomap engine info")?;
        writeln!(f, "  ready:        {}", self.ready)?;
        writeln!(f, "  stores:       {}", self.stores)?;
        writeln!(f, "  processors:   {}", self.processors)?;
        if let Some(index) = &self.index {
            writeln!(f, "  summaries:    {}", index.summaries)?;
            writeln!(f, "  annotations:  {}", index.annotations)?;
            writeln!(f, "  values:       {}", index.distinct_values)?;
            writeln!(f, "  superseded:   {}", index.superseded_skipped)?;
            writeln!(f, "  untagged:     {}", index.untagged_skipped)?;
            writeln!(
                f,
                "  calibration:  {:.3} .. {:.3}",
                index.calibration.min, index.calibration.max
            )?;
            writeln!(f, "  built:        {} ({} ms)", index.built_at, index.build_millis)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("ready", &self.gate.is_ready())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, DatasourceError, OntomapError};
    use crate::model::{AnnotationSource, Evidence, Property, Provenance};
    use crate::store::InMemoryStore;
    use chrono::Utc;

    fn annotation(uri: &str, value: &str, tag: &str) -> Annotation {
        Annotation {
            uri: uri.into(),
            property: Property::typed("disease", value),
            semantic_tags: vec![tag.into()],
            provenance: Provenance {
                source: AnnotationSource::new("http://www.ebi.ac.uk/gwas", "gwas"),
                evidence: Evidence::ManualCurated,
                generated: Utc::now(),
                generator: None,
            },
            replaced_by: None,
        }
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.origin.boost = 0.0;
        assert!(matches!(
            Engine::new(config),
            Err(OntomapError::Config(ConfigError::Invalid { .. }))
        ));
    }

    #[test]
    fn search_before_build_times_out() {
        let mut config = EngineConfig::default();
        config.index.wait_timeout_ms = Some(10);
        let engine = Engine::new(config).unwrap();
        let err = engine.search("asthma").unwrap_err();
        assert!(err.is_retryable());
        assert!(engine.stats().is_none());
    }

    #[test]
    fn load_resolves_stores_by_name() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine.register_store(Arc::new(InMemoryStore::new(
            "gwas",
            vec![annotation("urn:1", "asthma", "http://efo/EFO_0000270")],
        )));
        assert!(matches!(
            engine.load("atlas"),
            Err(OntomapError::Datasource(DatasourceError::NotFound { .. }))
        ));
        let stats = engine.load("gwas").unwrap();
        assert_eq!(stats.summaries, 1);
        assert!(engine.is_ready());
        assert_eq!(engine.search("asthma").unwrap().len(), 1);
    }

    #[test]
    fn rebuild_swaps_snapshot() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine
            .rebuild(&[annotation("urn:1", "asthma", "http://efo/EFO_0000270")])
            .unwrap();
        let before = engine.snapshot().unwrap();
        engine
            .rebuild(&[
                annotation("urn:1", "asthma", "http://efo/EFO_0000270"),
                annotation("urn:2", "eczema", "http://efo/EFO_0000274"),
            ])
            .unwrap();
        // The old snapshot stays usable for whoever still holds it.
        assert_eq!(before.index().len(), 1);
        assert_eq!(engine.snapshot().unwrap().index().len(), 2);
        assert_eq!(engine.info().index.map(|s| s.summaries), Some(2));
    }

    #[test]
    fn closed_engine_refuses_searches() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine.rebuild(&[]).unwrap();
        engine.close();
        assert!(engine.search("asthma").is_err());
    }
}
