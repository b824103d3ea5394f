// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # ontomap
//!
//! Maps free-text metadata (a property value, optionally with a property
//! type) to ontology concepts, using a corpus of previously curated
//! annotations.
//!
//! ## Architecture
//!
//! - **Model** (`model`): annotations with provenance, and the deduplicated
//!   summaries derived from them
//! - **Index** (`index`): parallel summary build plus an in-memory tantivy
//!   index over the summaries, searched with phrase and keyword queries
//! - **Search** (`search`): raw, processed, approximate and origin stages over
//!   one index snapshot
//! - **Processors** (`processor`): rewrites for brackets, compounds, anatomical
//!   qualifiers, time spans and conjunctions
//! - **Scoring** (`score`): evidence, recency, frequency and source-ranking
//!   scores, calibrated into a fixed window
//! - **Prediction** (`prediction`): confidence tiers over ranked results
//!
//! ## Library usage
//!
//! ```no_run
//! use ontomap::config::EngineConfig;
//! use ontomap::engine::Engine;
//! use ontomap::store::JsonFileStore;
//! use std::sync::Arc;
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.register_store(Arc::new(JsonFileStore::new("gwas", "gwas.json")));
//! engine.load("gwas").unwrap();
//! for hit in engine.search_typed(Some("disease"), "asthma").unwrap() {
//!     println!("{:?} {:.1}", hit.summary.semantic_tags, hit.score);
//! }
//! ```

pub mod analysis;
pub mod approximate;
pub mod config;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod gate;
pub mod index;
pub mod model;
pub mod normalize;
pub mod prediction;
pub mod processor;
pub mod query;
pub mod score;
pub mod search;
pub mod store;
