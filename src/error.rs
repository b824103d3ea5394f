//! Errors raised while formulating queries, building the summary index,
//! resolving datasources and loading configuration or dictionaries.
//!
//! Every variant carries an `ontomap::<area>::<name>` diagnostic code and a
//! hint for the operator. Only an unavailable index is worth retrying.

use miette::Diagnostic;
use thiserror::Error;

/// Any failure an [`Engine`](crate::engine::Engine) call can report.
///
/// Wraps the per-area errors without adding text of its own, so the code and
/// hint shown are those of the area that failed.
#[derive(Debug, Error, Diagnostic)]
pub enum OntomapError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Datasource(#[from] DatasourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Dictionary(#[from] DictionaryError),
}

impl OntomapError {
    /// Whether the failed call may succeed if issued again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Index(IndexError::Unavailable { .. }))
    }
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("search pattern \"{pattern}\" contains no searchable terms")]
    #[diagnostic(
        code(ontomap::query::no_terms),
        help(
            "The pattern tokenized to zero terms, which happens for empty input \
             or input made only of punctuation. Supply at least one letter or digit."
        )
    )]
    NoTerms { pattern: String },

    #[error("unknown query kind: \"{kind}\"")]
    #[diagnostic(
        code(ontomap::query::unknown_kind),
        help("Valid query kinds are: exact, full, prefix, suffix.")
    )]
    UnknownKind { kind: String },

    #[error("search backend rejected the query: {0}")]
    #[diagnostic(
        code(ontomap::query::backend),
        help("The pattern produced a term or regex the full-text index could not run.")
    )]
    Backend(#[from] tantivy::TantivyError),
}

// ---------------------------------------------------------------------------
// Index errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error("summary index is not available: {reason}")]
    #[diagnostic(
        code(ontomap::index::unavailable),
        help(
            "The index is still being built or the wait for it was interrupted. \
             This condition is transient; retry the query shortly."
        )
    )]
    Unavailable { reason: String },

    #[error("summary id collision on {id}: [{existing}] vs [{incoming}]")]
    #[diagnostic(
        code(ontomap::index::hash_collision),
        help(
            "Two different (type, value, tags) contents produced the same summary id. \
             The build was aborted to keep unrelated summaries from being merged. \
             Report the two contents shown above."
        )
    )]
    HashCollision {
        id: String,
        existing: String,
        incoming: String,
    },

    #[error("index worker pool failed: {message}")]
    #[diagnostic(
        code(ontomap::index::worker_pool),
        help("The build thread pool could not be created. Check the configured chunk settings.")
    )]
    WorkerPool { message: String },

    #[error("full-text index could not be written: {0}")]
    #[diagnostic(
        code(ontomap::index::backend),
        help("The in-memory tantivy index failed while adding or committing summary records.")
    )]
    Backend(#[from] tantivy::TantivyError),
}

// ---------------------------------------------------------------------------
// Datasource errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DatasourceError {
    #[error("no datasource named \"{name}\"")]
    #[diagnostic(
        code(ontomap::datasource::not_found),
        help("Register the store with `Engine::register_store` before loading it by name.")
    )]
    NotFound { name: String },

    #[error("datasource name \"{name}\" is ambiguous ({count} stores match)")]
    #[diagnostic(
        code(ontomap::datasource::ambiguous),
        help("Give every registered store a distinct name.")
    )]
    Ambiguous { name: String, count: usize },

    #[error("failed to read annotations from {path}")]
    #[diagnostic(
        code(ontomap::datasource::read),
        help("Ensure the corpus file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse annotations from {path}: {message}")]
    #[diagnostic(
        code(ontomap::datasource::parse),
        help("The corpus file must be a JSON array of annotation objects.")
    )]
    Parse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read engine config: {path}")]
    #[diagnostic(
        code(ontomap::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse engine config: {path}: {message}")]
    #[diagnostic(
        code(ontomap::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid engine configuration: {message}")]
    #[diagnostic(
        code(ontomap::config::invalid),
        help("Fix the offending value in the config file, or omit it to use the default.")
    )]
    Invalid { message: String },
}

// ---------------------------------------------------------------------------
// Dictionary errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DictionaryError {
    #[error("failed to read {kind} dictionary: {path}")]
    #[diagnostic(
        code(ontomap::dictionary::read),
        help("Check the configured dictionary path, or remove it to use the bundled default.")
    )]
    Read {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type OntomapResult<T> = std::result::Result<T, OntomapError>;
