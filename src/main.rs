//! ontomap CLI: search a JSON annotation corpus for ontology mappings.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use ontomap::config::EngineConfig;
use ontomap::engine::Engine;
use ontomap::search::OriginPreference;
use ontomap::store::{AnnotationStore, JsonFileStore};

#[derive(Parser)]
#[command(name = "ontomap", version, about = "Map metadata values to ontology terms")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON array of annotations to index.
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for summaries matching a property value.
    Search {
        /// Property value to search for.
        value: String,

        /// Property type to prefer.
        #[arg(long = "type")]
        property_type: Option<String>,

        /// Preferred origins (source uri, name or topic), comma-separated.
        #[arg(long, value_delimiter = ',')]
        origin: Vec<String>,

        /// Only return results from the preferred origins.
        #[arg(long, requires = "origin")]
        filter: bool,

        /// Maximum number of results to print.
        #[arg(long, default_value = "10")]
        top_k: usize,
    },

    /// Predict semantic tags with a confidence tier.
    Predict {
        /// Property value to annotate.
        value: String,

        /// Property type.
        #[arg(long = "type")]
        property_type: Option<String>,

        /// Preferred origins, comma-separated.
        #[arg(long, value_delimiter = ',')]
        origin: Vec<String>,

        /// Only use results from the preferred origins.
        #[arg(long, requires = "origin")]
        filter: bool,
    },

    /// List summaries whose value starts with a prefix.
    Prefix {
        prefix: String,

        #[arg(long = "type")]
        property_type: Option<String>,

        #[arg(long, default_value = "10")]
        top_k: usize,
    },

    /// Find summaries by semantic tag short names (e.g. EFO_0000270).
    Tags {
        #[arg(required = true)]
        short_names: Vec<String>,

        /// Require every short name instead of any.
        #[arg(long)]
        all: bool,
    },

    /// Build the index and show engine statistics.
    Stats,

    /// Print the effective configuration as TOML.
    Config,
}

fn origin_preference(origin: Vec<String>, filter: bool) -> Option<OriginPreference> {
    if origin.is_empty() {
        None
    } else if filter {
        Some(OriginPreference::filter(origin))
    } else {
        Some(OriginPreference::boost(origin))
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{text}");
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let open_engine = || -> Result<Engine> {
        let corpus = cli
            .corpus
            .clone()
            .ok_or_else(|| miette::miette!("--corpus is required for this command"))?;
        let engine = Engine::new(config.clone())?;
        let store = JsonFileStore::from_path(corpus);
        let name = store.name().to_string();
        engine.register_store(Arc::new(store));
        engine.load(&name)?;
        Ok(engine)
    };

    match cli.command {
        Commands::Search {
            value,
            property_type,
            origin,
            filter,
            top_k,
        } => {
            let engine = open_engine()?;
            let results = match origin_preference(origin, filter) {
                Some(pref) => engine.search_with_origin(property_type.as_deref(), &value, &pref)?,
                None => engine.search_typed(property_type.as_deref(), &value)?,
            };
            let shown: Vec<_> = results.into_iter().take(top_k).collect();
            print_json(&shown)?;
        }

        Commands::Predict {
            value,
            property_type,
            origin,
            filter,
        } => {
            let engine = open_engine()?;
            let preference = origin_preference(origin, filter);
            let predictions = engine.predict(property_type.as_deref(), &value, preference.as_ref())?;
            print_json(&predictions)?;
        }

        Commands::Prefix {
            prefix,
            property_type,
            top_k,
        } => {
            let engine = open_engine()?;
            let results = engine.search_by_prefix(property_type.as_deref(), &prefix)?;
            let shown: Vec<_> = results.into_iter().take(top_k).collect();
            print_json(&shown)?;
        }

        Commands::Tags { short_names, all } => {
            let engine = open_engine()?;
            let results = engine.search_by_semantic_tags(&short_names, all)?;
            print_json(&results)?;
        }

        Commands::Stats => {
            let engine = open_engine()?;
            println!("{}", engine.info());
        }

        Commands::Config => {
            config.validate()?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
