//! # Eco Context CLI (`eco`)
//!
//! The `eco` binary manages the retrieval store behind the climate
//! education backend: dataset ingestion, one-off searches, lesson context
//! assembly, and the HTTP retrieval server.
//!
//! ## Usage
//!
//! ```bash
//! eco --config ./config/eco.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `eco ingest` | Load the configured datasets and write a snapshot |
//! | `eco search "<query>"` | k-NN search over indexed documents |
//! | `eco context <lesson_id>` | Print prompt-ready context for a lesson |
//! | `eco status` | Show snapshot document counts and model info |
//! | `eco serve` | Start the JSON HTTP retrieval server |
//!
//! ## Examples
//!
//! ```bash
//! # Build the snapshot from all configured datasets
//! eco ingest --config ./config/eco.toml
//!
//! # Rebuild just one dataset's source
//! eco ingest --dataset climate_headlines
//!
//! # Search, scoped to a lesson
//! eco search "average temperature in France" --lesson climate_france
//!
//! # Context for a quiz prompt
//! eco context climate_france --person student_1
//!
//! # Serve the HTTP API
//! eco serve --config ./config/eco.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use eco_context::{config, ingest, search, server, status};

/// Eco Context CLI — the retrieval store behind the climate education
/// backend.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/eco.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "eco",
    about = "Eco Context — dataset ingestion and semantic retrieval for climate education",
    version,
    long_about = "Eco Context ingests climate datasets (CSV, JSON, JSONL), normalizes rows into \
    descriptive text, embeds them, and serves metadata-filtered nearest-neighbor retrieval via a \
    CLI and a JSON HTTP server used by the chat and quiz backends."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/eco.toml`. All dataset, embedding, retrieval,
    /// and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/eco.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest the configured datasets into a fresh snapshot.
    ///
    /// Loads every `[[datasets]]` entry, normalizes and embeds the rows,
    /// and writes `<snapshot>.index` and `<snapshot>.data`. A dataset that
    /// fails to load is skipped; the rest still ingest.
    Ingest {
        /// Ingest only the named dataset instead of all configured ones.
        #[arg(long)]
        dataset: Option<String>,
    },

    /// Search the snapshot with a free-text query.
    ///
    /// Embeds the query and returns the nearest documents by squared
    /// Euclidean distance, optionally restricted by metadata filters.
    Search {
        /// The search query string.
        query: String,

        /// Number of results (defaults to `[retrieval].default_k`).
        #[arg(long)]
        k: Option<usize>,

        /// Restrict results to one lesson.
        #[arg(long)]
        lesson: Option<String>,

        /// Restrict results to one person.
        #[arg(long)]
        person: Option<String>,

        /// Restrict results to one dataset.
        #[arg(long)]
        dataset: Option<String>,

        /// Extra exact-match metadata filters as `key=value` pairs.
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,
    },

    /// Print prompt-ready context for a lesson.
    ///
    /// Retrieves the most relevant chunks scoped to the lesson (and person,
    /// when given) and prints them joined by blank lines.
    Context {
        /// Lesson identifier (e.g., `climate_france`).
        lesson_id: String,

        /// Scope retrieval to one person.
        #[arg(long)]
        person: Option<String>,

        /// Scope retrieval to one dataset.
        #[arg(long)]
        dataset: Option<String>,

        /// Retrieval query (defaults to a query naming the lesson).
        #[arg(long)]
        query: Option<String>,

        /// Number of chunks (defaults to `[retrieval].default_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Show snapshot health: document counts, dimension, and model.
    Status,

    /// Start the JSON HTTP retrieval server.
    ///
    /// Loads the snapshot (ingesting first if none exists) and binds to
    /// the address configured in `[server].bind`.
    Serve,
}

/// Parse a `key=value` pair for `--filter` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { dataset } => {
            ingest::run_ingest(&cfg, dataset.as_deref()).await?;
        }
        Commands::Search {
            query,
            k,
            lesson,
            person,
            dataset,
            filters,
        } => {
            search::run_search(
                &cfg,
                search::SearchArgs {
                    query,
                    k,
                    lesson,
                    person,
                    dataset,
                    filters,
                },
            )
            .await?;
        }
        Commands::Context {
            lesson_id,
            person,
            dataset,
            query,
            k,
        } => {
            search::run_context(
                &cfg,
                &lesson_id,
                person.as_deref(),
                dataset.as_deref(),
                query.as_deref(),
                k,
            )
            .await?;
        }
        Commands::Status => {
            status::run_status(&cfg)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
