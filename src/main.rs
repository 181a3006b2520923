//! # docdex CLI
//!
//! The `docdex` binary is the shell over the ingestion and search core.
//!
//! ## Usage
//!
//! ```bash
//! docdex --config ./config/docdex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docdex init` | Create the SQLite database and run schema migrations |
//! | `docdex ingest [PATHS]...` | Ingest documents (default: scan the import root) |
//! | `docdex search "<query>"` | Substring search over indexed chunks |
//! | `docdex remove <source>` | Purge a source whose file was removed |
//! | `docdex status` | Show import state and index counts |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docdex::{config, db, migrate, pipeline, search, status};

/// docdex — office-document ingestion, chunking, and substring search with
/// a warm result cache.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docdex.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docdex",
    about = "docdex — office-document ingestion, chunking, and substring search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (sources,
    /// chunks, query_cache, query_cache_sources, meta). Idempotent.
    Init,

    /// Ingest documents.
    ///
    /// Fingerprints each candidate, skips unchanged sources, replaces
    /// changed ones, and splits new content into searchable chunks.
    /// Without explicit paths, scans the configured import root and purges
    /// sources whose files have disappeared.
    Ingest {
        /// Explicit files to ingest instead of scanning the import root.
        paths: Vec<PathBuf>,

        /// Classify candidates without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search indexed chunks for a literal substring.
    ///
    /// Case-sensitive containment match; an empty query matches everything.
    /// Served from the query cache when the result is still warm.
    Search {
        /// The search string.
        query: String,

        /// Emit the rendered result as JSON instead of HTML.
        #[arg(long)]
        json: bool,
    },

    /// Remove a source and everything derived from it.
    ///
    /// Deletes the source's chunks, crop images, registry row, and every
    /// cached query that referenced it. Safe to call for unknown names.
    Remove {
        /// Source name as recorded at import time (its path).
        source: String,
    },

    /// Show import state and index counts.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths, dry_run } => {
            pipeline::run_ingest(&cfg, &paths, dry_run).await?;
        }
        Commands::Search { query, json } => {
            search::run_search(&cfg, &query, json).await?;
        }
        Commands::Remove { source } => {
            pipeline::run_remove(&cfg, &source).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
    }

    Ok(())
}
