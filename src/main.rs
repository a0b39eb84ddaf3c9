//! # Shareholder RAG CLI (`srag`)
//!
//! ## Usage
//!
//! ```bash
//! srag --config ./config/srag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `srag ingest` | Extract, chunk, embed, and index the corpus |
//! | `srag query "<text>"` | Top-k chunks with similarity scores |
//! | `srag context "<text>"` | Top-k chunks formatted as LLM context |
//! | `srag ask "<question>"` | Retrieval-augmented answer |
//! | `srag clear` | Empty the index and delete the snapshot |
//! | `srag stats` | Record counts and per-year breakdown |
//! | `srag serve` | Start the HTTP server |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use shareholder_rag::answer::create_chat_model;
use shareholder_rag::config::{self, Config};
use shareholder_rag::server::{self, AppState};
use shareholder_rag::store::VectorStore;
use shareholder_rag::{index_cmd, search, stats};

/// Retrieval-augmented question answering over shareholder letters.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/srag.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "srag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// `stats` and `clear` fall back to built-in defaults when the file is
    /// missing.
    #[arg(long, global = true, default_value = "./config/srag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, chunk, embed, and index the configured corpus.
    Ingest {
        /// Ingest a single file instead of walking `[corpus].root`.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Show file and chunk counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the most similar chunks with scores.
    Query {
        text: String,

        #[arg(long)]
        top_k: Option<usize>,

        /// Only chunks from this letter year.
        #[arg(long)]
        year: Option<i64>,

        /// Exact metadata match as `key=value`; repeatable. Values parse as
        /// JSON when possible.
        #[arg(long = "filter", value_parser = search::parse_filter_pair)]
        filters: Vec<(String, Value)>,
    },

    /// Print retrieved chunks formatted as LLM context.
    Context {
        text: String,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        year: Option<i64>,
    },

    /// Answer a question from retrieved context.
    Ask {
        question: String,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        year: Option<i64>,
    },

    /// Empty the index and delete the snapshot file.
    Clear,

    /// Show index statistics.
    Stats,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that only touch the snapshot work without a config file.
    // A file that exists but is invalid is always an error.
    let cfg = match &cli.command {
        Commands::Stats | Commands::Clear if !cli.config.exists() => Config::minimal(),
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Ingest { file, dry_run } => {
            index_cmd::run_ingest(&cfg, file.as_deref(), dry_run).await?;
        }
        Commands::Query {
            text,
            top_k,
            year,
            filters,
        } => {
            search::run_query(&cfg, &text, top_k, year, filters).await?;
        }
        Commands::Context { text, top_k, year } => {
            search::run_context(&cfg, &text, top_k, year).await?;
        }
        Commands::Ask {
            question,
            top_k,
            year,
        } => {
            search::run_ask(&cfg, &question, top_k, year).await?;
        }
        Commands::Clear => {
            index_cmd::run_clear(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            let chat = if cfg.llm.is_enabled() {
                Some(create_chat_model(&cfg.llm)?)
            } else {
                None
            };
            let store = VectorStore::open_configured(&cfg).await?;
            server::run_server(AppState::new(cfg, store, chat)).await?;
        }
    }

    Ok(())
}
