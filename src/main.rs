//! # Lorebase CLI (`lore`)
//!
//! The `lore` binary drives the full pipeline: index initialization, corpus
//! ingestion, one-shot and conversational questions, and the HTTP query
//! server.
//!
//! ## Usage
//!
//! ```bash
//! lore --config ./config/lore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lore init` | Create the SQLite index and run schema migrations |
//! | `lore ingest` | Extract, chunk, and embed the corpus (reuses existing work) |
//! | `lore ingest --force` | Discard the index and caches, rebuild from scratch |
//! | `lore ask "<question>"` | Answer a question against the index |
//! | `lore serve` | Start the HTTP query server |
//!
//! ## Examples
//!
//! ```bash
//! lore init --config ./config/lore.toml
//! lore ingest --config ./config/lore.toml
//! lore ask "How did the siege end?" --session reading-group
//! lore serve --config ./config/lore.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lorebase::answer::QueryEngine;
use lorebase::config::{self, Config};
use lorebase::embedding::create_embedder;
use lorebase::extract::FsExtractor;
use lorebase::generation::create_generator;
use lorebase::index::Index;
use lorebase::ingest;
use lorebase::server;
use lorebase::session::RetrievalOptions;
use lorebase::sqlite_index::SqliteIndex;

/// Lorebase CLI — retrieval-augmented question answering over a local
/// document corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lore.example.toml` for a full example.
#[derive(Debug, Parser)]
#[command(
    name = "lore",
    about = "Lorebase — retrieval-augmented question answering over a local document corpus",
    version,
    long_about = "Lorebase ingests a directory of text, markdown, and PDF documents into a \
    persistent chunk index, then answers natural-language questions against it with a \
    generation model, citing the source documents. Conversations are session-scoped."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Initialize the index database schema.
    ///
    /// Creates the SQLite file and all required tables. Idempotent.
    Init,

    /// Ingest the corpus into the index.
    ///
    /// Reuses a populated index or the extraction cache when available;
    /// otherwise scans the corpus, extracts, normalizes, chunks, and embeds
    /// every document.
    Ingest {
        /// Discard the existing index and extraction cache first.
        #[arg(long)]
        force: bool,
    },

    /// Answer a single question against the index.
    ///
    /// Runs ingestion first if the index is not yet populated.
    Ask {
        /// The question to answer.
        question: String,

        /// Session id for a conversational exchange. Repeated invocations
        /// with the same id within one server process share history; for
        /// the one-shot CLI this mainly exercises the session path.
        #[arg(long)]
        session: Option<String>,

        /// Number of chunks to retrieve (sessionless queries only).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        top_k: Option<u64>,
    },

    /// Start the HTTP query server.
    ///
    /// Runs ingestion first if the index is not yet populated, then serves
    /// `POST /query` and `GET /health` on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let index = SqliteIndex::open(&cfg.index.path).await?;
            index.pool().close().await;
            println!("Index initialized at {}", cfg.index.path.display());
        }
        Commands::Ingest { force } => {
            if force {
                for path in ingest::discard_artifacts(&cfg)? {
                    println!("Removed {}", path.display());
                }
            }
            let chunks = build_index_only(&cfg).await?;
            println!("Ingest complete.");
            println!("  index:  {}", cfg.index.path.display());
            println!("  chunks: {}", chunks);
        }
        Commands::Ask {
            question,
            session,
            top_k,
        } => {
            let engine = build_engine(&cfg).await?;
            let answer = engine
                .answer(session.as_deref(), &question, top_k.map(|k| k as usize))
                .await?;
            println!("Response: {}", answer.response);
            println!("Sources: {:?}", answer.sources);
        }
        Commands::Serve => {
            let engine = build_engine(&cfg).await?;
            server::run_server(&cfg.server, engine).await?;
        }
    }

    Ok(())
}

/// Run the ingestion ladder and report the chunk count.
async fn build_index_only(cfg: &Config) -> Result<u64> {
    let extractor = FsExtractor::new(cfg.corpus.root.clone());
    let embedder = create_embedder(&cfg.embedding)?;
    let index = ingest::ensure_index(cfg, &extractor, embedder.as_ref()).await?;
    let count = index.count().await?;
    index.pool().close().await;
    Ok(count)
}

/// Ensure the index is populated and assemble the query engine.
async fn build_engine(cfg: &Config) -> Result<Arc<QueryEngine>> {
    let extractor = FsExtractor::new(cfg.corpus.root.clone());
    let embedder = create_embedder(&cfg.embedding)?;
    let index = ingest::ensure_index(cfg, &extractor, embedder.as_ref()).await?;
    let generator = create_generator(&cfg.generation)?;

    Ok(Arc::new(QueryEngine::new(
        Arc::new(index),
        Arc::from(embedder),
        Arc::from(generator),
        RetrievalOptions {
            top_k: cfg.retrieval.top_k,
        },
    )))
}
