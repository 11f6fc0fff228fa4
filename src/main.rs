//! # docchat CLI
//!
//! The `docchat` binary wires the index provisioner and the query-response
//! pipeline to a command line and an HTTP chat server.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat index` | Build the index (first run) or reload the persisted one |
//! | `docchat ask "<question>"` | Answer one question and print its sources |
//! | `docchat serve` | Start the HTTP chat server |
//! | `docchat status` | Show persisted-index metadata |
//!
//! The OpenAI API key is read from `OPENAI_API_KEY` (a `.env` file next to
//! the working directory is honored).

mod chunk;
mod config;
mod embedding;
mod error;
mod extract;
mod index;
mod llm;
mod loader;
mod models;
mod provision;
mod query;
mod server;
mod session;
mod store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::embedding::OpenAiEmbedder;
use crate::llm::OpenAiChatModel;
use crate::provision::IndexProvisioner;
use crate::query::RetrievalQueryEngine;

/// docchat — chat with a directory of documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat — a local-first document chat assistant",
    version,
    long_about = "docchat loads documents from a directory, builds a persisted vector index over \
    overlapping chunks, and answers questions with retrieval-grounded chat completions, citing \
    the source files behind every answer."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the index, or reload it if already persisted.
    ///
    /// On first run this loads the document directory, chunks and embeds
    /// everything, and persists the index. On later runs it reloads the
    /// persisted index. Either way it prints a summary report.
    Index {
        /// Delete the persisted index first and rebuild from scratch.
        #[arg(long)]
        rebuild: bool,
    },

    /// Ask one question and print the answer plus its source files.
    Ask {
        /// The question.
        question: String,
    },

    /// Start the HTTP chat server.
    ///
    /// Provisions the index, then serves `POST /chat`, `GET /history`,
    /// `POST /history/clear`, and `GET /health` on the configured bind
    /// address.
    Serve,

    /// Show persisted-index metadata without loading vectors.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Secrets may live in a .env file, as in local dev setups.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { rebuild } => {
            if rebuild && cfg.index.persist_dir.exists() {
                std::fs::remove_dir_all(&cfg.index.persist_dir)?;
            }
            let provisioner = build_provisioner(&cfg)?;
            let index = provisioner.get().await?;
            let meta = index.meta();
            println!("index ready");
            println!("  documents: {}", meta.document_count);
            println!("  chunks: {}", meta.chunk_count);
            println!("  embedding model: {} ({} dims)", meta.embedding_model, meta.dims);
            println!(
                "  chunking: {} chars, {} overlap",
                meta.chunk_size, meta.chunk_overlap
            );
            println!("  persisted at: {}", cfg.index.persist_dir.display());
        }
        Commands::Ask { question } => {
            if question.trim().is_empty() {
                anyhow::bail!("question must not be empty");
            }
            let provisioner = build_provisioner(&cfg)?;
            let index = provisioner.get().await?;
            let engine = build_engine(&cfg, index)?;

            let turn = query::answer(&engine, question.trim()).await;
            println!("{}", turn.content);
            if let Some(files) = turn.source_files {
                if !files.is_empty() {
                    println!();
                    println!("sources:");
                    for file in files {
                        println!("  {}", file);
                    }
                }
            }
        }
        Commands::Serve => {
            let provisioner = build_provisioner(&cfg)?;
            let index = provisioner.get().await?;
            let engine = Arc::new(build_engine(&cfg, index)?);
            server::run_server(&cfg, engine).await?;
        }
        Commands::Status => {
            let db_path = config::index_db_path(&cfg);
            if !db_path.exists() {
                println!("no persisted index at {}", cfg.index.persist_dir.display());
                return Ok(());
            }
            let pool = store::connect(&db_path, false).await?;
            let meta = store::load_meta(&pool).await?;
            pool.close().await;

            println!("persisted index");
            println!("  documents: {}", meta.document_count);
            println!("  chunks: {}", meta.chunk_count);
            println!("  embedding model: {} ({} dims)", meta.embedding_model, meta.dims);
            println!(
                "  chunking: {} chars, {} overlap",
                meta.chunk_size, meta.chunk_overlap
            );
            if let Some(built) = chrono::DateTime::from_timestamp(meta.built_at, 0) {
                println!("  built at: {}", built.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
    }

    Ok(())
}

fn build_provisioner(cfg: &config::Config) -> anyhow::Result<IndexProvisioner> {
    let embedder = Arc::new(OpenAiEmbedder::new(&cfg.embedding)?);
    Ok(IndexProvisioner::new(cfg.clone(), embedder))
}

fn build_engine(
    cfg: &config::Config,
    index: Arc<index::VectorIndex>,
) -> anyhow::Result<RetrievalQueryEngine> {
    let embedder = Arc::new(OpenAiEmbedder::new(&cfg.embedding)?);
    let chat_model = Arc::new(OpenAiChatModel::new(&cfg.llm)?);
    Ok(RetrievalQueryEngine::new(cfg, index, embedder, chat_model))
}
