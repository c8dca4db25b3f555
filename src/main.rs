//! # passage CLI
//!
//! ## Usage
//!
//! ```bash
//! passage --config ./config/passage.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `passage serve` | Start the HTTP gateway |
//! | `passage init` | Create the vector collection if it does not exist |
//! | `passage ingest <file>` | Extract, embed and store one document |
//! | `passage ask "<question>"` | Answer a question from the stored documents |
//!
//! `init`, `ingest` and `ask` need `store.backend = "qdrant"`; the in-memory
//! backend is only accepted by `serve`.
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `passage=info,tower_http=info`).

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use passage::answer::{answer_question, AnswerStatus};
use passage::clients::Clients;
use passage::config;
use passage::ingest::ingest_path;
use passage::server;

/// Ask questions about your own documents.
///
/// Every command accepts `--config`. A missing config file is not an error:
/// defaults plus environment variables (`OPENAI_API_KEY`, `QDRANT_URL`, ...)
/// are used instead.
#[derive(Parser)]
#[command(
    name = "passage",
    about = "Retrieval-augmented question answering over uploaded documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/passage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway.
    ///
    /// Binds to `[server].bind` (or `PORT`) and serves `/ingest`, `/chat`
    /// and `/health`.
    Serve,

    /// Create the configured collection.
    ///
    /// Idempotent: an existing collection is left untouched.
    Init,

    /// Ingest a PDF or plain-text file.
    Ingest {
        /// File to ingest.
        path: PathBuf,
    },

    /// Ask a question against the ingested documents.
    Ask {
        /// The question.
        question: String,

        /// Also print the retrieved context.
        #[arg(long)]
        show_context: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("passage=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(Some(&cli.config))?;

    // One-shot commands would write to a store that vanishes when they exit.
    if cfg.store.backend == "memory" && !matches!(cli.command, Commands::Serve) {
        bail!(
            "The memory backend only lives as long as `passage serve`. \
             Set store.backend = \"qdrant\" to use init, ingest or ask."
        );
    }

    let clients = Clients::from_config(&cfg)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg, clients).await?;
        }
        Commands::Init => {
            let spec = cfg.collection_spec();
            clients
                .store
                .ensure_collection(&spec)
                .await
                .with_context(|| format!("Failed to create collection '{}'", spec.name))?;
            println!(
                "Collection '{}' ready ({} dims, {:?}).",
                spec.name, spec.dims, spec.distance
            );
        }
        Commands::Ingest { path } => {
            let report = ingest_path(&clients, &cfg, &path)
                .await
                .with_context(|| format!("Failed to ingest {}", path.display()))?;
            println!(
                "Ingested {} ({} characters, {} chunk(s)) into '{}'.",
                path.display(),
                report.characters,
                report.chunks,
                report.collection
            );
            for id in &report.ids {
                println!("  {}", id);
            }
        }
        Commands::Ask {
            question,
            show_context,
        } => {
            let answer = answer_question(&clients, &cfg, &question).await?;
            println!("{}", answer.answer);
            if show_context && !answer.context.is_empty() {
                println!();
                println!("--- context ---");
                println!("{}", answer.context);
            }
            if answer.status == AnswerStatus::Degraded {
                if let Some(err) = &answer.error {
                    eprintln!("[{}] {}", err.code.code(), err.detail);
                }
            }
        }
    }

    Ok(())
}
