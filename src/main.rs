//! # sheetrag CLI (`srag`)
//!
//! Turns office documents into size-bounded JSON chunk files, stages them in
//! SQLite, indexes them for full-text search, and answers questions from a
//! length-budgeted retrieval context.
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
//! | `srag init` | Create the staging table and full-text index |
//! | `srag parse <path>...` | Parse documents and write chunk files |
//! | `srag stage <dir>` | Load chunk files into the staging table |
//! | `srag index` | Build the full-text index from staged records |
//! | `srag search "<query>"` | Print ranked hits |
//! | `srag context "<query>"` | Print the assembled retrieval context |
//! | `srag ask "<query>"` | Retrieve context and generate an answer |
//! | `srag eval <questions.xlsx>` | Measure Recall@1/3/5 over a question set |
//!
//! ## Example
//!
//! ```bash
//! srag init
//! srag parse ./inbox --output-dir ./output
//! srag stage ./output
//! srag index
//! srag ask "Which resistors are rated above 1W?"
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sheetrag::{ask, config, eval, index, ingest, migrate, search, stage};

/// sheetrag: office documents in, grounded answers out.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "srag",
    about = "Normalize office documents into searchable chunks and answer questions over them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/srag.toml`. `srag parse` falls back to built-in
    /// defaults when the file does not exist.
    #[arg(long, global = true, default_value = "./config/srag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database, the `staged_records` table, and the
    /// `records_fts` index. Safe to run repeatedly.
    Init,

    /// Parse office documents into chunk files.
    ///
    /// Accepts `.xlsx`, `.pptx`, and `.docx` files or directories. Writes
    /// one JSON file (plus a `.manifest.json` sidecar) per sheet, chunk,
    /// slide, or word document. Exits non-zero if any document failed.
    Parse {
        /// Files or directories to parse.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output directory (overrides `[chunking] output_dir`).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Load chunk files into the staging table.
    ///
    /// Existing `(file_name, sheet_name)` pairs are skipped.
    Stage {
        /// Directory of chunk files written by `srag parse`.
        dir: PathBuf,
    },

    /// Build the full-text index from staged records.
    Index {
        /// Drop all index entries and rebuild from scratch.
        #[arg(long)]
        clear: bool,
    },

    /// Search the index and print ranked hits.
    Search {
        query: String,

        /// Maximum number of hits (defaults to `[retrieval] result_limit`).
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print the retrieval context assembled for a query.
    Context { query: String },

    /// Answer a question from the retrieved context.
    Ask {
        query: String,

        /// Also write the sources and answer to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Measure retrieval recall over a question set.
    ///
    /// The spreadsheet needs a question column (`问题` or `question`) and an
    /// expected-source column (`文档名_表名` or `source`) holding
    /// `{file_name}_{sheet_name}`. Prints Recall@1, @3 and @5.
    Eval {
        /// Question set (`.xlsx`).
        questions: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Parsing needs no database; it runs on defaults when there is no config.
    let cfg = match &cli.command {
        Commands::Parse { .. } if !cli.config.exists() => config::Config::minimal(),
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Parse { paths, output_dir } => {
            ingest::run_parse(&cfg, &paths, output_dir.as_deref()).await?;
        }
        Commands::Stage { dir } => {
            stage::run_stage(&cfg, &dir).await?;
        }
        Commands::Index { clear } => {
            index::run_index(&cfg, clear).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Context { query } => {
            ask::run_context(&cfg, &query).await?;
        }
        Commands::Ask { query, output } => {
            ask::run_ask(&cfg, &query, output.as_deref()).await?;
        }
        Commands::Eval { questions } => {
            eval::run_eval(&cfg, &questions).await?;
        }
    }

    Ok(())
}
