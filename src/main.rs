//! # Feedback Triage CLI (`triage`)
//!
//! The `triage` binary is the primary interface for Feedback Triage. It
//! provides commands for database initialization, pipeline runs, feedback
//! ingestion, report and dashboard inspection, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! triage --config ./config/triage.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `triage init` | Create the SQLite database and run schema migrations |
//! | `triage run` | Generate, classify, cluster, and report on feedback |
//! | `triage ingest <file>` | Triage externally collected feedback (JSON lines) |
//! | `triage report` | Print the latest triage report |
//! | `triage dashboard` | Print the dashboard view model |
//! | `triage stats` | Show database statistics |
//! | `triage serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! triage init --config ./config/triage.toml
//!
//! # Run the pipeline over 50 generated items
//! triage run --count 50 --config ./config/triage.toml
//!
//! # Preview a run without writing anything
//! triage run --dry-run --config ./config/triage.toml
//!
//! # Triage real feedback from a JSON-lines export
//! triage ingest ./feedback.jsonl --config ./config/triage.toml
//!
//! # Start the HTTP server (dashboard + run trigger)
//! triage serve --config ./config/triage.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use feedback_triage::{config, dashboard, migrate, pipeline, report, server, stats};

/// Feedback Triage CLI — an automated feedback triage pipeline for
/// product teams.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/triage.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "triage",
    about = "Feedback Triage — an automated feedback triage pipeline for product teams",
    version,
    long_about = "Feedback Triage classifies raw user feedback for sentiment, urgency, and \
    category (heuristic keywords or an AI provider with heuristic fallback), aggregates it into \
    per-category clusters with escalation scoring, and produces daily reports plus a dashboard \
    read model served over HTTP."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/triage.toml`. All database, classifier,
    /// generator, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/triage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (feedback, clusters, reports). This command is idempotent —
    /// running it multiple times is safe.
    Init,

    /// Run the triage pipeline over generated feedback.
    ///
    /// Generates synthetic feedback items, classifies each one, aggregates
    /// them into category clusters with escalation scoring, and writes a
    /// report. Use `ingest` instead to triage real feedback.
    Run {
        /// Number of feedback items to generate (defaults to `[generator].count`).
        #[arg(long)]
        count: Option<usize>,

        /// Dry run — classify and cluster in memory, print a summary,
        /// write nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Triage externally collected feedback from a JSON-lines file.
    ///
    /// Each line must be an object with `source`, `text`, and optionally
    /// `created_at` (epoch seconds; milliseconds are tolerated). Runs the
    /// same classify-cluster-report pipeline as `run`.
    Ingest {
        /// Path to the JSON-lines feedback file.
        path: PathBuf,

        /// Dry run — classify and cluster in memory, print a summary,
        /// write nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the latest triage report.
    Report,

    /// Print the dashboard view model.
    ///
    /// Shows headline stats, source breakdown, 7-day sentiment and volume
    /// trends, urgent issues, and recent activity.
    Dashboard {
        /// Emit the full view model as pretty-printed JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show database statistics.
    ///
    /// Feedback and cluster counts, classification coverage, report
    /// history, and a per-source breakdown.
    Stats,

    /// Start the HTTP server.
    ///
    /// Exposes the dashboard view model, the latest report, and a run
    /// trigger endpoint. With `[schedule] enabled = true`, also runs the
    /// pipeline on a fixed interval.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run { count, dry_run } => {
            pipeline::run_triage(&cfg, count, dry_run, false).await?;
        }
        Commands::Ingest { path, dry_run } => {
            pipeline::run_ingest(&cfg, &path, dry_run).await?;
        }
        Commands::Report => {
            report::run_report(&cfg).await?;
        }
        Commands::Dashboard { json } => {
            dashboard::run_dashboard(&cfg, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
