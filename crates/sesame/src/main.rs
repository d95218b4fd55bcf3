//! Sesame - housekeeping CLI for server-side session stores
//!
//! Main entry point for the sesame CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use sesame_config::{LoggingSection, default_data_dir, load_config};
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod commands;

use commands::{clear_expired, count, delete, inspect, sweep};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Sesame - housekeeping for server-side session stores
#[derive(Parser)]
#[command(name = "sesame")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file layered on top of discovered config
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Session database (overrides config and SESAME_DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Delete all expired session records
    ClearExpired(clear_expired::ClearExpiredArgs),

    /// Count session records
    Count(count::CountArgs),

    /// Show a session record
    Inspect(inspect::InspectArgs),

    /// Delete a session record
    Delete(delete::DeleteArgs),

    /// Periodically delete expired records until interrupted
    Sweep(sweep::SweepArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

const CRATES: &[&str] = &["sesame", "sesame_session", "sesame_store", "sesame_config"];

fn directives(level: &str, fallback: &str) -> String {
    let mut parts: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
    parts.push(fallback.to_string());
    parts.join(",")
}

/// Console (human-readable, stderr) plus optional rotating JSON file.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
fn init_tracing(verbose: bool, logging: &LoggingSection) -> Option<WorkerGuard> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let console_filter = if verbose {
        EnvFilter::new(directives("debug", "info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(directives(&logging.level, "warn")))
    };

    let (file_layer, guard) = if logging.file {
        let log_dir = logging
            .directory
            .clone()
            .unwrap_or_else(|| default_data_dir().join("logs"));
        let file_appender = tracing_appender::rolling::daily(&log_dir, "sesame.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new(directives("trace", "info")));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    let config = loaded.config;

    let _guard = init_tracing(cli.verbose, &config.logging());

    for warning in &loaded.warnings {
        warn!("{warning}");
    }
    for source in loaded.sources.iter().filter(|s| s.loaded) {
        debug!(path = %source.path.display(), "Loaded config layer");
    }

    let session = config
        .session()
        .to_session_config()
        .context("invalid [session] configuration")?;
    let db_path = cli
        .db
        .unwrap_or_else(|| config.store().database_path(&default_data_dir()));

    // Create context for commands
    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        db_path,
        session,
        store: config.store(),
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::ClearExpired(args) => clear_expired::run(args, &ctx).await,
        Commands::Count(args) => count::run(args, &ctx).await,
        Commands::Inspect(args) => inspect::run(args, &ctx).await,
        Commands::Delete(args) => delete::run(args, &ctx).await,
        Commands::Sweep(args) => sweep::run(args, &ctx).await,
    }
}
