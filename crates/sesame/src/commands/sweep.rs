//! Sweep command - runs the expiry sweeper in the foreground.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use console::Style;
use sesame_session::SessionStore;
use sesame_store::spawn_cleanup_task;
use tracing::info;

use super::Context;

/// Arguments for the sweep command.
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Seconds between sweeps (default: store.sweep_interval_secs)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

/// Run the sweep command until Ctrl-C.
///
/// One sweep runs immediately; the background task handles the rest.
pub async fn run(args: SweepArgs, ctx: &Context) -> Result<()> {
    let store = Arc::new(ctx.open_store()?);
    let secs = args.interval.unwrap_or(ctx.store.sweep_interval_secs).max(1);

    let removed = store.clear_expired()?;
    info!(removed, interval_secs = secs, "Initial sweep completed");

    if !ctx.json_output {
        let dim = Style::new().dim();
        println!(
            "Sweeping {} every {}s {}",
            ctx.db_path.display(),
            secs,
            dim.apply_to("(Ctrl-C to stop)")
        );
    }

    let handle = spawn_cleanup_task(Arc::clone(&store), Duration::from_secs(secs));
    tokio::signal::ctrl_c().await?;
    handle.abort();

    info!("Sweeper stopped");
    Ok(())
}
