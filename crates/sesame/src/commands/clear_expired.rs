//! Clear-expired command - deletes expired session records.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;
use sesame_session::SessionStore;

use super::Context;

/// Arguments for the clear-expired command.
#[derive(Args, Debug)]
pub struct ClearExpiredArgs {}

#[derive(Debug, Serialize)]
struct ClearExpiredOutput {
    removed: usize,
    remaining: usize,
}

/// Run the clear-expired command.
pub async fn run(_args: ClearExpiredArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let removed = store.clear_expired()?;
    let remaining = store.count()?;

    if ctx.json_output {
        let output = ClearExpiredOutput { removed, remaining };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let dim = Style::new().dim();
        println!(
            "Removed {} expired session{} {}",
            Style::new().bold().apply_to(removed),
            if removed == 1 { "" } else { "s" },
            dim.apply_to(format!("({remaining} remaining)"))
        );
    }

    Ok(())
}
