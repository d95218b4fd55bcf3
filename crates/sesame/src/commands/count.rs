//! Count command - reports how many session records exist.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::Context;

/// Arguments for the count command.
#[derive(Args, Debug)]
pub struct CountArgs {
    /// List keys, soonest-expiring first
    #[arg(short, long)]
    pub keys: bool,
}

#[derive(Debug, Serialize)]
struct CountOutput {
    total: usize,
    active: usize,
    expired: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    keys: Option<Vec<String>>,
}

/// Run the count command.
pub async fn run(args: CountArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let total = store.count()?;
    let active = store.count_active()?;
    let keys = if args.keys {
        Some(store.list_keys()?)
    } else {
        None
    };

    let output = CountOutput {
        total,
        active,
        expired: total.saturating_sub(active),
        keys,
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!();
    println!("{}", style("Session Store").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("Database:"), ctx.db_path.display());
    println!("  {} {}", dim.apply_to("Total:   "), output.total);
    println!(
        "  {} {}",
        dim.apply_to("Active:  "),
        Style::new().green().apply_to(output.active)
    );
    println!(
        "  {} {}",
        dim.apply_to("Expired: "),
        Style::new().yellow().apply_to(output.expired)
    );
    if let Some(keys) = &output.keys {
        println!();
        for key in keys {
            println!("  {key}");
        }
    }
    println!();

    Ok(())
}
