//! Delete command - removes one session record.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;
use tracing::info;

use super::Context;

/// Arguments for the delete command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Session key to delete
    pub key: String,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    deleted: bool,
}

/// Run the delete command.
///
/// Deleting an absent key is not an error; the output says so.
pub async fn run(args: DeleteArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let deleted = store.delete_record(&args.key)?;
    if deleted {
        info!("Session record deleted from CLI");
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&DeleteOutput { deleted })?);
    } else if deleted {
        println!("{}", Style::new().green().apply_to("Deleted session"));
    } else {
        println!("{}", Style::new().dim().apply_to("No session with that key"));
    }

    Ok(())
}
