//! Inspect command - shows one session record.

use anyhow::{Result, bail};
use chrono::Utc;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use serde_json::Value;
use sesame_session::{EXPIRY_KEY, ExpiryPolicy, JsonCodec, SessionCodec, SessionExpiry};

use super::Context;

/// Arguments for the inspect command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Session key to show
    pub key: String,
}

#[derive(Debug, Serialize)]
struct InspectOutput {
    key: String,
    expires_at: String,
    expired: bool,
    browser_session: bool,
    data: Value,
}

/// Run the inspect command.
///
/// Expired records are shown too, flagged as such.
pub async fn run(args: InspectArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let Some(record) = store.get_record(&args.key)? else {
        bail!("no session with key '{}'", args.key);
    };

    let expired = record.is_expired(Utc::now());
    let (data, override_expiry) = match JsonCodec.decode(&record.data) {
        Ok(map) => {
            let expiry = match map.get(EXPIRY_KEY) {
                Some(value) => SessionExpiry::from_value(value).ok().flatten(),
                None => None,
            };
            (Value::Object(map), expiry)
        }
        // Not JSON: show the raw payload.
        Err(_) => (Value::String(record.data.clone()), None),
    };
    let browser_session =
        ExpiryPolicy::from_config(&ctx.session).expire_at_browser_close(override_expiry);

    let output = InspectOutput {
        key: record.key.clone(),
        expires_at: sesame_session::format_timestamp(&record.expires_at),
        expired,
        browser_session,
        data,
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let status = if expired {
        Style::new().red().apply_to("● expired")
    } else {
        Style::new().green().apply_to("● active")
    };

    println!();
    println!("{}", style("Session").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("Key:     "), output.key);
    println!("  {} {}", dim.apply_to("Status:  "), status);
    println!("  {} {}", dim.apply_to("Expires: "), output.expires_at);
    if output.browser_session {
        println!("  {} browser session", dim.apply_to("Cookie:  "));
    }
    if ctx.verbose {
        println!("  {} {} bytes", dim.apply_to("Payload: "), record.data.len());
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&output.data)?);
    println!();

    Ok(())
}
