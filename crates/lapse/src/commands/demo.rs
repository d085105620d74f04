//! Demo command - create, update and read back one session.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use lapse_session::{ManagerStats, SessionData, SessionInfo, SessionManager};
use serde::Serialize;
use tracing::info;

use super::Context;

/// Arguments for the demo command.
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Key to store in the session
    #[arg(long, default_value = "website")]
    pub key: String,

    /// Value to store (parsed as JSON, falls back to a plain string)
    #[arg(long, default_value = "longhoang.de")]
    pub value: String,
}

/// Demo result for JSON output.
#[derive(Debug, Serialize)]
struct DemoOutput<'a> {
    session_id: &'a str,
    data: &'a SessionData,
    session: &'a SessionInfo,
    stats: ManagerStats,
}

/// Run the demo command.
pub async fn run(args: DemoArgs, ctx: &Context) -> Result<()> {
    let manager = SessionManager::new(ctx.session.clone())?;

    let session_id = manager.create_session()?;
    info!(session_id = %session_id, "Created new session");

    let value = serde_json::from_str(&args.value)
        .unwrap_or_else(|_| serde_json::Value::String(args.value.clone()));
    let data = SessionData::from([(args.key.clone(), value)]);
    manager.update_session_data(&session_id, data)?;
    info!(session_id = %session_id, key = %args.key, "Updated session data");

    let data = manager.get_session_data(&session_id)?;
    let session = manager.session_info(&session_id)?;
    let stats = manager.stats();
    manager.shutdown().await;

    if ctx.json_output {
        let output = DemoOutput {
            session_id: &session_id,
            data: &data,
            session: &session,
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();

    println!();
    println!("{}", style("Session").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("ID:"), session_id);
    println!("  {} {}", dim.apply_to("Data:"), serde_json::to_string(&*data)?);

    if ctx.verbose {
        println!("  {} {}", dim.apply_to("Version:"), session.version);
        println!("  {} {}", dim.apply_to("Created:"), session.created_at);
        println!("  {} {}", dim.apply_to("Updated:"), session.updated_at);
        println!(
            "  {} {} ms",
            dim.apply_to("TTL:"),
            manager.ttl().as_millis()
        );
    }

    println!();
    Ok(())
}
