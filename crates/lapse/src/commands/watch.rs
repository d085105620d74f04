//! Watch command - refresh a session, then time its expiry.

use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use lapse_session::{ManagerStats, SessionData, SessionManager};
use serde::Serialize;
use serde_json::json;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use super::Context;

/// Arguments for the watch command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Number of refreshes before the session is left alone
    #[arg(long, default_value_t = 2)]
    pub refreshes: u32,

    /// Milliseconds between refreshes
    #[arg(long, default_value_t = 1000)]
    pub every_ms: u64,

    /// Milliseconds between expiry checks
    #[arg(long, default_value_t = 50)]
    pub poll_ms: u64,
}

/// Watch result for JSON output.
#[derive(Debug, Serialize)]
struct WatchOutput {
    session_id: String,
    refreshes: u32,
    ttl_ms: u128,
    lifetime_ms: u128,
    stats: ManagerStats,
}

/// Run the watch command.
pub async fn run(args: WatchArgs, ctx: &Context) -> Result<()> {
    let manager = SessionManager::new(ctx.session.clone())?;
    // Timestamps are taken before each write, so a timer armed by that
    // write can only fire later than `last_update + ttl`.
    let mut last_update = Instant::now();
    let session_id = manager.create_session()?;
    info!(session_id = %session_id, ttl = ?manager.ttl(), "Watching session");

    for refresh in 0..args.refreshes {
        sleep(Duration::from_millis(args.every_ms)).await;
        let data = SessionData::from([("refresh".to_string(), json!(refresh))]);
        let refreshed_at = Instant::now();
        if manager.update_session_data(&session_id, data).is_err() {
            manager.shutdown().await;
            bail!(
                "session expired before refresh {} ({} ms between refreshes, ttl {} ms)",
                refresh + 1,
                args.every_ms,
                manager.ttl().as_millis()
            );
        }
        last_update = refreshed_at;
        debug!(session_id = %session_id, refresh = refresh + 1, "Session refreshed");
    }

    let poll = Duration::from_millis(args.poll_ms.max(1));
    while manager.get_session_data(&session_id).is_ok() {
        sleep(poll).await;
    }
    let lifetime = last_update.elapsed();
    info!(session_id = %session_id, ?lifetime, "Session expired");

    let stats = manager.stats();
    manager.shutdown().await;

    let output = WatchOutput {
        session_id,
        refreshes: args.refreshes,
        ttl_ms: manager.ttl().as_millis(),
        lifetime_ms: lifetime.as_millis(),
        stats,
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();

    println!();
    println!("{}", style("Session Expiry").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("ID:"), output.session_id);
    println!("  {} {}", dim.apply_to("Refreshes:"), output.refreshes);
    println!("  {} {} ms", dim.apply_to("TTL:"), output.ttl_ms);
    println!(
        "  {} {} ms after last update",
        dim.apply_to("Expired:"),
        output.lifetime_ms
    );
    if ctx.verbose {
        println!(
            "  {} {} expired, {} stale events",
            dim.apply_to("Reaper:"),
            output.stats.expired,
            output.stats.stale_events
        );
    }
    println!();

    Ok(())
}
