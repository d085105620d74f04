//! Lapse - command-line driver for the lapse session manager.
//!
//! Main entry point for the Lapse CLI.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

use commands::{demo, watch};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Lapse - in-memory sessions that expire after inactivity
#[derive(Parser)]
#[command(name = "lapse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to a TOML config file
    #[arg(long, global = true, env = "LAPSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Session TTL in milliseconds (overrides the config file)
    #[arg(long, global = true, env = "LAPSE_TTL_MS")]
    pub ttl_ms: Option<u64>,

    /// Also write JSON logs to daily files in this directory
    #[arg(long, global = true, env = "LAPSE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a session, store a value and read it back
    Demo(demo::DemoArgs),

    /// Refresh a session, then measure how long it survives
    Watch(watch::WatchArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "lapse=debug,lapse_session=debug,info"
    } else {
        "lapse=info,lapse_session=info,warn"
    };

    use tracing_subscriber::prelude::*;
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::EnvFilter::new(filter));

    let (file_layer, _guard) = match &cli.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "lapse.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "lapse=trace,lapse_session=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();

    let mut session = config::load(cli.config.as_deref())?.session;
    if let Some(ttl_ms) = cli.ttl_ms {
        session = session.with_ttl(Duration::from_millis(ttl_ms));
    }

    let ctx = commands::Context {
        session,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Demo(args) => demo::run(args, &ctx).await,
        Commands::Watch(args) => watch::run(args, &ctx).await,
    }
}
