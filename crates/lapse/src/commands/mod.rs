//! CLI command handlers.

pub mod demo;
pub mod watch;

use lapse_session::SessionConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Resolved session manager configuration.
    pub session: SessionConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}
