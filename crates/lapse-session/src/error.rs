//! Error types for session manager operations.

use crate::id::GeneratorError;

/// Error type for session manager operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No active session exists for the identifier (never created or already expired).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The identifier generator failed to produce a fresh identifier.
    #[error("Failed to generate session id: {0}")]
    IdGeneration(#[from] GeneratorError),

    /// A record with this identifier is already stored.
    #[error("Session id already in use: {0}")]
    DuplicateId(String),

    /// The manager has been shut down and no longer accepts writes.
    #[error("Session manager is shut down")]
    ShutDown,

    /// The manager was built outside a tokio runtime.
    #[error("Session manager must be created inside a tokio runtime")]
    NoRuntime,

    /// The supplied configuration cannot be used.
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for session manager operations.
pub type Result<T> = std::result::Result<T, Error>;
