//! Session identifier generation.
//!
//! The manager never invents identifiers itself; it asks an [`IdGenerator`]
//! for a fresh one on every `create_session` call. Generators must be
//! collision-free for the lifetime of the process.

use uuid::Uuid;

/// Failure reported by an identifier generator.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct GeneratorError {
    message: String,
}

impl GeneratorError {
    /// Create a generator error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Source of unique session identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a new identifier that has never been handed out before.
    fn generate(&self) -> Result<String, GeneratorError>;
}

/// Random v4 UUIDs in simple (hyphenless) form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Result<String, GeneratorError> {
        Ok(Uuid::new_v4().simple().to_string())
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> Result<String, GeneratorError> + Send + Sync,
{
    fn generate(&self) -> Result<String, GeneratorError> {
        self()
    }
}
