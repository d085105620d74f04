//! Configuration for the session manager.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default session lifetime after the last update.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// Configuration for the session manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a session lives after its last update.
    #[serde(rename = "ttl_ms", with = "duration_ms")]
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Check the configuration before a manager is built from it.
    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.ttl.is_zero() {
            return Err(crate::Error::InvalidConfig(
                "ttl must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
