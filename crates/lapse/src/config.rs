//! Configuration file loading.
//!
//! Lookup order: explicit `--config` path, then
//! `$LAPSE_CONFIG_DIR/config.toml`, then the platform config directory
//! (`~/.config/lapse/config.toml` on Linux). A missing default file is not
//! an error; defaults apply.

use std::path::{Path, PathBuf};

use lapse_session::SessionConfig;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "lapse";
const USER_CONFIG_FILE: &str = "config.toml";
const CONFIG_DIR_ENV: &str = "LAPSE_CONFIG_DIR";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Root configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapseConfig {
    /// Session manager settings.
    pub session: SessionConfig,
}

impl LapseConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

/// Load from an explicit path, or from the default location if present.
pub fn load(explicit: Option<&Path>) -> Result<LapseConfig, ConfigError> {
    match explicit {
        Some(path) => load_file(path),
        None => match default_path() {
            Some(path) if path.exists() => load_file(&path),
            _ => Ok(LapseConfig::default()),
        },
    }
}

/// Load configuration from a specific file.
pub fn load_file(path: &Path) -> Result<LapseConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    LapseConfig::from_toml(&contents).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })
}

/// Default config file location.
pub fn default_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir).join(USER_CONFIG_FILE));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME).join(USER_CONFIG_FILE))
}
