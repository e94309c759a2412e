//! CLI configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pinlock_core::GuardConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "PINLOCK_CONFIG";

/// Host configuration for the `pinlock` binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// JSON file holding the guard's persisted keys
    pub store_path: PathBuf,

    /// Guard settings
    pub guard: GuardConfig,

    /// Apply a cool-down after repeated wrong PINs in `pinlock session`
    pub unlock_backoff: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_path: Self::default_store_path(),
            guard: GuardConfig::default(),
            unlock_backoff: false,
        }
    }
}

impl CliConfig {
    /// Default store location under the user's data directory
    pub fn default_store_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pinlock")
            .join("store.json")
    }

    /// Config file location: `$PINLOCK_CONFIG` or the user's config directory
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("pinlock")
                    .join("config.json")
            })
    }

    /// Load the config, writing defaults first if the file does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            return serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config {:?}", path));
        }

        let config = Self::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(&config)?;
        std::fs::write(path, content).context("Failed to write default config")?;
        info!("Created default config at {:?}", path);
        Ok(config)
    }
}
