//! Guard configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::{DEFAULT_INACTIVITY_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, LOCK_SCREEN_ROUTE};

/// Session guard configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Inactivity timeout used when nothing valid is persisted (milliseconds)
    pub default_inactivity_timeout_ms: u64,

    /// Cadence of the inactivity poll (milliseconds)
    pub poll_interval_ms: u64,

    /// Route passed to the navigator when the guard locks
    pub lock_route: String,

    /// Argon2id cost parameters for PIN hashing
    pub hashing: HashingConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            default_inactivity_timeout_ms: DEFAULT_INACTIVITY_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            lock_route: LOCK_SCREEN_ROUTE.to_string(),
            hashing: HashingConfig::default(),
        }
    }
}

impl GuardConfig {
    /// Create a config for testing (cheap hashing, default timings)
    pub fn testing() -> Self {
        Self {
            hashing: HashingConfig::testing(),
            ..Self::default()
        }
    }

    /// Poll cadence as a duration, never shorter than one millisecond
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Default inactivity timeout, never zero
    pub fn default_inactivity_timeout(&self) -> u64 {
        if self.default_inactivity_timeout_ms == 0 {
            DEFAULT_INACTIVITY_TIMEOUT_MS
        } else {
            self.default_inactivity_timeout_ms
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl HashingConfig {
    /// Minimal parameters, only suitable for tests
    pub fn testing() -> Self {
        Self {
            memory_kib: argon2::Params::MIN_M_COST,
            iterations: argon2::Params::MIN_T_COST,
            parallelism: argon2::Params::MIN_P_COST,
        }
    }
}
