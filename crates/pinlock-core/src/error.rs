//! Error types for the session guard

use thiserror::Error;

/// Result type alias for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;

/// Errors surfaced by [`crate::SessionGuard`] and its accessors
#[derive(Debug, Error)]
pub enum GuardError {
    /// PIN shorter than the minimum length
    #[error("PIN must be at least {0} digits")]
    PinTooShort(usize),

    /// Persistence failure, passed through from the store unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The guard was accessed outside a mounted provider
    #[error("session guard must be used within a GuardProvider")]
    OutsideProvider,

    /// Argon2 failed to hash the PIN
    #[error("Failed to hash PIN: {0}")]
    Hashing(String),
}

/// Errors raised by key-value stores
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store contents could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store is not usable in this environment
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Errors raised while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for the expected shape
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
