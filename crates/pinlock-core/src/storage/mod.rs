//! Durable key-value storage for guard settings
//!
//! The guard only needs three string-valued async operations. Production
//! hosts layer a file store over an in-memory fallback with
//! [`LayeredStore`].

mod file;
mod layered;
mod memory;

pub use file::FileStore;
pub use layered::LayeredStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StorageError;

/// Storage key holding the PIN hash
pub const PIN_KEY: &str = "pin";

/// Storage key holding the inactivity timeout in milliseconds
pub const INACTIVITY_TIMEOUT_KEY: &str = "inactivityTimeout";

/// Async string key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key is absent
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key; removing an absent key succeeds
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
