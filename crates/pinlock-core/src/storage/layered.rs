use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::warn;

use super::KeyValueStore;
use crate::error::StorageError;

/// Store that tries an ordered list of tiers until one succeeds
///
/// Writes go to the first tier that accepts them, and that tier then owns
/// the key: later reads of the key start there, so a value that fell
/// through to a fallback tier is never shadowed by a stale copy in a tier
/// above it. Reads of keys never written through this store start at the
/// first tier. A tier that answers (even with "absent") ends the search.
/// When every tier fails, the last tier's error is returned.
pub struct LayeredStore {
    tiers: Vec<(String, Arc<dyn KeyValueStore>)>,
    /// Index of the tier that last accepted a write or removal, per key
    owners: Mutex<HashMap<String, usize>>,
}

impl LayeredStore {
    /// Create a store with no tiers
    pub fn new() -> Self {
        Self {
            tiers: Vec::new(),
            owners: Mutex::new(HashMap::new()),
        }
    }

    /// Append a tier, tried after every tier added before it
    pub fn with_tier(mut self, name: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        self.tiers.push((name.into(), store));
        self
    }

    /// Names of the configured tiers, in order
    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Name of the tier holding the latest write of `key`, if any
    pub fn owning_tier(&self, key: &str) -> Option<&str> {
        let index = self.owner(key)?;
        self.tiers.get(index).map(|(name, _)| name.as_str())
    }

    /// Whether any write has landed below the first tier
    pub fn is_degraded(&self) -> bool {
        self.owners().values().any(|index| *index > 0)
    }

    fn owners(&self) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
        self.owners.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn owner(&self, key: &str) -> Option<usize> {
        self.owners().get(key).copied()
    }

    fn claim(&self, key: &str, index: usize) {
        if index > 0 {
            warn!("Storage for {} fell back to tier {}", key, self.tiers[index].0);
        }
        self.owners().insert(key.to_string(), index);
    }

    fn no_tiers() -> StorageError {
        StorageError::Unavailable("no storage tiers configured".to_string())
    }
}

impl Default for LayeredStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for LayeredStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        // Tiers above the owner may hold a stale value
        let start = self.owner(key).unwrap_or(0);

        let mut last_error = None;
        for (name, store) in self.tiers.iter().skip(start) {
            match store.get_item(key).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Storage tier {} failed to read {}: {}", name, key, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(Self::no_tiers))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut last_error = None;
        for (index, (name, store)) in self.tiers.iter().enumerate() {
            match store.set_item(key, value).await {
                Ok(()) => {
                    self.claim(key, index);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Storage tier {} failed to write {}: {}", name, key, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(Self::no_tiers))
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut last_error = None;
        for (index, (name, store)) in self.tiers.iter().enumerate() {
            match store.remove_item(key).await {
                Ok(()) => {
                    self.claim(key, index);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Storage tier {} failed to remove {}: {}", name, key, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(Self::no_tiers))
    }
}
