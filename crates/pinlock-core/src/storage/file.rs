use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::debug;

use super::KeyValueStore;
use crate::error::StorageError;

/// Store backed by a single JSON object file
///
/// Every write rewrites the file atomically through a uniquely named temp
/// file in the same directory and, on Unix, restricts it to the owner.
/// Read-modify-write cycles hold an exclusive lock on a sidecar
/// `<name>.lock` file, so concurrent processes sharing the store do not
/// lose each other's updates.
#[derive(Debug)]
pub struct FileStore {
    /// Path to the JSON file
    path: PathBuf,
}

impl FileStore {
    /// Create a store at `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sidecar lock file
    pub fn lock_path(&self) -> PathBuf {
        lock_path(&self.path)
    }

    /// Apply `change` to the entries under the file lock; `change` returns
    /// whether anything needs writing
    async fn update<F>(&self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || update_file(&path, change))
            .await
            .map_err(|e| StorageError::Unavailable(format!("storage task failed: {}", e)))?
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn parse_entries(content: &str) -> Result<BTreeMap<String, String>, StorageError> {
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(content)?)
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_entries(&content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn update_file<F>(path: &Path, change: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut BTreeMap<String, String>) -> bool,
{
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)?;

    // Released when `lock` is dropped
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(path))?;
    lock.lock_exclusive()?;

    let mut entries = read_entries(path)?;
    if !change(&mut entries) {
        return Ok(());
    }
    write_entries(path, dir, &entries)
}

fn write_entries(
    path: &Path,
    dir: &Path,
    entries: &BTreeMap<String, String>,
) -> Result<(), StorageError> {
    let contents = serde_json::to_string_pretty(entries)?;

    // Write to a temp file in the same directory, then rename over the store
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;

    // Set restrictive permissions (Unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;

    debug!("Wrote {} keys to {:?}", entries.len(), path);
    Ok(())
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut entries = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => parse_entries(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(entries.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.update(move |entries| {
            entries.insert(key, value);
            true
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.update(move |entries| entries.remove(&key).is_some()).await
    }
}
