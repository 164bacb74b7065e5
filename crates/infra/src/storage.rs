//! Key/value storage tiers.
//!
//! `InMemoryStorage` stands in for session-scoped storage (gone when the
//! process exits); `JsonFileStorage` is a durable tier backed by one JSON
//! object on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use anyhow::Context;

use rolegate_auth::{KeyValueStorage, StorageError};

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    inner: RwLock<BTreeMap<String, String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStorage for InMemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.inner.read().map_err(|_| StorageError::Unavailable("lock poisoned".into()))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.inner.write().map_err(|_| StorageError::Unavailable("lock poisoned".into()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.inner.write().map_err(|_| StorageError::Unavailable("lock poisoned".into()))?;
        map.remove(key);
        Ok(())
    }
}

/// Durable storage persisted as a single JSON object of string values.
///
/// Every write rewrites the whole file; the data set is a handful of keys.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    /// Open (or lazily create) storage at `path`.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create storage directory at {:?}", parent))?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read storage file at {:?}", self.path))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).with_context(|| format!("storage file at {:?} is not a JSON string map", self.path))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let payload = serde_json::to_string_pretty(entries).context("failed to encode storage entries")?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, payload).with_context(|| format!("failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path).with_context(|| format!("failed to replace {:?}", self.path))?;
        Ok(())
    }

    fn update<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Unavailable("lock poisoned".into()))?;
        let result = self.read_all().and_then(|mut entries| {
            mutate(&mut entries);
            self.write_all(&entries)
        });
        result.map_err(io_error)
    }
}

fn io_error(err: anyhow::Error) -> StorageError {
    StorageError::Io(format!("{err:#}"))
}

impl KeyValueStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.read_all().map_err(io_error)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_round_trip() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.get("k").unwrap(), None);

        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));

        storage.remove("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let storage = JsonFileStorage::open(&path).unwrap();
        storage.set("a", r#"{"enabled":true}"#).unwrap();
        storage.set("b", "2").unwrap();
        storage.remove("b").unwrap();
        drop(storage);

        let reopened = JsonFileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some(r#"{"enabled":true}"#));
        assert_eq!(reopened.get("b").unwrap(), None);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path().join("absent.json")).unwrap();
        assert_eq!(storage.get("anything").unwrap(), None);
        storage.remove("anything").unwrap();
    }

    #[test]
    fn corrupt_file_surfaces_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = JsonFileStorage::open(&path).unwrap();
        assert!(matches!(storage.get("a"), Err(StorageError::Io(_))));
        assert!(matches!(storage.set("a", "b"), Err(StorageError::Io(_))));
    }
}
