//! Durable storage backends for persisted dashboard entries
//!
//! Persistence is an optimization, never a source of truth: cached content is
//! always re-derivable from the origin, so backends report failures as plain
//! errors and the cache layer logs and swallows them. Writes are
//! last-write-wins with no transactional guarantee, which is acceptable for
//! that same reason.

use crate::error::Result;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Key/value storage for serialized cache entries.
///
/// Keys are the namespaced storage keys (`dashboard_cache_<key>`); values are
/// JSON-serialized entries.
pub trait CacheStorage: Send {
    /// Read the value stored under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, overwriting any previous value.
    fn write(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove the value under `key`. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Enumerate every stored key.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Configuration for file-backed storage.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base directory for storage files.
    pub base_dir: PathBuf,
}

/// JSON file-based storage, one file per key.
#[derive(Debug)]
pub struct JsonFileStorage {
    config: StorageConfig,
}

impl JsonFileStorage {
    /// Create a new JSON file storage.
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Storage rooted at `base_dir`.
    pub fn in_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(StorageConfig {
            base_dir: base_dir.into(),
        })
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.config.base_dir.join(format!("{key}.json"))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.config.base_dir.exists() {
            fs::create_dir_all(&self.config.base_dir)?;
        }
        Ok(())
    }
}

impl CacheStorage for JsonFileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.file_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_dir()?;
        fs::write(self.file_path(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.file_path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        if !self.config.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.config.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        Ok(keys)
    }
}

/// In-memory storage for tests and hosts without a filesystem.
///
/// Clones share the same underlying map, which also models several cache
/// instances backed by one storage namespace.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.values.lock().expect("storage lock poisoned").len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .expect("storage lock poisoned")
            .get(key)
            .cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .expect("storage lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values
            .lock()
            .expect("storage lock poisoned")
            .remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .values
            .lock()
            .expect("storage lock poisoned")
            .keys()
            .cloned()
            .collect())
    }
}
