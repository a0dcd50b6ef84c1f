//! Persistent cache store
//!
//! A key-value contract modelled on browser local storage: one string per
//! key. The merge cache lives under a single key as one JSON document.

use crate::error::StoreError;
use crate::types::MergeCache;
use dashmap::DashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key-value persistence
pub trait CacheStore: Send + Sync {
    /// Read the value stored under `key`
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be read
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: DashMap<String, String>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io_error(&dir, e))?;
        Ok(Self { dir })
    }

    /// Directory holding the files
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl CacheStore for JsonFileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io_error(path, e)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| StoreError::io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io_error(&path, e))
    }
}

/// Load the cache document stored under `key`
///
/// Missing documents yield an empty cache. Unreadable or malformed documents
/// are logged and also yield an empty cache.
pub fn load_cache(store: &dyn CacheStore, key: &str) -> MergeCache {
    let raw = match store.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "no persisted merge cache");
            return MergeCache::default();
        }
        Err(e) => {
            warn!(key, error = %e, "failed to read merge cache");
            return MergeCache::default();
        }
    };

    match parse_cache(&raw) {
        Ok(cache) => cache,
        Err(e) => {
            warn!(key, error = %e, "discarding corrupt merge cache");
            MergeCache::default()
        }
    }
}

/// Parse a cache document
///
/// # Errors
/// Returns `StoreError::Corrupt` if the JSON is malformed
pub fn parse_cache(raw: &str) -> Result<MergeCache, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Persist the cache document under `key`
///
/// # Errors
/// Returns an error if serialization or the write fails
pub fn save_cache(store: &dyn CacheStore, key: &str, cache: &MergeCache) -> Result<(), StoreError> {
    let raw = serde_json::to_string(cache)?;
    store.set_item(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LocalpartRecord;

    fn sample_cache() -> MergeCache {
        let mut cache = MergeCache::default();
        cache.localparts.insert(
            "bob".into(),
            LocalpartRecord::new("@bob:a.org", "@bob:b.org"),
        );
        cache
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get_item("k").unwrap().is_none());

        save_cache(&store, "k", &sample_cache()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(load_cache(&store, "k"), sample_cache());
    }

    #[test]
    fn corrupt_document_loads_empty() {
        let store = MemoryStore::new();
        store.set_item("k", "{not json").unwrap();
        assert_eq!(load_cache(&store, "k"), MergeCache::default());
    }

    #[test]
    fn missing_document_loads_empty() {
        let store = MemoryStore::new();
        assert_eq!(load_cache(&store, "absent"), MergeCache::default());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let store = JsonFileStore::open(dir.path()).unwrap();
        save_cache(&store, "merged_users_cache", &sample_cache()).unwrap();

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(load_cache(&reopened, "merged_users_cache"), sample_cache());
        assert!(dir.path().join("merged_users_cache.json").exists());
    }

    #[test]
    fn file_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        store.set_item("../escape", "x").unwrap();
        assert_eq!(store.get_item("../escape").unwrap().as_deref(), Some("x"));
        assert!(dir.path().join("___escape.json").exists());
    }
}
