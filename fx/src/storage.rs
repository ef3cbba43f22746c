//! Key-value persistence for cached rates.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Synchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a value. Deleting a missing key succeeds.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Read and deserialize a JSON value.
///
/// Never fails: absence, I/O errors and corrupt JSON all yield `None`.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read from storage");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(source) => {
            let e = StorageError::Serialization {
                key: key.to_string(),
                source,
            };
            warn!(key, error = %e, "Discarding corrupt stored value");
            None
        }
    }
}

/// Serialize and write a JSON value. Best-effort: failures are logged.
pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> bool {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(source) => {
            let e = StorageError::Serialization {
                key: key.to_string(),
                source,
            };
            warn!(key, error = %e, "Failed to serialize value for storage");
            return false;
        }
    };

    match store.set(key, &raw) {
        Ok(()) => true,
        Err(e) => {
            warn!(key, error = %e, "Failed to save to storage");
            false
        }
    }
}

/// Store backed by one JSON file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn io_error(key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(key, e))?;

        // Write beside the target, then rename over it.
        let tmp = self.dir.join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, value) {
            let _ = fs::remove_file(&tmp);
            return Err(Self::io_error(key, e));
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(Self::io_error(key, e));
        }

        debug!(key, path = %path.display(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store whose every operation fails, for exercising the non-fatal paths.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct FailingStore;

#[cfg(any(test, feature = "test-utils"))]
impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Err(StorageError::Io {
            key: key.to_string(),
            source: std::io::Error::new(ErrorKind::PermissionDenied, "read denied"),
        })
    }

    fn set(&self, key: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::Io {
            key: key.to_string(),
            source: std::io::Error::new(ErrorKind::Other, "quota exceeded"),
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        Err(StorageError::Io {
            key: key.to_string(),
            source: std::io::Error::new(ErrorKind::PermissionDenied, "remove denied"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        value: u32,
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("ratekeeper-test-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.remove("k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        let sample = Sample {
            name: "rates".into(),
            value: 7,
        };

        assert!(save_json(&store, "sample", &sample));
        assert_eq!(load_json::<Sample>(&store, "sample"), Some(sample));
    }

    #[test]
    fn test_load_json_tolerates_corruption() {
        let store = MemoryStore::new();
        store.set("sample", "{not json").unwrap();
        assert_eq!(load_json::<Sample>(&store, "sample"), None);

        store.set("sample", r#"{"name": 3}"#).unwrap();
        assert_eq!(load_json::<Sample>(&store, "sample"), None);
    }

    #[test]
    fn test_failing_store_is_absorbed() {
        let store = FailingStore;
        assert_eq!(load_json::<Sample>(&store, "sample"), None);
        assert!(!save_json(
            &store,
            "sample",
            &Sample {
                name: "x".into(),
                value: 1
            }
        ));
    }

    #[test]
    fn test_file_store() {
        let dir = temp_dir();
        let store = FileStore::new(&dir);

        assert_eq!(store.get("currency_rates_cache").unwrap(), None);
        store.set("currency_rates_cache", "{\"a\":1}").unwrap();
        store.set("currency_rates_cache", "{\"a\":2}").unwrap();
        assert_eq!(
            store.get("currency_rates_cache").unwrap().as_deref(),
            Some("{\"a\":2}")
        );

        // No temp files left behind.
        let leftovers = fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        store.remove("currency_rates_cache").unwrap();
        store.remove("currency_rates_cache").unwrap();
        assert_eq!(store.get("currency_rates_cache").unwrap(), None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let store = FileStore::new(temp_dir());
        assert!(matches!(
            store.get("../etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(store.set("", "x"), Err(StorageError::InvalidKey(_))));
    }
}
