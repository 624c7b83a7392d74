//! Key/value persistence for client-side state.
//!
//! Values are JSON text stored under namespaced keys. The on-disk store keeps
//! every key in one JSON object and rewrites it atomically on each change.

use crate::core::config::io::{project_dirs, write_atomically};
use crate::core::config::path_display;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

pub const KEY_BACKEND_URL: &str = "llmdesk.backendUrl";
pub const KEY_PLATFORM_SETTINGS: &str = "llmdesk.platformSettings";
pub const KEY_CONVERSATIONS: &str = "llmdesk.conversations";

#[derive(Debug)]
pub enum StorageError {
    NoDataDir,
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Encode(serde_json::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NoDataDir => write!(f, "Failed to determine data directory"),
            StorageError::Read { path, source } => {
                write!(f, "Failed to read state at {}: {}", path_display(path), source)
            }
            StorageError::Corrupt { path, source } => {
                write!(f, "State file {} is not valid JSON: {}", path_display(path), source)
            }
            StorageError::Write { path, source } => {
                write!(f, "Failed to write state at {}: {}", path_display(path), source)
            }
            StorageError::Encode(source) => write!(f, "Failed to encode state: {source}"),
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StorageError::NoDataDir => None,
            StorageError::Read { source, .. } | StorageError::Write { source, .. } => Some(source),
            StorageError::Corrupt { source, .. } | StorageError::Encode(source) => Some(source),
        }
    }
}

/// String-keyed persistence. Implementations must be safe to share.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Reads and decodes the JSON value under `key`.
///
/// A value that no longer decodes is logged and treated as absent.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(key, error = %err, "Ignoring unreadable stored value");
            Ok(None)
        }
    }
}

pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(StorageError::Encode)?;
    store.set(key, &raw)
}

/// JSON object on disk, one entry per key.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<data dir>/state.json` for the current user.
    pub fn default_path() -> Result<PathBuf, StorageError> {
        project_dirs()
            .map(|dirs| dirs.data_dir().join("state.json"))
            .ok_or(StorageError::NoDataDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| StorageError::Read {
            path: self.path.clone(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let contents = serde_json::to_string_pretty(entries).map_err(StorageError::Encode)?;
        write_atomically(&self.path, contents.as_bytes()).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn update<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        if mutate(&mut entries) {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| entries.remove(key).is_some())
    }
}

/// In-memory store for tests and for runs that must not touch disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trips_and_removes() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("data").join("state.json");
        let store = FileStore::new(&path);

        assert_eq!(store.get(KEY_BACKEND_URL).unwrap(), None);
        store.set(KEY_BACKEND_URL, "http://localhost:8000").unwrap();
        store.set(KEY_CONVERSATIONS, "[]").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get(KEY_BACKEND_URL).unwrap().as_deref(),
            Some("http://localhost:8000")
        );

        reopened.remove(KEY_BACKEND_URL).unwrap();
        assert_eq!(store.get(KEY_BACKEND_URL).unwrap(), None);
        assert_eq!(store.get(KEY_CONVERSATIONS).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn corrupt_state_file_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileStore::new(&path).get(KEY_BACKEND_URL).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn json_helpers_skip_unreadable_values() {
        let store = MemoryStore::new();
        save_json(&store, KEY_PLATFORM_SETTINGS, &json!({"theme": "dark"})).unwrap();
        let value: Option<serde_json::Value> = load_json(&store, KEY_PLATFORM_SETTINGS).unwrap();
        assert_eq!(value, Some(json!({"theme": "dark"})));

        store.set(KEY_CONVERSATIONS, "not json").unwrap();
        let broken: Option<Vec<String>> = load_json(&store, KEY_CONVERSATIONS).unwrap();
        assert_eq!(broken, None);
    }
}
