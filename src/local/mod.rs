// Local persistent key-value store: synchronous JSON get/set under string
// keys, last-write-wins, no transactions. Backs workflow rules, email
// templates, and the portfolio collections.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("local store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("local store holds malformed JSON under {key:?}: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid local store key {0:?}")]
    InvalidKey(String),
}

pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, LocalStoreError>;

    fn set(&self, key: &str, value: &Value) -> Result<(), LocalStoreError>;

    fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
}

/// Typed read: deserialize whatever is stored under `key`.
pub fn load<T: DeserializeOwned>(
    store: &dyn LocalStore,
    key: &str,
) -> Result<Option<T>, LocalStoreError> {
    match store.get(key)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| LocalStoreError::Malformed {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Typed write.
pub fn save<T: Serialize>(
    store: &dyn LocalStore,
    key: &str,
    value: &T,
) -> Result<(), LocalStoreError> {
    let value = serde_json::to_value(value).map_err(|source| LocalStoreError::Malformed {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &value)
}

/// File-backed store: one JSON document per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, LocalStoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(LocalStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn io_err(path: &Path, source: std::io::Error) -> LocalStoreError {
        LocalStoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, LocalStoreError> {
        let path = self.path_for(key)?;
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_err(&path, e)),
        };
        serde_json::from_str(&text).map_err(|source| LocalStoreError::Malformed {
            key: key.to_string(),
            source,
        })
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), LocalStoreError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_err(&self.dir, e))?;
        let text = serde_json::to_string_pretty(value).map_err(|source| {
            LocalStoreError::Malformed {
                key: key.to_string(),
                source,
            }
        })?;
        std::fs::write(&path, text).map_err(|e| Self::io_err(&path, e))
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_returns_none_for_absent_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("kpis", &json!([{"name": "ARR", "value": 1.5}])).unwrap();
        let value = store.get("kpis").unwrap().unwrap();
        assert_eq!(value[0]["name"], "ARR");
    }

    #[test]
    fn last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("highlights", &json!(["first"])).unwrap();
        store.set("highlights", &json!(["second"])).unwrap();
        assert_eq!(store.get("highlights").unwrap().unwrap(), json!(["second"]));
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("reports", &json!([])).unwrap();
        store.remove("reports").unwrap();
        store.remove("reports").unwrap();
        assert!(store.get("reports").unwrap().is_none());
    }

    #[test]
    fn path_traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.get("../etc/passwd").is_err());
        assert!(store.set("", &json!(null)).is_err());
    }
}
