use chrono::{DateTime, Utc};
use relative_path::RelativePathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const TITLE_KEY: &str = "document-title";
pub const BODY_KEY: &str = "document-body";
pub const UPDATED_AT_KEY: &str = "document-updated-at";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local key-value persistence, one string value per key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store. Counts writes so callers can observe debouncing, and can
/// be switched into a failing mode.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
    writes: usize,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store disabled".to_string()));
        }
        self.values.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

/// One file per key under a storage directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(RelativePathBuf::from(format!("{key}.txt")).to_path(&self.root))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path).map(Some).map_err(StoreError::Io)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.key_path(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::Io)?;
        }

        fs::write(&path, value).map_err(StoreError::Io)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.key_path(key)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// The saved document. Overwritten wholesale on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub title: String,
    pub body: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PersistedSnapshot {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            updated_at: Some(Utc::now()),
        }
    }

    pub fn save_to(&self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        store.set(TITLE_KEY, &self.title)?;
        store.set(BODY_KEY, &self.body)?;
        if let Some(updated_at) = self.updated_at {
            store.set(UPDATED_AT_KEY, &updated_at.to_rfc3339())?;
        }
        Ok(())
    }

    /// `None` when nothing has been saved yet. An unreadable timestamp is
    /// ignored rather than failing the load.
    pub fn load_from(store: &dyn KeyValueStore) -> Result<Option<Self>, StoreError> {
        let title = store.get(TITLE_KEY)?;
        let body = store.get(BODY_KEY)?;
        if title.is_none() && body.is_none() {
            return Ok(None);
        }
        let updated_at = store
            .get(UPDATED_AT_KEY)?
            .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    log::warn!("ignoring unreadable save timestamp {raw:?}: {e}");
                    None
                }
            });
        Ok(Some(Self {
            title: title.unwrap_or_default(),
            body: body.unwrap_or_default(),
            updated_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::create_test_store_dir;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_store_round_trips_values() {
        // Given an empty storage directory
        let dir = create_test_store_dir();
        let mut store = FileStore::new(dir.path().join("nested"));

        // When a value is written
        store.set(BODY_KEY, "# Hello").unwrap();

        // Then it reads back and lives in its own file
        assert_eq!(store.get(BODY_KEY).unwrap(), Some("# Hello".to_string()));
        assert!(dir.path().join("nested/document-body.txt").exists());
        assert_eq!(store.get(TITLE_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let dir = create_test_store_dir();
        let mut store = FileStore::new(dir.path());

        let result = store.set("../escape", "x");

        assert!(matches!(result, Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn test_file_store_remove_missing_key_is_ok() {
        let dir = create_test_store_dir();
        let mut store = FileStore::new(dir.path());
        assert!(store.remove(TITLE_KEY).is_ok());
    }

    #[test]
    fn test_snapshot_round_trip_through_store() {
        let mut store = MemoryStore::new();
        let snapshot = PersistedSnapshot::new("Notes", "Some *text*");

        snapshot.save_to(&mut store).unwrap();
        let loaded = PersistedSnapshot::load_from(&store).unwrap().unwrap();

        assert_eq!(loaded.title, "Notes");
        assert_eq!(loaded.body, "Some *text*");
        assert_eq!(
            loaded.updated_at.map(|t| t.timestamp()),
            snapshot.updated_at.map(|t| t.timestamp())
        );
        assert_eq!(store.write_count(), 3);
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let store = MemoryStore::new();
        assert_eq!(PersistedSnapshot::load_from(&store).unwrap(), None);
    }

    #[test]
    fn test_bad_timestamp_is_ignored() {
        let mut store = MemoryStore::new();
        store.set(TITLE_KEY, "t").unwrap();
        store.set(UPDATED_AT_KEY, "yesterday").unwrap();

        let loaded = PersistedSnapshot::load_from(&store).unwrap().unwrap();

        assert_eq!(loaded.updated_at, None);
        assert_eq!(loaded.body, "");
    }

    #[test]
    fn test_unavailable_store_reports_error() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);
        let result = PersistedSnapshot::new("t", "b").save_to(&mut store);
        assert!(result.unwrap_err().to_string().contains("unavailable"));
    }
}
