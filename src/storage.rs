use anyhow::{Context, Result, anyhow};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fs,
    path::{Path, PathBuf},
};
#[cfg(test)]
use std::{collections::HashMap, sync::Mutex};
use tracing::{debug, warn};

use crate::error::ShelfError;

pub const FAVORITES_KEY: &str = "favorites";
pub const BOOKMARKS_KEY: &str = "bookmarks";

/// Synchronous key-value persistence. Writes replace the whole value.
pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, text: &str) -> Result<()>;
}

/// One JSON file per key inside a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {key} file {}", path.display()))?;
        Ok(Some(data))
    }

    fn write(&self, key: &str, text: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create data directory {}", self.dir.display())
        })?;
        let path = self.path_for(key);
        fs::write(&path, text)
            .with_context(|| format!("failed to write {key} file {}", path.display()))?;
        Ok(())
    }
}

/// In-process backend for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
    fail_writes: bool,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose writes always fail, reads still work.
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn with_value(key: &str, text: &str) -> Self {
        let storage = Self::default();
        if let Ok(mut values) = storage.values.lock() {
            values.insert(key.to_string(), text.to_string());
        }
        storage
    }
}

#[cfg(test)]
impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, text: &str) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow!("memory storage is read-only"));
        }
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        values.insert(key.to_string(), text.to_string());
        Ok(())
    }
}

/// Result of reading a snapshot at startup.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    /// A snapshot was found and parsed.
    Loaded(T),
    /// Nothing stored yet.
    Empty,
    /// The snapshot could not be read or parsed; callers start empty.
    Defaulted(ShelfError),
}

impl<T: Default> LoadOutcome<T> {
    pub fn into_value(self) -> T {
        match self {
            LoadOutcome::Loaded(value) => value,
            LoadOutcome::Empty | LoadOutcome::Defaulted(_) => T::default(),
        }
    }
}

pub fn load_snapshot<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &'static str,
) -> LoadOutcome<T> {
    let text = match storage.read(key) {
        Ok(Some(text)) => text,
        Ok(None) => return LoadOutcome::Empty,
        Err(source) => return LoadOutcome::Defaulted(ShelfError::Storage { key, source }),
    };
    if text.trim().is_empty() {
        return LoadOutcome::Empty;
    }
    match serde_json::from_str(&text) {
        Ok(value) => LoadOutcome::Loaded(value),
        Err(err) => LoadOutcome::Defaulted(ShelfError::Storage {
            key,
            source: anyhow!(err).context(format!("failed to parse stored {key}")),
        }),
    }
}

/// Loads a snapshot, logging and discarding any failure.
pub fn load_or_default<T: DeserializeOwned + Default>(
    storage: &dyn Storage,
    key: &'static str,
) -> T {
    let outcome = load_snapshot(storage, key);
    match &outcome {
        LoadOutcome::Loaded(_) => debug!(key, "loaded stored snapshot"),
        LoadOutcome::Empty => debug!(key, "no stored snapshot, starting empty"),
        LoadOutcome::Defaulted(err) => {
            warn!(key, error = ?err, "stored snapshot unusable, starting empty")
        }
    }
    outcome.into_value()
}

/// Writes a full snapshot. A failure is logged and the in-memory copy stays authoritative.
pub fn persist_snapshot<T: Serialize>(storage: &dyn Storage, key: &'static str, value: &T) {
    let result = serde_json::to_string_pretty(value)
        .context("failed to serialize snapshot")
        .and_then(|text| storage.write(key, &text));
    if let Err(err) = result {
        warn!(key, error = ?err, "failed to persist snapshot, keeping changes in memory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_reads_back_what_it_wrote() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("nested"));
        assert!(storage.read(FAVORITES_KEY).expect("read").is_none());

        storage.write(FAVORITES_KEY, "[\"a\"]").expect("write");
        assert_eq!(
            storage.read(FAVORITES_KEY).expect("read").as_deref(),
            Some("[\"a\"]")
        );
        assert!(dir.path().join("nested").join("favorites.json").exists());
    }

    #[test]
    fn missing_snapshot_is_empty() {
        let storage = MemoryStorage::new();
        let outcome: LoadOutcome<Vec<String>> = load_snapshot(&storage, FAVORITES_KEY);
        assert!(matches!(outcome, LoadOutcome::Empty));
    }

    #[test]
    fn corrupt_snapshot_defaults_instead_of_failing() {
        let storage = MemoryStorage::with_value(FAVORITES_KEY, "{not json");
        let outcome: LoadOutcome<Vec<String>> = load_snapshot(&storage, FAVORITES_KEY);
        assert!(matches!(
            outcome,
            LoadOutcome::Defaulted(ShelfError::Storage { key: "favorites", .. })
        ));
        let value: Vec<String> = load_or_default(&storage, FAVORITES_KEY);
        assert!(value.is_empty());
    }

    #[test]
    fn wrong_shape_snapshot_defaults() {
        let storage = MemoryStorage::with_value(FAVORITES_KEY, "{\"a\": 1}");
        let value: Vec<String> = load_or_default(&storage, FAVORITES_KEY);
        assert!(value.is_empty());
    }

    #[test]
    fn persist_failure_is_swallowed() {
        let storage = MemoryStorage::failing_writes();
        persist_snapshot(&storage, FAVORITES_KEY, &vec!["a".to_string()]);
        assert!(storage.read(FAVORITES_KEY).expect("read").is_none());
    }
}
