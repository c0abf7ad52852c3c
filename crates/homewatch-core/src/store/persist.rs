// ── Preference persistence ──
//
// Stores load their state once at construction and save after every
// mutation through this seam. Values are JSON documents addressed by key.

use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde_json::Value;

use crate::error::CoreError;

/// Key-value persistence capability injected into the client stores.
pub trait Persistence: Send + Sync {
    /// Load the document stored under `key`, `None` if never saved.
    fn load(&self, key: &str) -> Result<Option<Value>, CoreError>;

    fn save(&self, key: &str, value: &Value) -> Result<(), CoreError>;
}

/// One `<key>.json` file per key inside a state directory.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
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

fn persistence_error(key: &str, err: impl std::fmt::Display) -> CoreError {
    CoreError::Persistence {
        key: key.to_owned(),
        message: err.to_string(),
    }
}

impl Persistence for JsonFilePersistence {
    fn load(&self, key: &str) -> Result<Option<Value>, CoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|e| persistence_error(key, e))?;
        let value = serde_json::from_str(&contents).map_err(|e| persistence_error(key, e))?;
        Ok(Some(value))
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), CoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| persistence_error(key, e))?;

        let contents = serde_json::to_string_pretty(value).map_err(|e| persistence_error(key, e))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|e| persistence_error(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| persistence_error(key, e))?;

        tracing::debug!(key, path = %path.display(), "preferences saved");
        Ok(())
    }
}

/// In-process persistence for tests and `--ephemeral` sessions.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: DashMap<String, Value>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self, key: &str) -> Result<Option<Value>, CoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), CoreError> {
        self.entries.insert(key.to_owned(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_round_trip_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFilePersistence::new(tmp.path().join("state"));

        assert!(store.load("surveillance-storage").unwrap().is_none());
        store
            .save("surveillance-storage", &json!({ "mode": "surveillance" }))
            .unwrap();

        let loaded = store.load("surveillance-storage").unwrap().unwrap();
        assert_eq!(loaded["mode"], "surveillance");
        assert!(tmp.path().join("state/surveillance-storage.json").exists());
    }

    #[test]
    fn corrupt_file_is_a_persistence_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("surveillance-settings.json"), "{not json").unwrap();

        let err = JsonFilePersistence::new(tmp.path())
            .load("surveillance-settings")
            .unwrap_err();
        assert!(matches!(err, CoreError::Persistence { ref key, .. } if key == "surveillance-settings"));
    }
}
