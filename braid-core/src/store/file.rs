//! File-backed Storage implementation
//!
//! All keys live in one JSON file. Every write serializes the whole map and
//! replaces the file via a temp-file rename, so a reader never observes a
//! half-written store.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use super::traits::Storage;

#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open the store at `path`, loading existing entries. A missing or
    /// unreadable file yields an empty store (fails open).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Open the store at the default platform location
    pub fn open_default() -> Result<Self> {
        let path = config::PathManager::store_path()
            .context("could not determine data directory")?;
        Ok(Self::open(path))
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let storage = FileStorage::open(&path);
            storage.set("conversations", "[]").unwrap();
            storage.set("theme", "dark").unwrap();
        }

        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get("conversations"), Some("[]".to_string()));
        assert_eq!(reopened.get("theme"), Some("dark".to_string()));
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("absent.json"));
        assert_eq!(storage.get("anything"), None);
    }

    #[test]
    fn test_corrupt_file_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::open(&path);
        assert_eq!(storage.get("conversations"), None);
        // And it recovers on the next write
        storage.set("theme", "light").unwrap();
        assert_eq!(
            FileStorage::open(&path).get("theme"),
            Some("light".to_string())
        );
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let storage = FileStorage::open(&path);
        storage.set("k", "v").unwrap();
        storage.remove("k").unwrap();
        assert_eq!(FileStorage::open(&path).get("k"), None);
    }
}
