//! Key/value persistence backed by one file per key.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::StoreError;

/// A directory of small files addressed by key, the on-disk counterpart of
/// browser local storage.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.item_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    /// Replace the value of `key`. Writes go through a temp file and a
    /// rename so a crash never leaves a half-written value behind.
    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.item_path(key);
        let tmp = self.dir.join(format!(".{}.tmp", key));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        debug!(key, bytes = value.len(), "Stored item");
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let path = self.item_path(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
