//! Key/value backends for save data
//!
//! Mirrors the browser's localStorage contract: string keys, string values,
//! and a well-known key that names the active save slot.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Key under which the active slot's key is stored
pub const CURRENT_SLOT_KEY: &str = "mineclicker_current_slot";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Minimal string key/value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory store, used by tests and embedders that persist elsewhere
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with an active slot holding the given raw save document
    pub fn with_slot(slot_key: &str, raw_save: &str) -> Self {
        let store = Self::new();
        {
            let mut entries = store.entries.lock();
            entries.insert(CURRENT_SLOT_KEY.to_string(), slot_key.to_string());
            entries.insert(slot_key.to_string(), raw_save.to_string());
        }
        store
    }

    /// Reject all writes (simulates a full or blocked storage quota)
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Relaxed);
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("store is read-only".to_string()));
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed store: one file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write beside the target and rename so readers never see a torn file
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mineclicker-store-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("a").unwrap().is_none());
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_memory_store_with_slot() {
        let store = MemoryStore::with_slot("slot1", "{}");
        assert_eq!(store.get(CURRENT_SLOT_KEY).unwrap().as_deref(), Some("slot1"));
        assert_eq!(store.get("slot1").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_memory_store_read_only() {
        let store = MemoryStore::new();
        store.set_read_only(true);
        assert!(store.set("a", "1").is_err());
        assert!(store.get("a").unwrap().is_none());
        store.set_read_only(false);
        assert!(store.set("a", "1").is_ok());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = temp_dir("roundtrip");
        let store = FileStore::new(&dir);
        assert!(store.get("slot/1").unwrap().is_none());
        store.set("slot/1", "{\"stage\":3}").unwrap();
        assert_eq!(store.get("slot/1").unwrap().as_deref(), Some("{\"stage\":3}"));
        assert!(dir.join("slot_1.json").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_overwrite() {
        let dir = temp_dir("overwrite");
        let store = FileStore::new(&dir);
        store.set("k", "old").unwrap();
        store.set("k", "new").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("new"));
        assert!(!dir.join("k.json.tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
