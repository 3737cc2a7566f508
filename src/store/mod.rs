//! Local key-value persistence
//!
//! Synchronous, never-failing storage keyed by string. Platform storage
//! errors are out of scope for the engine; the file-backed implementation
//! logs and swallows I/O failures to honor that contract.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::warn;

/// Durable key-value storage for identity lists, session pointers and
/// per-user snapshots
pub trait LocalStore: Send + Sync {
    /// Read a value, `None` when absent
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, overwriting any previous one
    fn put(&self, key: &str, value: &str);

    /// Delete a value if present
    fn remove(&self, key: &str);
}

/// In-memory store, used as the default backing and in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.inner.lock().unwrap().remove(key);
    }
}

/// File-backed store: one file per key under a directory.
/// Keys are encoded to stay filesystem-safe for any username.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created lazily
    /// on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(URL_SAFE_NO_PAD.encode(key))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn put(&self, key: &str, value: &str) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!("local store: cannot create {}: {}", self.dir.display(), e);
            return;
        }
        if let Err(e) = fs::write(self.path_for(key), value) {
            warn!("local store: write failed for {}: {}", key, e);
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = fs::remove_file(self.path_for(key)) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("local store: remove failed for {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::default();
        assert_eq!(store.get("k"), None);
        store.put("k", "v1");
        store.put("k", "v2");
        assert_eq!(store.get("k"), Some("v2".to_string()));
        store.remove("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn file_store_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::new(dir.path());
            store.put("mister_mandob_data_خالد", "{\"stock\":{}}");
        }
        let store = FileStore::new(dir.path());
        assert_eq!(
            store.get("mister_mandob_data_خالد"),
            Some("{\"stock\":{}}".to_string())
        );
        store.remove("mister_mandob_data_خالد");
        assert_eq!(store.get("mister_mandob_data_خالد"), None);
        // removing an absent key is a no-op
        store.remove("mister_mandob_data_خالد");
    }
}
