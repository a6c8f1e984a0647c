//! Client-local storage for autosave snapshots

use crate::delta::Delta;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Key/value storage local to this client
pub trait LocalStore {
    fn set_item(&mut self, key: &str, value: &str) -> crate::Result<()>;

    /// Out-of-band reads only; the bridge never calls this
    fn get_item(&self, key: &str) -> crate::Result<Option<String>>;
}

/// Storage key of a room's snapshot, e.g. `studyguide:r1`
pub fn storage_key(prefix: &str, room_id: &str) -> String {
    format!("{}{}", prefix, room_id)
}

/// One JSON file per key under a directory
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

    /// File backing `key`; characters unsafe in file names become `_`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl LocalStore for FileStore {
    fn set_item(&mut self, key: &str, value: &str) -> crate::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        fs::write(&path, value)?;
        tracing::trace!("Wrote snapshot: {:?}", path);
        Ok(())
    }

    fn get_item(&self, key: &str) -> crate::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    items: HashMap<String, String>,
    quota: Option<usize>,
    writes: usize,
}

/// In-memory store with an optional byte quota; clones share the same items
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push the stored bytes past `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        let store = Self::new();
        store.lock().quota = Some(bytes);
        store
    }

    /// Successful writes so far
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalStore for MemoryStore {
    fn set_item(&mut self, key: &str, value: &str) -> crate::Result<()> {
        let mut inner = self.lock();
        if let Some(quota) = inner.quota {
            let others: usize = inner
                .items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(crate::CollabError::Storage("quota exceeded".to_string()));
            }
        }
        inner.items.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(())
    }

    fn get_item(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self.lock().items.get(key).cloned())
    }
}

/// Write-only snapshot of the surface contents under a room-scoped key
pub struct Autosave {
    store: Box<dyn LocalStore>,
    key: String,
    enabled: bool,
}

impl Autosave {
    pub fn new(store: Box<dyn LocalStore>, prefix: &str, room_id: &str) -> Self {
        Self {
            store,
            key: storage_key(prefix, room_id),
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialize and store `contents`. Failures are swallowed; returns whether
    /// the snapshot was written.
    pub fn record(&mut self, contents: &Delta) -> bool {
        if !self.enabled {
            return false;
        }

        let written = serde_json::to_string(contents)
            .map_err(crate::CollabError::from)
            .and_then(|json| self.store.set_item(&self.key, &json));

        match written {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(key = %self.key, "Autosave skipped: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let temp = assert_fs::TempDir::new().unwrap();
        let temp_dir = temp.path().join("autosave");

        let mut store = FileStore::new(&temp_dir);
        assert_eq!(store.get_item("studyguide:r1").unwrap(), None);

        store.set_item("studyguide:r1", "{\"ops\":[]}").unwrap();
        assert_eq!(
            store.get_item("studyguide:r1").unwrap().as_deref(),
            Some("{\"ops\":[]}")
        );
        assert!(temp_dir.join("studyguide_r1.json").exists());
    }

    #[test]
    fn test_key_sanitizing() {
        let store = FileStore::new("/tmp/x");
        assert_eq!(
            store.path_for("studyguide:../../etc"),
            PathBuf::from("/tmp/x/studyguide_.._.._etc.json")
        );
    }

    #[test]
    fn test_memory_quota() {
        let mut store = MemoryStore::with_quota(20);
        store.set_item("k", "0123456789").unwrap();
        // Overwriting the same key only counts the new value.
        store.set_item("k", "abcdefghij").unwrap();

        let err = store.set_item("other", "0123456789").unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn test_autosave_swallows_failures() {
        let store = MemoryStore::with_quota(0);
        let mut autosave = Autosave::new(Box::new(store.clone()), "studyguide:", "r1");

        assert_eq!(autosave.key(), "studyguide:r1");
        assert!(!autosave.record(&Delta::from_text("hi")));
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_autosave_writes_editor_json() {
        let store = MemoryStore::new();
        let mut autosave = Autosave::new(Box::new(store.clone()), "studyguide:", "r1");

        assert!(autosave.record(&Delta::from_text("hi")));
        assert_eq!(
            store.get_item("studyguide:r1").unwrap().as_deref(),
            Some(r#"{"ops":[{"insert":"hi"}]}"#)
        );
    }

    #[test]
    fn test_disabled_autosave_writes_nothing() {
        let store = MemoryStore::new();
        let mut autosave =
            Autosave::new(Box::new(store.clone()), "studyguide:", "r1").enabled(false);

        assert!(!autosave.record(&Delta::from_text("hi")));
        assert_eq!(store.writes(), 0);
    }
}
