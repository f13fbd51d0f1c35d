use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Flat string key-value storage shared by every cache consumer.
///
/// Access is synchronous. Concurrent writers to the same key are
/// last-write-wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One file per key under a cache directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Keys such as `bufood:products` are not valid file names everywhere.
    /// Anything outside `[A-Za-z0-9-]` becomes `_XX` per UTF-8 byte, `_`
    /// included, so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("_{:02X}", byte));
            }
        }
        self.dir.join(format!("{}.json", name))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // Write-then-rename so a reader never sees a half-written file
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|source| StoreError::Io {
                key: key.to_string(),
                source,
            })
    }
}

/// In-process store, used for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        temp_dir().join(format!("bufood_store_test_{}_{}", name, nanos))
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = test_dir("round_trip");
        let store = FileStore::new(dir.clone()).unwrap();

        assert_eq!(store.get("bufood:products").unwrap(), None);
        store.set("bufood:products", "[]").unwrap();
        assert_eq!(store.get("bufood:products").unwrap().as_deref(), Some("[]"));
        assert!(dir.join("bufood_3Aproducts.json").exists());

        store.set("bufood:products", "[1]").unwrap();
        assert_eq!(store.get("bufood:products").unwrap().as_deref(), Some("[1]"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_similar_keys_do_not_collide() {
        let dir = test_dir("collide");
        let store = FileStore::new(dir.clone()).unwrap();

        store.set("bufood:cart", "a").unwrap();
        store.set("bufood_cart", "b").unwrap();
        store.set("bufood/cart", "c").unwrap();
        assert_eq!(store.get("bufood:cart").unwrap().as_deref(), Some("a"));
        assert_eq!(store.get("bufood_cart").unwrap().as_deref(), Some("b"));
        assert_eq!(store.get("bufood/cart").unwrap().as_deref(), Some("c"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_memory_store_last_write_wins() {
        let store = MemoryStore::new();
        store.set("favorites", "[\"a\"]").unwrap();
        store.set("favorites", "[\"b\"]").unwrap();
        assert_eq!(store.get("favorites").unwrap().as_deref(), Some("[\"b\"]"));
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
