use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::debug;
use sled::Db;
use tempfile::NamedTempFile;
use thiserror::Error;

use super::block::Block;

/// Key the chain is stored under unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "chainsphere_blockchain";

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A durable key-value store
///
/// `set` must replace the value atomically: after a crash the key holds
/// either the old value or the new one.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

/// In-memory store, for tests and ephemeral nodes
///
/// Writes can be made to fail on demand with [`MemoryStore::set_fail_on_set`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Vec<u8>>>,
    fail_on_set: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set` fail until called again with `false`
    pub fn set_fail_on_set(&self, fail: bool) {
        self.fail_on_set.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if self.fail_on_set.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!(
                "simulated write failure for key {}",
                key
            )));
        }

        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Store backed by a sled database
pub struct SledStore {
    db: Db,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

impl SledStore {
    /// Opens (or creates) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key.as_bytes())?.map(|value| value.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        // A single-key insert is atomic in sled; flushing makes it durable
        self.db.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }
}

/// Store keeping one JSON file per key in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens the store, creating the directory if needed
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        // Write a sibling temp file, sync it, then rename over the target
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(value)?;
        file.as_file().sync_all()?;
        file.persist(self.path_for(key))
            .map_err(|e| StorageError::IoError(e.error))?;

        // The rename is only durable once the directory entry is synced
        #[cfg(unix)]
        fs::File::open(&self.dir)?.sync_all()?;

        Ok(())
    }
}

/// Persists the ordered block sequence as one JSON record under a single key
#[derive(Clone)]
pub struct BlockchainStorage {
    /// The durable store
    store: Arc<dyn KeyValueStore>,

    /// Key the chain is stored under
    key: String,
}

impl std::fmt::Debug for BlockchainStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainStorage")
            .field("key", &self.key)
            .finish()
    }
}

impl BlockchainStorage {
    /// Creates a new blockchain storage
    ///
    /// # Arguments
    ///
    /// * `store` - The durable key-value store
    /// * `key` - The key the chain is stored under
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Storage on a fresh [`MemoryStore`] under the default key
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_STORAGE_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Writes the full chain, replacing the previous record
    pub fn save_chain(&self, chain: &[Block]) -> Result<(), StorageError> {
        let value = serde_json::to_vec(chain)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        self.store.set(&self.key, &value)?;
        debug!("Persisted {} blocks under key {}", chain.len(), self.key);

        Ok(())
    }

    /// Reads the chain
    ///
    /// # Returns
    ///
    /// `Ok(None)` if nothing is stored, an error if the record cannot be read
    /// or decoded. The blocks are returned as stored, without validation;
    /// an empty list is left for the caller to handle.
    pub fn load_chain(&self) -> Result<Option<Vec<Block>>, StorageError> {
        let value = match self.store.get(&self.key)? {
            Some(value) => value,
            None => return Ok(None),
        };

        let chain: Vec<Block> = serde_json::from_slice(&value)
            .map_err(|e| StorageError::DeserializationError(e.to_string()))?;

        Ok(Some(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::hash::Sha256Hasher;
    use tempfile::tempdir;

    fn sample_chain() -> Vec<Block> {
        vec![Block::genesis(&Sha256Hasher).unwrap()]
    }

    #[test]
    fn test_memory_store_round_trip() {
        let storage = BlockchainStorage::in_memory();
        assert!(storage.load_chain().unwrap().is_none());

        storage.save_chain(&sample_chain()).unwrap();
        assert_eq!(storage.load_chain().unwrap(), Some(sample_chain()));
    }

    #[test]
    fn test_memory_store_simulated_failure() {
        let store = MemoryStore::new();
        store.set_fail_on_set(true);
        assert!(matches!(store.set("k", b"v"), Err(StorageError::Unavailable(_))));
        assert!(store.get("k").unwrap().is_none());

        store.set_fail_on_set(false);
        store.set("k", b"v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_unreadable_record() {
        let store = Arc::new(MemoryStore::new());
        store.set(DEFAULT_STORAGE_KEY, b"not json").unwrap();

        let storage = BlockchainStorage::new(store.clone(), DEFAULT_STORAGE_KEY);
        assert!(matches!(
            storage.load_chain(),
            Err(StorageError::DeserializationError(_))
        ));

        store.set(DEFAULT_STORAGE_KEY, b"[]").unwrap();
        assert_eq!(storage.load_chain().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_sled_store_persists_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = Arc::new(SledStore::open(dir.path()).unwrap());
            let storage = BlockchainStorage::new(store, DEFAULT_STORAGE_KEY);
            storage.save_chain(&sample_chain()).unwrap();
        }

        let store = Arc::new(SledStore::open(dir.path()).unwrap());
        let storage = BlockchainStorage::new(store, DEFAULT_STORAGE_KEY);
        assert_eq!(storage.load_chain().unwrap(), Some(sample_chain()));
    }

    #[test]
    fn test_file_store_replaces_value() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(store.get("ledger").unwrap().is_none());
        store.set("ledger", b"first").unwrap();
        store.set("ledger", b"second").unwrap();
        assert_eq!(store.get("ledger").unwrap(), Some(b"second".to_vec()));

        // Only the target file remains, no stray temp files
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
