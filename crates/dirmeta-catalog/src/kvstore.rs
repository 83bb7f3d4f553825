//! Transactional key-value storage collaborator.
//!
//! The catalog only needs point reads, prefix scans and atomic batches.
//! `MemoryKvStore` keeps everything in a BTreeMap and is used for tests
//! and embedded deployments; a database-backed store implements the same
//! trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::CatalogError;

/// Key type for the KV store.
pub type Key = Vec<u8>;
/// Value type for the KV store.
pub type Value = Vec<u8>;
/// A key-value pair.
pub type KvPair = (Key, Value);

/// Key-value store trait backing every catalog table.
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns None if the key doesn't exist.
    fn get(&self, key: &[u8]) -> Result<Option<Value>, CatalogError>;

    /// Put a key-value pair. Overwrites any existing value.
    fn put(&self, key: Key, value: Value) -> Result<(), CatalogError>;

    /// Delete a key. Returns Ok(()) even if the key didn't exist.
    fn delete(&self, key: &[u8]) -> Result<(), CatalogError>;

    /// Scan all keys with the given prefix, returning pairs in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>, CatalogError>;

    /// Returns true if the key exists.
    fn contains_key(&self, key: &[u8]) -> Result<bool, CatalogError>;

    /// Apply a batch of operations as one atomically visible unit.
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), CatalogError>;
}

/// A single operation in a write batch.
#[derive(Clone, Debug)]
pub enum BatchOp {
    /// Insert or overwrite a key.
    Put {
        /// The key to write.
        key: Key,
        /// The value to store.
        value: Value,
    },
    /// Delete a key.
    Delete {
        /// The key to delete.
        key: Key,
    },
    /// Delete every key starting with the prefix.
    DeletePrefix {
        /// The prefix to clear.
        prefix: Key,
    },
}

/// In-memory KV store backed by a BTreeMap.
pub struct MemoryKvStore {
    data: Arc<RwLock<BTreeMap<Key, Value>>>,
}

impl MemoryKvStore {
    /// Creates a new empty in-memory KV store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

fn prefix_keys(data: &BTreeMap<Key, Value>, prefix: &[u8]) -> Vec<Key> {
    data.range::<Key, _>(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, _)| k.clone())
        .collect()
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Value>, CatalogError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: Key, value: Value) -> Result<(), CatalogError> {
        self.data.write().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), CatalogError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>, CatalogError> {
        let data = self.data.read();
        Ok(data
            .range::<Key, _>(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn contains_key(&self, key: &[u8]) -> Result<bool, CatalogError> {
        Ok(self.data.read().contains_key(key))
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), CatalogError> {
        let mut data = self.data.write();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    data.remove(&key);
                }
                BatchOp::DeletePrefix { prefix } => {
                    for key in prefix_keys(&data, &prefix) {
                        data.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}
