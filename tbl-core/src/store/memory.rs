//! In-memory blob store.

use super::{BlobStore, check_key};
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory blob store for testing and single-process use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Check if the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Total bytes held across all blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs.read().values().map(|b| b.len() as u64).sum()
    }
}

impl BlobStore for MemoryStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        check_key(key)?;
        self.blobs.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.write().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.blobs.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn size(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.blobs.read().get(key).map(|b| b.len() as u64))
    }
}
