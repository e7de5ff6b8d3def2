//! Blob stores for flattened table images.
//!
//! A store maps string keys to opaque byte blobs. Tables go in through
//! [`store_table`], which flattens them first, and come back out through
//! [`load_table`], which validates the blob before adopting it. The store
//! itself never interprets the bytes.

mod dir;
mod memory;

pub use dir::DirStore;
pub use memory::MemoryStore;

use crate::error::{Result, TblError};
use crate::table::Table;
use crate::types::Element;

/// Trait for storing and retrieving opaque blobs by key.
pub trait BlobStore: Send + Sync {
    /// Store a blob, replacing any previous blob under the same key.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Get a copy of the blob stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a blob. Returns whether a blob was present.
    fn remove(&self, key: &str) -> Result<bool>;

    /// List all keys, sorted.
    fn keys(&self) -> Result<Vec<String>>;

    /// Size in bytes of the blob stored under `key`.
    fn size(&self, key: &str) -> Result<Option<u64>>;

    /// Check if a blob is stored under `key`.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.size(key)?.is_some())
    }
}

/// Flatten `table` and store its image under `key`.
///
/// Returns the number of bytes written.
pub fn store_table<T, S>(store: &S, key: &str, table: &mut Table<T>) -> Result<u64>
where
    T: Element,
    S: BlobStore + ?Sized,
{
    let image = table.serialize()?;
    store.put(key, image)?;
    tracing::debug!(key, size_bytes = image.len(), "Stored table image");
    Ok(image.len() as u64)
}

/// Load and validate the table image stored under `key`.
pub fn load_table<T, S>(store: &S, key: &str) -> Result<Table<T>>
where
    T: Element,
    S: BlobStore + ?Sized,
{
    let bytes = store.get(key)?.ok_or_else(|| TblError::Store {
        key: key.to_string(),
        cause: "no blob stored under this key".to_string(),
    })?;
    Table::from_image(bytes)
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(TblError::Store {
            key: String::new(),
            cause: "blob key must not be empty".to_string(),
        });
    }
    Ok(())
}
