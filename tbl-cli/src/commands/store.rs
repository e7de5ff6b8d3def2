//! Store commands - move images in and out of a directory store.

use super::{ElemKind, read_image, validate};
use anyhow::{Context, Result, bail};
use std::path::Path;
use tbl_core::{BlobStore, DirStore};

fn open(dir: &Path) -> Result<DirStore> {
    DirStore::open(dir).with_context(|| format!("Failed to open store: {}", dir.display()))
}

/// Validate an image file and store it under `key`.
pub fn put(dir: &Path, key: &str, file: &Path, elem: ElemKind) -> Result<()> {
    let bytes = read_image(file)?;
    let checked = match elem {
        ElemKind::U64 => validate::check::<u64>(&bytes),
        ElemKind::I64 => validate::check::<i64>(&bytes),
        ElemKind::F64 => validate::check::<f64>(&bytes),
    };
    if let Err(e) = checked {
        bail!("Refusing to store {}: [{}] {}", file.display(), e.code(), e);
    }

    let store = open(dir)?;
    store.put(key, &bytes)?;
    println!("✓ Stored '{}' ({} bytes)", key, bytes.len());
    Ok(())
}

/// Copy the blob stored under `key` to `file`.
pub fn get(dir: &Path, key: &str, file: &Path) -> Result<()> {
    let store = open(dir)?;
    let Some(bytes) = store.get(key)? else {
        bail!("No blob stored under '{}' in {}", key, dir.display());
    };
    std::fs::write(file, &bytes)
        .with_context(|| format!("Failed to write image: {}", file.display()))?;
    println!("✓ Wrote '{}' to {} ({} bytes)", key, file.display(), bytes.len());
    Ok(())
}

/// List stored keys with their sizes.
pub fn list(dir: &Path) -> Result<()> {
    let store = open(dir)?;
    let keys = store.keys()?;
    if keys.is_empty() {
        println!("No blobs stored in {}", dir.display());
        return Ok(());
    }

    println!("{:<44} {:>12}", "KEY", "BYTES");
    println!("{}", "-".repeat(57));
    for key in keys {
        let size = store.size(&key)?.unwrap_or(0);
        println!("{:<44} {:>12}", key, size);
    }
    Ok(())
}

/// Remove the blob stored under `key`.
pub fn remove(dir: &Path, key: &str) -> Result<()> {
    let store = open(dir)?;
    if store.remove(key)? {
        println!("✓ Removed '{}'", key);
    } else {
        println!("No blob stored under '{}'", key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tbl_core::Table;
    use tempfile::TempDir;

    #[test]
    fn put_then_get_copies_the_image() {
        let dir = TempDir::new().unwrap();
        let store_dir = dir.path().join("store");

        let mut table = Table::<u64>::new();
        table.extend_from_slice(&[1, 2]).unwrap();
        let source = dir.path().join("in.tbl");
        std::fs::write(&source, table.serialize().unwrap()).unwrap();

        put(&store_dir, "t", &source, ElemKind::U64).unwrap();
        let target = dir.path().join("out.tbl");
        get(&store_dir, "t", &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), std::fs::read(&source).unwrap());

        remove(&store_dir, "t").unwrap();
        assert!(get(&store_dir, "t", &target).is_err());
    }

    #[test]
    fn put_rejects_invalid_images() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("junk");
        std::fs::write(&source, b"junk").unwrap();
        assert!(put(dir.path(), "junk", &source, ElemKind::F64).is_err());
    }
}
