//! Directory-backed blob store.
//!
//! Each blob lives in its own file named after the hex encoding of its key,
//! so any key is a safe file name. Writes land in a temporary file that is
//! renamed over the target, which keeps a reader from seeing half a blob.

use super::{BlobStore, check_key};
use crate::error::{Result, TblError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const BLOB_EXTENSION: &str = "tbl";

/// Blob store keeping one file per key in a directory.
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
    next_temp: AtomicU64,
}

impl DirStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let root = dir.into();
        fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;
        tracing::debug!(root = %root.display(), "Opened directory store");
        Ok(Self {
            root,
            next_temp: AtomicU64::new(0),
        })
    }

    /// The directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of the blob stored under `key`.
    pub fn path_of(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self
            .root
            .join(format!("{}.{}", hex::encode(key), BLOB_EXTENSION)))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let n = self.next_temp.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{}.{}.{}.tmp",
            hex::encode(key),
            std::process::id(),
            n
        ))
    }
}

impl BlobStore for DirStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(key)?;
        let temp = self.temp_path(key);

        let written = fs::File::create(&temp).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(io_error(&temp, e));
        }
        fs::rename(&temp, &path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            io_error(&path, e)
        })?;

        tracing::trace!(key, size_bytes = bytes.len(), "Wrote blob");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_of(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_of(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match hex::decode(stem).ok().and_then(|b| String::from_utf8(b).ok()) {
                Some(key) => keys.push(key),
                None => {
                    tracing::debug!(path = %path.display(), "Skipping file with undecodable name");
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn size(&self, key: &str) -> Result<Option<u64>> {
        let path = self.path_of(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

fn io_error(path: &Path, e: io::Error) -> TblError {
    TblError::Io {
        path: path.to_path_buf(),
        cause: e.to_string(),
    }
}
