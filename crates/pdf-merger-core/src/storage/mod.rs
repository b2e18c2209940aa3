//! Flat on-disk storage for source documents and output artifacts.
//!
//! Each stored binary lives directly inside a root directory under a
//! validated key. Every path handed out is checked against the canonical
//! root, so no identifier (however crafted) can read or delete outside it.
//!
//! Writes go through a temporary file in the same directory and are renamed
//! into place, so readers never observe a half-written binary.

mod key;

pub use key::{ArtifactId, DocumentId, validate_key};

use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

/// A directory holding one file per key.
#[derive(Debug, Clone)]
pub struct StorageDir {
    /// Canonical root; all resolved paths must stay directly inside it
    root: PathBuf,
}

impl StorageDir {
    /// Open (creating if needed) a storage directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        debug!("Opened storage at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its path, refusing anything outside the root.
    ///
    /// When the entry exists its canonical path is checked too, which catches
    /// symlinks planted inside the root that point elsewhere.
    pub fn resolve(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;

        let path = self.root.join(key);
        if path.parent() != Some(self.root.as_path()) {
            return Err(Error::AccessDenied("identifier escapes storage".to_string()));
        }

        match path.canonicalize() {
            Ok(real) if real.parent() != Some(self.root.as_path()) => {
                Err(Error::AccessDenied("identifier escapes storage".to_string()))
            }
            Ok(_) => Ok(path),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(path),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically write `data` under `key`, returning the byte count.
    pub fn write(&self, key: &str, data: &[u8]) -> Result<u64> {
        let path = self.resolve(key)?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

        debug!("Stored {} ({} bytes)", key, data.len());
        Ok(data.len() as u64)
    }

    /// Read the binary stored under `key`.
    pub fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == IoErrorKind::NotFound {
                Error::NotFound(format!("stored entry {key}"))
            } else {
                Error::Io(e)
            }
        })
    }

    /// Remove the entry. Returns whether something was actually deleted.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", key);
                Ok(true)
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Keys of all committed entries (in-flight temp files are skipped).
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && validate_key(name).is_ok()
            {
                keys.push(name.to_string());
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }
}
