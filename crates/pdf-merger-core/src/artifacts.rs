//! Store for generated output documents.
//!
//! An artifact can be downloaded until its retention window closes. The
//! window opens on first retrieval; artifacts nobody fetches are reclaimed
//! after a longer, separate timeout by [`ArtifactStore::sweep`].

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::RetentionConfig;
use crate::error::{Error, Result};
use crate::storage::{ArtifactId, StorageDir};

#[derive(Debug, Clone, Copy)]
struct ArtifactEntry {
    created_at: Instant,
    first_retrieved: Option<Instant>,
}

/// A freshly stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    pub id: ArtifactId,
    pub size_bytes: u64,
}

/// A retrieved artifact, ready to stream.
#[derive(Debug, Clone)]
pub struct Download {
    pub id: ArtifactId,
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Whether this retrieval opened the retention window
    pub first_retrieval: bool,
}

#[derive(Debug)]
pub struct ArtifactStore {
    storage: StorageDir,
    retention: Duration,
    unclaimed_age: Duration,
    entries: Mutex<HashMap<ArtifactId, ArtifactEntry>>,
}

impl ArtifactStore {
    /// Open the store rooted at `root`.
    ///
    /// Artifacts do not outlive the process that produced them, so anything
    /// found on disk is deleted.
    pub fn open(root: impl AsRef<Path>, retention: &RetentionConfig) -> Result<Self> {
        let storage = StorageDir::open(root)?;

        let stale = storage.keys()?;
        for key in &stale {
            storage.remove(key)?;
        }
        if !stale.is_empty() {
            info!("Deleted {} artifacts left from a previous run", stale.len());
        }

        Ok(Self {
            storage,
            retention: retention.download_retention(),
            unclaimed_age: retention.unclaimed_artifact_age(),
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub const fn retention(&self) -> Duration {
        self.retention
    }

    pub fn storage(&self) -> &StorageDir {
        &self.storage
    }

    /// Store a completed output under a fresh id derived from `file_name`.
    pub fn persist(&self, file_name: &str, bytes: &[u8]) -> Result<StoredArtifact> {
        let id = ArtifactId::generate(file_name)?;
        let size_bytes = self.storage.write(id.as_str(), bytes)?;

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.clone(),
                ArtifactEntry {
                    created_at: Instant::now(),
                    first_retrieved: None,
                },
            );

        info!("Stored artifact {} ({} bytes)", id, size_bytes);
        Ok(StoredArtifact { id, size_bytes })
    }

    /// Fetch an artifact by its externally supplied identifier.
    ///
    /// Malformed identifiers are `AccessDenied`; unknown, expired or deleted
    /// ones are `NotFound`.
    pub fn retrieve(&self, id: &str) -> Result<Download> {
        let id = ArtifactId::parse(id)?;
        let not_found = || Error::NotFound(format!("artifact {id}"));

        let first_retrieval = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = entries.get_mut(&id).ok_or_else(not_found)?;
            let now = Instant::now();
            match entry.first_retrieved {
                Some(at) if now.duration_since(at) > self.retention => return Err(not_found()),
                Some(_) => false,
                None => {
                    entry.first_retrieved = Some(now);
                    true
                }
            }
        };

        let bytes = self.storage.read(id.as_str())?;
        debug!("Retrieved artifact {} ({} bytes)", id, bytes.len());

        Ok(Download {
            file_name: id.file_name().to_string(),
            id,
            bytes,
            first_retrieval,
        })
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete an artifact now. Expiring twice is harmless.
    ///
    /// Returns whether anything was removed.
    pub fn expire(&self, id: &ArtifactId) -> Result<bool> {
        let indexed = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        let stored = self.storage.remove(id.as_str())?;

        if indexed || stored {
            debug!("Expired artifact {}", id);
        }
        Ok(indexed || stored)
    }

    /// Expire artifacts past their retention window or never fetched in time.
    pub fn sweep(&self) -> Vec<ArtifactId> {
        let now = Instant::now();
        let due: Vec<ArtifactId> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, entry)| match entry.first_retrieved {
                Some(at) => now.duration_since(at) > self.retention,
                None => now.duration_since(entry.created_at) > self.unclaimed_age,
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            match self.expire(&id) {
                Ok(_) => expired.push(id),
                Err(e) => warn!("Failed to sweep artifact {}: {}", id, e),
            }
        }
        if !expired.is_empty() {
            info!("Swept {} artifacts", expired.len());
        }
        expired
    }
}
