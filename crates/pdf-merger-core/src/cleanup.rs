//! Explicit deletion of documents and artifacts, plus the periodic sweep.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::artifacts::ArtifactStore;
use crate::error::{ErrorKind, Result};
use crate::registry::DocumentRegistry;
use crate::storage::{ArtifactId, DocumentId, validate_key};

/// Per-identifier outcome of a cleanup request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Identifiers that are now gone (including ones that never existed)
    pub removed: Vec<String>,
    pub errors: Vec<CleanupFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupFailure {
    pub id: String,
    pub error_kind: ErrorKind,
    pub detail: String,
}

/// What a sweep reclaimed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub documents: Vec<DocumentId>,
    pub artifacts: Vec<ArtifactId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.artifacts.is_empty()
    }
}

/// Delete each identifier, whether it names a document or an artifact.
///
/// Every id is handled on its own: one failure never stops the rest, and an
/// id that is already gone counts as removed.
pub fn cleanup<S: AsRef<str>>(
    registry: &DocumentRegistry,
    artifacts: &ArtifactStore,
    ids: &[S],
) -> CleanupReport {
    let mut report = CleanupReport::default();

    for id in ids {
        let id = id.as_ref();
        match remove_one(registry, artifacts, id) {
            Ok(()) => report.removed.push(id.to_string()),
            Err(e) => {
                warn!("Cleanup of {} failed: {}", id, e);
                report.errors.push(CleanupFailure {
                    id: id.to_string(),
                    error_kind: e.kind(),
                    detail: e.detail(),
                });
            }
        }
    }

    debug!(
        "Cleanup removed {}, failed {}",
        report.removed.len(),
        report.errors.len()
    );
    report
}

fn remove_one(registry: &DocumentRegistry, artifacts: &ArtifactStore, id: &str) -> Result<()> {
    validate_key(id)?;
    registry.remove(&DocumentId::parse(id)?)?;
    artifacts.expire(&ArtifactId::parse(id)?)?;
    Ok(())
}

/// Reclaim documents older than `document_max_age` and expired artifacts.
pub fn sweep(registry: &DocumentRegistry, artifacts: &ArtifactStore, document_max_age: Duration) -> SweepReport {
    SweepReport {
        documents: registry.sweep_older_than(document_max_age),
        artifacts: artifacts.sweep(),
    }
}
