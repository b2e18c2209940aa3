use anyhow::{Context, Result};
use pdf_merger_core::{AppConfig, ArtifactId, PdfMerger, SweepReport};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Global application state
pub struct AppState {
    pub merger: PdfMerger,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let merger = PdfMerger::new(config).context("Failed to open storage")?;
        info!(
            "Storing uploads in {} and outputs in {}",
            merger.registry().storage().root().display(),
            merger.artifacts().storage().root().display()
        );
        Ok(Self { merger })
    }

    /// Delete an artifact once its download retention window has passed.
    pub fn schedule_expiry(self: &Arc<Self>, id: ArtifactId) {
        let state = Arc::clone(self);
        let delay = self.merger.artifacts().retention();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let expired = tokio::task::spawn_blocking(move || {
                let result = state.merger.artifacts().expire(&id);
                (id, result)
            })
            .await;
            match expired {
                Ok((id, Ok(true))) => debug!("Expired downloaded artifact {}", id),
                Ok((_, Ok(false))) => {}
                Ok((id, Err(e))) => warn!("Failed to expire artifact {}: {}", id, e),
                Err(e) => warn!("Expiry task failed: {}", e),
            }
        });
    }

    /// Reclaim stale documents and artifacts.
    pub async fn sweep(self: &Arc<Self>) -> Option<SweepReport> {
        let state = Arc::clone(self);
        match tokio::task::spawn_blocking(move || state.merger.sweep()).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Sweep task failed: {}", e);
                None
            }
        }
    }
}
