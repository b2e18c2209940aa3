//! Advisory page classification (blank or black pages).
//!
//! Detectors only produce flags; they never enable, disable or drop pages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::manifest::PageFlag;
use crate::pdf::PdfDocument;
use crate::registry::SourceDocument;
use crate::storage::DocumentId;

/// One classified page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub source_document_id: DocumentId,
    /// 1-based
    pub page_number: usize,
    pub kind: PageFlag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Detection {
    pub const fn new(source_document_id: DocumentId, page_number: usize, kind: PageFlag) -> Self {
        Self {
            source_document_id,
            page_number,
            kind,
            confidence: None,
        }
    }
}

/// Information about a detector backend
#[derive(Debug, Clone)]
pub struct DetectorInfo {
    pub name: &'static str,
}

/// Trait for page classification backends
#[async_trait]
pub trait PageDetector: Send + Sync {
    fn info(&self) -> DetectorInfo;

    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Classify the pages of one document. Pages without a verdict are omitted.
    async fn detect(&self, document: &SourceDocument, pdf: &PdfDocument) -> Result<Vec<Detection>>;
}

/// Detector that never flags anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDetector;

#[async_trait]
impl PageDetector for NoopDetector {
    fn info(&self) -> DetectorInfo {
        DetectorInfo {
            name: "noop",
        }
    }

    async fn detect(&self, _document: &SourceDocument, _pdf: &PdfDocument) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}

/// The detector used when none is configured.
pub fn default_detector() -> Arc<dyn PageDetector> {
    Arc::new(NoopDetector)
}
