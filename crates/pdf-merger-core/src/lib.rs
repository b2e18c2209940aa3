//! PDF Merger Core Library
//!
//! This library provides the core functionality for assembling PDFs from pages
//! of uploaded documents:
//! - Registration and storage of uploaded PDFs
//! - A client-editable page manifest (order, rotation, enabled state)
//! - Planning and page-level assembly of the merged output
//! - Download artifacts with retention, and cleanup of everything stored

pub mod artifacts;
pub mod assembly;
pub mod cleanup;
pub mod config;
pub mod detect;
pub mod error;
pub mod manifest;
pub mod pdf;
pub mod plan;
pub mod registry;
pub mod storage;
pub mod util;

pub use artifacts::{ArtifactStore, Download, StoredArtifact};
pub use assembly::{AssemblyEngine, AssemblyJob, AssemblyOptions, AssemblyResult, AssemblyState};
pub use cleanup::{CleanupFailure, CleanupReport, SweepReport};
pub use config::{AppConfig, DEFAULT_OUTPUT_NAME};
pub use detect::{Detection, NoopDetector, PageDetector};
pub use error::{Error, ErrorKind, Result};
pub use manifest::{PageFlag, PageId, PageManifest, PageRef, PageSummary, Rotation};
pub use pdf::{PageIndex, PdfDocument};
pub use plan::{MergePageRequest, MergePlan, MergePlanner, MergeRequest};
pub use registry::{DocumentRegistry, DocumentSummary, SourceDocument};
pub use storage::{ArtifactId, DocumentId};

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A file received for registration.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// Per-file outcome of an upload batch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub files: Vec<DocumentSummary>,
    pub errors: Vec<UploadFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailure {
    pub file_name: String,
    pub error_kind: ErrorKind,
    pub detail: String,
}

/// High-level merger that wires registry, artifacts and detector together
pub struct PdfMerger {
    registry: Arc<DocumentRegistry>,
    artifacts: Arc<ArtifactStore>,
    detector: Arc<dyn PageDetector>,
    config: AppConfig,
}

impl PdfMerger {
    /// Create a merger storing files where `config` says
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_detector(config, detect::default_detector())
    }

    /// Create with a custom page detector
    pub fn with_detector(config: AppConfig, detector: Arc<dyn PageDetector>) -> Result<Self> {
        config.validate()?;
        let registry = DocumentRegistry::open(config.storage.upload_dir())?;
        let artifacts = ArtifactStore::open(config.storage.output_dir(), &config.retention)?;

        Ok(Self {
            registry: Arc::new(registry),
            artifacts: Arc::new(artifacts),
            detector,
            config,
        })
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn detector(&self) -> &dyn PageDetector {
        self.detector.as_ref()
    }

    /// Register a batch of uploads, one outcome per file.
    ///
    /// Files that neither carry a `.pdf` name nor start with a PDF header are
    /// rejected without parsing, as are files over the size limit.
    pub fn upload(&self, files: Vec<UploadedFile>) -> Result<UploadReport> {
        let limits = &self.config.limits;
        if files.is_empty() {
            return Err(Error::InvalidRequest("no files uploaded".to_string()));
        }
        if files.len() > limits.max_files_per_upload {
            return Err(Error::InvalidRequest(format!(
                "at most {} files per upload",
                limits.max_files_per_upload
            )));
        }

        let mut report = UploadReport::default();
        for file in files {
            match self.register_one(file.name.as_str(), file.content) {
                Ok(doc) => report.files.push(doc.summary()),
                Err(e) => report.errors.push(UploadFailure {
                    file_name: file.name,
                    error_kind: e.kind(),
                    detail: e.detail(),
                }),
            }
        }

        info!(
            "Upload batch: {} registered, {} rejected",
            report.files.len(),
            report.errors.len()
        );
        Ok(report)
    }

    fn register_one(&self, name: &str, content: Vec<u8>) -> Result<SourceDocument> {
        if !looks_like_pdf(name, &content) {
            return Err(Error::InvalidDocument {
                name: name.to_string(),
                reason: "not a PDF file".to_string(),
            });
        }
        let max = self.config.limits.max_upload_bytes();
        if content.len() as u64 > max {
            return Err(Error::InvalidRequest(format!(
                "{name} exceeds the {} MB upload limit",
                self.config.limits.max_upload_mb
            )));
        }
        self.registry.register(name, content)
    }

    /// Expand documents into a fresh manifest; all documents when `ids` is empty.
    pub fn build_manifest(&self, ids: &[DocumentId]) -> Result<PageManifest> {
        let documents = if ids.is_empty() {
            self.registry.list()
        } else {
            ids.iter()
                .map(|id| self.registry.get(id))
                .collect::<Result<Vec<_>>>()?
        };
        Ok(PageManifest::build(&documents))
    }

    /// Drop pages whose source document is no longer registered.
    #[must_use]
    pub fn prune_manifest(&self, manifest: &PageManifest) -> PageManifest {
        let mut gone: Vec<&DocumentId> = manifest
            .pages()
            .iter()
            .map(|page| &page.source_document_id)
            .filter(|id| !self.registry.contains(id))
            .collect();
        gone.sort_unstable();
        gone.dedup();

        gone.into_iter()
            .fold(manifest.clone(), |current, id| current.without_document(id))
    }

    /// Pair manifest pages with their documents' display names.
    pub fn summarize(&self, manifest: &PageManifest) -> Vec<PageSummary> {
        manifest.summaries(|id| self.registry.get(id).ok().map(|doc| doc.original_name))
    }

    pub fn planner(&self) -> MergePlanner<'_> {
        MergePlanner::new(&self.registry).with_default_output_name(&self.config.default_output_name)
    }

    pub fn engine(&self) -> AssemblyEngine<'_> {
        AssemblyEngine::new(&self.registry, &self.artifacts)
    }

    /// Plan and assemble a client merge request.
    pub fn merge(&self, request: &MergeRequest) -> Result<AssemblyResult> {
        let plan = self.planner().plan_request(request)?;
        self.engine().assemble(plan)
    }

    /// Plan and assemble the enabled pages of a manifest.
    pub fn merge_manifest(
        &self,
        manifest: &PageManifest,
        output_name: Option<&str>,
        options: &AssemblyOptions<'_>,
    ) -> Result<AssemblyResult> {
        let plan = self.planner().plan(manifest, output_name)?;
        let mut job = AssemblyJob::new(plan);
        self.engine().run(&mut job, options)
    }

    /// Run the page detector over one document.
    ///
    /// Reading and parsing the document runs on the blocking pool.
    pub async fn detect(&self, id: &DocumentId) -> Result<Vec<Detection>> {
        let document = self.registry.get(id)?;
        let registry = Arc::clone(&self.registry);
        let load_id = id.clone();
        let pdf = tokio::task::spawn_blocking(move || registry.load(&load_id))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;
        debug!("Running {} detector on {}", self.detector.name(), id);
        self.detector.detect(&document, &pdf).await
    }

    pub fn cleanup<S: AsRef<str>>(&self, ids: &[S]) -> CleanupReport {
        cleanup::cleanup(&self.registry, &self.artifacts, ids)
    }

    pub fn sweep(&self) -> SweepReport {
        cleanup::sweep(
            &self.registry,
            &self.artifacts,
            self.config.retention.document_max_age(),
        )
    }
}

/// Whether an upload is worth parsing: `.pdf` name or PDF header.
pub fn looks_like_pdf(name: &str, content: &[u8]) -> bool {
    let has_pdf_ext = std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    has_pdf_ext || content.starts_with(b"%PDF")
}
