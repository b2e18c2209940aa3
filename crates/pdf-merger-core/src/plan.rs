//! Turning a manifest (or a merge request) into an executable plan.
//!
//! Planning is pure validation: it checks that something is selected and that
//! every referenced document is still registered, and converts 1-based page
//! numbers to zero-based indices. Page ranges are only checked at assembly,
//! where the source is actually opened.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_OUTPUT_NAME;
use crate::error::{Error, Result};
use crate::manifest::{PageManifest, Rotation};
use crate::pdf::PageIndex;
use crate::registry::DocumentRegistry;
use crate::storage::DocumentId;
use crate::util::sanitize_file_name;

/// One page of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub document_id: DocumentId,
    pub page_index: PageIndex,
    /// Absolute rotation of the output page
    pub rotation: Rotation,
}

/// Ordered, immutable description of an output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    output_name: String,
    entries: Vec<PlanEntry>,
}

impl MergePlan {
    /// Build a plan directly. The output name is sanitized.
    pub fn new(output_name: &str, entries: Vec<PlanEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::EmptySelection);
        }
        Ok(Self {
            output_name: sanitize_file_name(output_name, DEFAULT_OUTPUT_NAME),
            entries,
        })
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A page in a client merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MergePageRequest {
    pub source_document_id: DocumentId,
    /// 1-based
    pub page_number: usize,
    #[serde(default)]
    pub rotation: Rotation,
}

/// Body of a merge request: the enabled pages in output order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MergeRequest {
    pub pages: Vec<MergePageRequest>,
    #[serde(default)]
    pub output_name: Option<String>,
}

/// Builds plans against the live registry.
pub struct MergePlanner<'a> {
    registry: &'a DocumentRegistry,
    default_output_name: &'a str,
}

impl<'a> MergePlanner<'a> {
    pub const fn new(registry: &'a DocumentRegistry) -> Self {
        Self {
            registry,
            default_output_name: DEFAULT_OUTPUT_NAME,
        }
    }

    #[must_use]
    pub const fn with_default_output_name(mut self, name: &'a str) -> Self {
        self.default_output_name = name;
        self
    }

    /// Plan the enabled pages of `manifest`, in manifest order.
    pub fn plan(&self, manifest: &PageManifest, output_name: Option<&str>) -> Result<MergePlan> {
        let entries = manifest
            .enabled_pages()
            .map(|page| self.entry(&page.source_document_id, page.page_number, page.rotation))
            .collect::<Result<Vec<_>>>()?;
        self.finish(entries, output_name)
    }

    /// Plan an explicit client request.
    pub fn plan_request(&self, request: &MergeRequest) -> Result<MergePlan> {
        let entries = request
            .pages
            .iter()
            .map(|page| self.entry(&page.source_document_id, page.page_number, page.rotation))
            .collect::<Result<Vec<_>>>()?;
        self.finish(entries, request.output_name.as_deref())
    }

    fn entry(&self, document_id: &DocumentId, page_number: usize, rotation: Rotation) -> Result<PlanEntry> {
        if !self.registry.contains(document_id) {
            return Err(Error::DanglingReference(document_id.to_string()));
        }
        Ok(PlanEntry {
            document_id: document_id.clone(),
            page_index: PageIndex::from_page_number(page_number)?,
            rotation,
        })
    }

    fn finish(&self, entries: Vec<PlanEntry>, output_name: Option<&str>) -> Result<MergePlan> {
        let name = output_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.default_output_name);
        MergePlan::new(name, entries)
    }
}
