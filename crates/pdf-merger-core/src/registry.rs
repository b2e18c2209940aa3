//! Registry of uploaded source documents.
//!
//! Binaries live in a [`StorageDir`]; the registry keeps the metadata index
//! in memory. Registration fully parses the upload so that anything admitted
//! here is known to be a paginated PDF.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pdf::PdfDocument;
use crate::storage::{DocumentId, StorageDir};
use crate::util::size_kb;

/// An uploaded, parsed and stored PDF.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub id: DocumentId,
    /// Name as uploaded; display only, never used to build paths
    pub original_name: String,
    pub page_count: usize,
    pub size_bytes: u64,
    pub title: Option<String>,
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
}

/// What the UI needs to know about an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub original_name: String,
    pub page_count: usize,
    #[serde(rename = "fileSizeKB")]
    pub file_size_kb: u64,
    /// Title from the document's Info dictionary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SourceDocument {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            original_name: self.original_name.clone(),
            page_count: self.page_count,
            file_size_kb: size_kb(self.size_bytes),
            title: self.title.clone(),
        }
    }
}

/// Index of registered documents over their backing storage.
#[derive(Debug)]
pub struct DocumentRegistry {
    storage: StorageDir,
    documents: RwLock<HashMap<DocumentId, SourceDocument>>,
}

impl DocumentRegistry {
    /// Open the registry rooted at `root`.
    ///
    /// Binaries left over from a previous run are re-inspected and indexed
    /// under their id; unreadable ones are deleted.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let storage = StorageDir::open(root)?;
        let mut documents = HashMap::new();

        for key in storage.keys()? {
            let Ok(id) = DocumentId::parse(key.as_str()) else {
                continue;
            };
            let bytes = storage.read(&key)?;
            let size_bytes = bytes.len() as u64;
            match PdfDocument::from_bytes(&key, bytes) {
                Ok(pdf) => {
                    let doc = describe(id.clone(), key.clone(), &pdf, size_bytes);
                    documents.insert(id, doc);
                }
                Err(e) => {
                    warn!("Discarding unreadable stored document {}: {}", key, e);
                    storage.remove(&key)?;
                }
            }
        }

        if !documents.is_empty() {
            info!("Recovered {} stored documents", documents.len());
        }

        Ok(Self {
            storage,
            documents: RwLock::new(documents),
        })
    }

    pub fn storage(&self) -> &StorageDir {
        &self.storage
    }

    /// Validate, store and index an upload.
    ///
    /// Nothing is stored when the binary does not parse.
    pub fn register(&self, original_name: &str, content: Vec<u8>) -> Result<SourceDocument> {
        let pdf = PdfDocument::from_bytes(original_name, content)?;

        let id = DocumentId::generate();
        let size_bytes = self.storage.write(id.as_str(), pdf.bytes())?;
        let doc = describe(id.clone(), original_name.to_string(), &pdf, size_bytes);

        info!(
            "Registered {} as {} ({} pages, {} KB)",
            original_name,
            id,
            doc.page_count,
            size_kb(size_bytes)
        );

        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, doc.clone());
        Ok(doc)
    }

    pub fn get(&self, id: &DocumentId) -> Result<SourceDocument> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("document {id}")))
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// All registered documents, oldest first.
    pub fn list(&self) -> Vec<SourceDocument> {
        let mut docs: Vec<SourceDocument> = self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
        docs
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of a registered document.
    pub fn read_content(&self, id: &DocumentId) -> Result<Vec<u8>> {
        let doc = self.get(id)?;
        self.storage.read(doc.id.as_str())
    }

    /// Reparse a registered document for page extraction.
    pub fn load(&self, id: &DocumentId) -> Result<PdfDocument> {
        let doc = self.get(id)?;
        let bytes = self.storage.read(doc.id.as_str())?;
        PdfDocument::from_bytes(&doc.original_name, bytes)
    }

    /// Forget a document and delete its binary. Removing twice is harmless.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, id: &DocumentId) -> Result<bool> {
        let indexed = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        let stored = self.storage.remove(id.as_str())?;

        if indexed || stored {
            debug!("Removed document {}", id);
        }
        Ok(indexed || stored)
    }

    /// Remove every document uploaded more than `max_age` ago.
    pub fn sweep_older_than(&self, max_age: Duration) -> Vec<DocumentId> {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return Vec::new();
        };
        let cutoff = Utc::now() - max_age;

        let stale: Vec<DocumentId> = self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|doc| doc.uploaded_at < cutoff)
            .map(|doc| doc.id.clone())
            .collect();

        let mut removed = Vec::with_capacity(stale.len());
        for id in stale {
            match self.remove(&id) {
                Ok(_) => removed.push(id),
                Err(e) => warn!("Failed to sweep document {}: {}", id, e),
            }
        }
        if !removed.is_empty() {
            info!("Swept {} stale documents", removed.len());
        }
        removed
    }
}

fn describe(id: DocumentId, original_name: String, pdf: &PdfDocument, size_bytes: u64) -> SourceDocument {
    SourceDocument {
        id,
        original_name,
        page_count: pdf.page_count(),
        size_bytes,
        title: pdf.metadata().title.clone(),
        content_hash: pdf.content_hash().to_string(),
        uploaded_at: Utc::now(),
    }
}
