use lopdf::{Document as LoDocument, Object};

use crate::error::{Error, Result};

/// A parsed, page-addressable PDF kept as its raw bytes
pub struct PdfDocument {
    /// The raw PDF bytes (reparsed whenever pages are imported)
    bytes: Vec<u8>,
    /// Cached metadata
    metadata: DocumentMetadata,
    /// Number of pages
    page_count: usize,
    /// Content hash (MD5 hex), computed once on load
    content_hash: String,
}

/// Document metadata from the Info dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
}

impl PdfDocument {
    /// Parse a PDF from bytes.
    ///
    /// `name` is only used to label errors.
    pub fn from_bytes(name: &str, bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        let invalid = |reason: String| Error::InvalidDocument {
            name: name.to_string(),
            reason,
        };

        if !bytes.starts_with(b"%PDF") {
            return Err(invalid("missing %PDF header".to_string()));
        }

        let doc = LoDocument::load_mem(&bytes).map_err(|e| invalid(format!("failed to parse: {e}")))?;

        if doc.is_encrypted() {
            return Err(invalid("encrypted documents are not supported".to_string()));
        }

        let page_count = doc.get_pages().len();
        let metadata = read_metadata(&doc);
        let content_hash = format!("{:x}", md5::compute(&bytes));

        Ok(Self {
            bytes,
            metadata,
            page_count,
            content_hash,
        })
    }

    /// Get document metadata
    pub const fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    /// Get number of pages
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Get raw PDF bytes as a slice.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MD5 hash of the PDF bytes, computed once on load.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Parse a fresh, independently mutable lopdf handle.
    pub(crate) fn open_document(&self) -> Result<LoDocument> {
        LoDocument::load_mem(&self.bytes)
            .map_err(|e| Error::AssemblyFailed(format!("failed to reopen document: {e}")))
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count)
            .field("metadata", &self.metadata)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

fn read_metadata(doc: &LoDocument) -> DocumentMetadata {
    let Some(info) = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| match obj {
            Object::Reference(id) => doc.get_dictionary(*id).ok(),
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        })
    else {
        return DocumentMetadata::default();
    };

    let get_text = |key: &[u8]| -> Option<String> {
        info.get(key)
            .ok()
            .and_then(|obj| obj.as_str().ok())
            .map(decode_text_string)
            .filter(|s| !s.trim().is_empty())
    };

    DocumentMetadata {
        title: get_text(b"Title"),
    }
}

/// Decode a PDF text string: UTF-16BE when it carries a BOM, else Latin-1.
fn decode_text_string(raw: &[u8]) -> String {
    if let Some(utf16) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    raw.iter().map(|&b| char::from(b)).collect()
}
