use serde::Serialize;
use thiserror::Error;

/// Unified error type for pdf-merger-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Registration of uploaded documents (unparsable binaries)
/// - Lookups of documents and artifacts by identifier
/// - Manifest mutations against stale page ids
/// - Planning and assembling merged documents
/// - Storage boundary violations
/// - Configuration loading and general I/O
///
/// Display strings are shown to clients, so no variant carries a storage path.
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Registry Errors
    // ==========================================================================
    /// Uploaded binary could not be parsed as a paginated PDF
    #[error("invalid PDF '{name}': {reason}")]
    InvalidDocument { name: String, reason: String },

    /// Referenced identifier has no backing document or artifact
    #[error("{0} not found")]
    NotFound(String),

    /// Identifier resolves outside the permitted storage root
    #[error("access denied: {0}")]
    AccessDenied(String),

    // ==========================================================================
    // Manifest / Planning Errors
    // ==========================================================================
    /// Reorder or mutation referenced a stale or unknown page id
    #[error("inconsistent manifest: {0}")]
    InconsistentManifest(String),

    /// Merge attempted with zero enabled pages
    #[error("no pages selected for merging")]
    EmptySelection,

    /// Plan references a source document that no longer exists
    #[error("source document {0} no longer exists")]
    DanglingReference(String),

    /// Request body failed schema validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // ==========================================================================
    // Assembly Errors
    // ==========================================================================
    /// Any per-page extraction or transform error during assembly
    #[error("assembly failed: {0}")]
    AssemblyFailed(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Machine-distinguishable error kind reported at the external boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidDocument,
    NotFound,
    InconsistentManifest,
    EmptySelection,
    DanglingReference,
    AssemblyFailed,
    AccessDenied,
    InvalidRequest,
    Internal,
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDocument { .. } => ErrorKind::InvalidDocument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::InconsistentManifest(_) => ErrorKind::InconsistentManifest,
            Self::EmptySelection => ErrorKind::EmptySelection,
            Self::DanglingReference(_) => ErrorKind::DanglingReference,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::AssemblyFailed(_) => ErrorKind::AssemblyFailed,
            Self::ConfigLoad(_) | Self::ConfigInvalid { .. } | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable detail safe to hand to a client.
    ///
    /// Internal failures collapse to a generic message; everything else uses
    /// the display string.
    pub fn detail(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidDocument => "InvalidDocument",
            Self::NotFound => "NotFound",
            Self::InconsistentManifest => "InconsistentManifest",
            Self::EmptySelection => "EmptySelection",
            Self::DanglingReference => "DanglingReference",
            Self::AssemblyFailed => "AssemblyFailed",
            Self::AccessDenied => "AccessDenied",
            Self::InvalidRequest => "InvalidRequest",
            Self::Internal => "Internal",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
