use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Longest key accepted as a file name on common filesystems
const MAX_KEY_LEN: usize = 255;

/// Check that `key` names a single entry directly inside a storage root.
///
/// Rejects anything that could be interpreted as a path: separators, drive
/// prefixes, dot entries, hidden names and control characters. Every failure
/// is `AccessDenied` since such a key can never name a stored entity.
pub fn validate_key(key: &str) -> Result<()> {
    let denied = |why: &str| Err(Error::AccessDenied(format!("identifier {why}")));

    if key.is_empty() {
        return denied("is empty");
    }
    if key.len() > MAX_KEY_LEN {
        return denied("is too long");
    }
    if key.starts_with('.') || key.contains("..") {
        return denied("contains a dot segment");
    }
    if key.chars().any(|c| matches!(c, '/' | '\\' | ':') || c.is_control()) {
        return denied("contains a path separator or control character");
    }
    Ok(())
}

/// Identifier of a registered source document; doubles as its storage key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Validate an identifier received from outside the crate.
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_key(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a generated output artifact; doubles as its storage key.
///
/// Shaped `<uuid>-<file name>` so the download name can be recovered from it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Generate an identifier for an artifact with the given (sanitized) name.
    pub fn generate(file_name: &str) -> Result<Self> {
        Self::parse(format!("{}-{file_name}", uuid::Uuid::new_v4().simple()))
    }

    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_key(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name to present when downloading, i.e. the part after the uuid.
    pub fn file_name(&self) -> &str {
        self.0
            .split_once('-')
            .map(|(_, name)| name)
            .filter(|name| !name.is_empty())
            .unwrap_or(crate::config::DEFAULT_OUTPUT_NAME)
    }
}

macro_rules! impl_key_conversions {
    ($ty:ident) => {
        impl TryFrom<String> for $ty {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::parse(value)
            }
        }

        impl From<$ty> for String {
            fn from(id: $ty) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

impl_key_conversions!(DocumentId);
impl_key_conversions!(ArtifactId);
