//! Page index newtype for safe conversion between the two page conventions.
//!
//! Users and the manifest count pages from 1; plans and the assembly engine
//! address pages by zero-based index; lopdf's page map is keyed by 1-based
//! `u32`. This wrapper centralizes the conversions in one place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A zero-based page index into a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageIndex(usize);

impl PageIndex {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Convert a 1-based page number.
    pub fn from_page_number(page_number: usize) -> Result<Self> {
        page_number
            .checked_sub(1)
            .map(Self)
            .ok_or_else(|| Error::InvalidRequest("page numbers start at 1".to_string()))
    }

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// The 1-based page number shown to users.
    #[must_use]
    pub const fn page_number(self) -> usize {
        self.0 + 1
    }

    /// The key used by lopdf's `get_pages()` map, if it fits in a `u32`.
    #[must_use]
    pub fn as_lopdf_page_number(self) -> Option<u32> {
        u32::try_from(self.0).ok()?.checked_add(1)
    }

    /// Whether this index addresses a page of a document with `total` pages.
    #[must_use]
    pub const fn is_within(self, total: usize) -> bool {
        self.0 < total
    }
}

impl From<PageIndex> for usize {
    fn from(index: PageIndex) -> Self {
        index.0
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
