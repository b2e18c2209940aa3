//! The ordered list of pages a user is arranging.
//!
//! A [`PageManifest`] is a value: every mutator borrows the current manifest
//! and returns a new one, leaving persistence and broadcast to the caller.
//! Order is the order the user sees and is only reset by [`PageManifest::build`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::detect::Detection;
use crate::error::{Error, Result};
use crate::registry::SourceDocument;
use crate::storage::DocumentId;

/// Page rotation, always one of the four quarter turns.
///
/// Deserializes from any multiple of 90 (negative values included) and
/// normalizes it; anything else is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn from_degrees(degrees: i64) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(Error::InvalidRequest(format!(
                "rotation must be a multiple of 90 degrees, got {degrees}"
            )));
        }
        Ok(match degrees.rem_euclid(360) {
            90 => Self::R90,
            180 => Self::R180,
            270 => Self::R270,
            _ => Self::R0,
        })
    }

    pub const fn degrees(self) -> u16 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }

    /// One clockwise quarter turn.
    #[must_use]
    pub const fn quarter_turn(self) -> Self {
        match self {
            Self::R0 => Self::R90,
            Self::R90 => Self::R180,
            Self::R180 => Self::R270,
            Self::R270 => Self::R0,
        }
    }

    /// Additive composition modulo 360.
    #[must_use]
    pub const fn compose(self, other: Self) -> Self {
        let mut result = self;
        let mut turns = other.degrees() / 90;
        while turns > 0 {
            result = result.quarter_turn();
            turns -= 1;
        }
        result
    }
}

impl TryFrom<i64> for Rotation {
    type Error = Error;

    fn try_from(degrees: i64) -> Result<Self> {
        Self::from_degrees(degrees)
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Advisory tag set by a detector. Never affects assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFlag {
    Blank,
    Black,
}

/// Manifest-unique page identifier, derived from document id and page number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn derive(document_id: &DocumentId, page_number: usize) -> Self {
        Self(format!("{document_id}-page-{page_number}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page drawn from a source document, with its presentation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRef {
    pub page_id: PageId,
    pub source_document_id: DocumentId,
    /// 1-based
    pub page_number: usize,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub flags: BTreeSet<PageFlag>,
}

const fn default_enabled() -> bool {
    true
}

impl PageRef {
    fn new(document_id: &DocumentId, page_number: usize) -> Self {
        Self {
            page_id: PageId::derive(document_id, page_number),
            source_document_id: document_id.clone(),
            page_number,
            rotation: Rotation::R0,
            enabled: true,
            flags: BTreeSet::new(),
        }
    }
}

/// A page as presented to the UI: the page plus its document's display name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    #[serde(flatten)]
    pub page: PageRef,
    pub original_name: String,
}

/// The ordered set of pages being edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawManifest")]
pub struct PageManifest {
    pages: Vec<PageRef>,
}

/// Unvalidated wire form of a manifest.
#[derive(Deserialize)]
struct RawManifest {
    pages: Vec<PageRef>,
}

impl TryFrom<RawManifest> for PageManifest {
    type Error = Error;

    fn try_from(raw: RawManifest) -> Result<Self> {
        Self::from_pages(raw.pages)
    }
}

impl PageManifest {
    /// Expand every document into its full page range, in document order.
    pub fn build(documents: &[SourceDocument]) -> Self {
        let pages = documents
            .iter()
            .flat_map(|doc| (1..=doc.page_count).map(move |n| PageRef::new(&doc.id, n)))
            .collect();
        Self { pages }
    }

    /// Accept pages from outside (e.g. a client round-trip), checking that
    /// ids are unique, consistent with their source, and 1-based.
    pub fn from_pages(pages: Vec<PageRef>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(pages.len());
        for page in &pages {
            if page.page_number == 0 {
                return Err(Error::InconsistentManifest(format!(
                    "page {} has page number 0",
                    page.page_id
                )));
            }
            if page.page_id != PageId::derive(&page.source_document_id, page.page_number) {
                return Err(Error::InconsistentManifest(format!(
                    "page id {} does not match its source",
                    page.page_id
                )));
            }
            if !seen.insert(&page.page_id) {
                return Err(Error::InconsistentManifest(format!(
                    "duplicate page id {}",
                    page.page_id
                )));
            }
        }
        Ok(Self { pages })
    }

    pub fn pages(&self) -> &[PageRef] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, page_id: &PageId) -> Option<&PageRef> {
        self.pages.iter().find(|p| &p.page_id == page_id)
    }

    /// Enabled pages, in manifest order.
    pub fn enabled_pages(&self) -> impl Iterator<Item = &PageRef> {
        self.pages.iter().filter(|p| p.enabled)
    }

    /// Rearrange pages. `order` must be a permutation of the current ids.
    pub fn reorder(&self, order: &[PageId]) -> Result<Self> {
        if order.len() != self.pages.len() {
            return Err(Error::InconsistentManifest(format!(
                "order lists {} pages but the manifest has {}",
                order.len(),
                self.pages.len()
            )));
        }

        let mut by_id: HashMap<&PageId, &PageRef> =
            self.pages.iter().map(|p| (&p.page_id, p)).collect();

        let mut pages = Vec::with_capacity(order.len());
        for page_id in order {
            let page = by_id.remove(page_id).ok_or_else(|| {
                Error::InconsistentManifest(format!("unknown or repeated page id {page_id}"))
            })?;
            pages.push(page.clone());
        }
        Ok(Self { pages })
    }

    /// Flip `enabled` on one page.
    pub fn toggle(&self, page_id: &PageId) -> Result<Self> {
        self.update(page_id, |page| page.enabled = !page.enabled)
    }

    /// Add a clockwise quarter turn to one page.
    pub fn rotate(&self, page_id: &PageId) -> Result<Self> {
        self.update(page_id, |page| page.rotation = page.rotation.quarter_turn())
    }

    /// Drop one page, keeping the relative order of the rest.
    pub fn remove(&self, page_id: &PageId) -> Result<Self> {
        self.position(page_id)?;
        let pages = self
            .pages
            .iter()
            .filter(|p| &p.page_id != page_id)
            .cloned()
            .collect();
        Ok(Self { pages })
    }

    /// Set advisory flags from detector output. Unmatched detections are ignored.
    #[must_use]
    pub fn apply_detection_flags(&self, detections: &[Detection]) -> Self {
        let mut pages = self.pages.clone();
        for detection in detections {
            let target = PageId::derive(&detection.source_document_id, detection.page_number);
            if let Some(page) = pages.iter_mut().find(|p| p.page_id == target) {
                page.flags.insert(detection.kind);
            }
        }
        Self { pages }
    }

    /// Drop every page drawn from `document_id`.
    #[must_use]
    pub fn without_document(&self, document_id: &DocumentId) -> Self {
        let pages = self
            .pages
            .iter()
            .filter(|p| &p.source_document_id != document_id)
            .cloned()
            .collect();
        Self { pages }
    }

    /// Pair each page with its document's display name.
    ///
    /// `name_of` returns `None` for documents that are gone; such pages are
    /// labelled with their document id.
    pub fn summaries<F>(&self, name_of: F) -> Vec<PageSummary>
    where
        F: Fn(&DocumentId) -> Option<String>,
    {
        self.pages
            .iter()
            .map(|page| PageSummary {
                original_name: name_of(&page.source_document_id)
                    .unwrap_or_else(|| page.source_document_id.to_string()),
                page: page.clone(),
            })
            .collect()
    }

    fn position(&self, page_id: &PageId) -> Result<usize> {
        self.pages
            .iter()
            .position(|p| &p.page_id == page_id)
            .ok_or_else(|| Error::InconsistentManifest(format!("unknown page id {page_id}")))
    }

    fn update<F>(&self, page_id: &PageId, mutate: F) -> Result<Self>
    where
        F: FnOnce(&mut PageRef),
    {
        let index = self.position(page_id)?;
        let mut pages = self.pages.clone();
        mutate(&mut pages[index]);
        Ok(Self { pages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn source(id: &str, page_count: usize) -> SourceDocument {
        SourceDocument {
            id: DocumentId::parse(id).unwrap(),
            original_name: format!("{id}.pdf"),
            page_count,
            size_bytes: 1024,
            title: None,
            content_hash: String::new(),
            uploaded_at: Utc::now(),
        }
    }

    fn manifest() -> PageManifest {
        PageManifest::build(&[source("a", 3), source("b", 2)])
    }

    fn ids(m: &PageManifest) -> Vec<&str> {
        m.pages().iter().map(|p| p.page_id.as_str()).collect()
    }

    #[test]
    fn test_build_expands_in_document_order() {
        let m = manifest();
        assert_eq!(
            ids(&m),
            vec!["a-page-1", "a-page-2", "a-page-3", "b-page-1", "b-page-2"]
        );
        assert!(m.pages().iter().all(|p| p.enabled && p.rotation == Rotation::R0 && p.flags.is_empty()));
    }

    #[test]
    fn test_build_is_idempotent() {
        assert_eq!(manifest(), manifest());
    }

    #[test]
    fn test_build_skips_empty_documents() {
        let m = PageManifest::build(&[source("empty", 0), source("b", 1)]);
        assert_eq!(ids(&m), vec!["b-page-1"]);
    }

    #[test]
    fn test_reorder_preserves_pages() {
        let m = manifest();
        let order: Vec<PageId> = ["b-page-2", "a-page-1", "b-page-1", "a-page-3", "a-page-2"]
            .into_iter()
            .map(PageId::from)
            .collect();
        let reordered = m.reorder(&order).unwrap();

        assert_eq!(
            ids(&reordered),
            vec!["b-page-2", "a-page-1", "b-page-1", "a-page-3", "a-page-2"]
        );
        let before: HashSet<_> = m.pages().iter().map(|p| p.page_id.clone()).collect();
        let after: HashSet<_> = reordered.pages().iter().map(|p| p.page_id.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_reorder_rejects_non_bijection() {
        let m = manifest();
        let short: Vec<PageId> = ["a-page-1"].into_iter().map(PageId::from).collect();
        assert!(matches!(m.reorder(&short), Err(Error::InconsistentManifest(_))));

        let repeated: Vec<PageId> = ["a-page-1", "a-page-1", "a-page-3", "b-page-1", "b-page-2"]
            .into_iter()
            .map(PageId::from)
            .collect();
        assert!(matches!(m.reorder(&repeated), Err(Error::InconsistentManifest(_))));

        let unknown: Vec<PageId> = ["a-page-1", "a-page-2", "a-page-3", "b-page-1", "z-page-9"]
            .into_iter()
            .map(PageId::from)
            .collect();
        assert!(matches!(m.reorder(&unknown), Err(Error::InconsistentManifest(_))));
    }

    #[test]
    fn test_toggle_twice_restores() {
        let m = manifest();
        let id = PageId::from("a-page-2");
        let once = m.toggle(&id).unwrap();
        assert!(!once.get(&id).unwrap().enabled);
        assert_eq!(once.enabled_pages().count(), 4);

        let twice = once.toggle(&id).unwrap();
        assert_eq!(twice, m);
    }

    #[test]
    fn test_rotate_is_cyclic() {
        let m = manifest();
        let id = PageId::from("b-page-1");
        let mut current = m.clone();
        let mut seen = Vec::new();
        for _ in 0..4 {
            current = current.rotate(&id).unwrap();
            seen.push(current.get(&id).unwrap().rotation.degrees());
        }
        assert_eq!(seen, vec![90, 180, 270, 0]);
        assert_eq!(current, m);
    }

    #[test]
    fn test_mutators_do_not_touch_original() {
        let m = manifest();
        let _ = m.rotate(&PageId::from("a-page-1")).unwrap();
        let _ = m.toggle(&PageId::from("a-page-1")).unwrap();
        assert_eq!(m, manifest());
    }

    #[test]
    fn test_order_survives_mutations() {
        let order: Vec<PageId> = ["b-page-1", "a-page-1", "a-page-2", "a-page-3", "b-page-2"]
            .into_iter()
            .map(PageId::from)
            .collect();
        let m = manifest()
            .reorder(&order)
            .unwrap()
            .rotate(&PageId::from("a-page-1"))
            .unwrap()
            .toggle(&PageId::from("b-page-2"))
            .unwrap();
        assert_eq!(
            ids(&m),
            vec!["b-page-1", "a-page-1", "a-page-2", "a-page-3", "b-page-2"]
        );
    }

    #[test]
    fn test_remove_keeps_relative_order() {
        let m = manifest().remove(&PageId::from("a-page-2")).unwrap();
        assert_eq!(ids(&m), vec!["a-page-1", "a-page-3", "b-page-1", "b-page-2"]);
    }

    #[test]
    fn test_unknown_page_id_is_inconsistent() {
        let m = manifest();
        let ghost = PageId::from("ghost-page-1");
        assert!(matches!(m.toggle(&ghost), Err(Error::InconsistentManifest(_))));
        assert!(matches!(m.rotate(&ghost), Err(Error::InconsistentManifest(_))));
        assert!(matches!(m.remove(&ghost), Err(Error::InconsistentManifest(_))));
    }

    #[test]
    fn test_detection_flags() {
        let m = manifest();
        let detections = vec![
            Detection::new(DocumentId::parse("a").unwrap(), 2, PageFlag::Blank),
            Detection::new(DocumentId::parse("b").unwrap(), 1, PageFlag::Black),
            Detection::new(DocumentId::parse("b").unwrap(), 99, PageFlag::Blank),
            Detection::new(DocumentId::parse("zzz").unwrap(), 1, PageFlag::Blank),
        ];
        let flagged = m.apply_detection_flags(&detections);

        let flags = |id: &str| flagged.get(&PageId::from(id)).unwrap().flags.clone();
        assert_eq!(flags("a-page-2"), BTreeSet::from([PageFlag::Blank]));
        assert_eq!(flags("b-page-1"), BTreeSet::from([PageFlag::Black]));
        assert!(flags("a-page-1").is_empty());
        assert_eq!(flagged.enabled_pages().count(), m.len());
    }

    #[test]
    fn test_without_document() {
        let m = manifest().without_document(&DocumentId::parse("a").unwrap());
        assert_eq!(ids(&m), vec!["b-page-1", "b-page-2"]);
    }

    #[test]
    fn test_rotation_parsing() {
        assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::R270);
        assert_eq!(Rotation::from_degrees(450).unwrap(), Rotation::R90);
        assert!(Rotation::from_degrees(45).is_err());
        assert_eq!(Rotation::R270.compose(Rotation::R180), Rotation::R90);
    }

    #[test]
    fn test_manifest_deserialization_validates() {
        let json = r#"{"pages":[
            {"pageId":"a-page-1","sourceDocumentId":"a","pageNumber":1,"rotation":90,"enabled":true,"flags":["blank"]},
            {"pageId":"a-page-2","sourceDocumentId":"a","pageNumber":2,"originalName":"ignored.pdf"}
        ]}"#;
        let m: PageManifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.pages()[0].rotation, Rotation::R90);
        assert!(m.pages()[1].enabled);

        let dup = r#"{"pages":[
            {"pageId":"a-page-1","sourceDocumentId":"a","pageNumber":1},
            {"pageId":"a-page-1","sourceDocumentId":"a","pageNumber":1}
        ]}"#;
        assert!(serde_json::from_str::<PageManifest>(dup).is_err());

        let bad_rotation = r#"{"pages":[
            {"pageId":"a-page-1","sourceDocumentId":"a","pageNumber":1,"rotation":45}
        ]}"#;
        assert!(serde_json::from_str::<PageManifest>(bad_rotation).is_err());
    }

    #[test]
    fn test_summary_serializes_flat() {
        let m = manifest();
        let summaries = m.summaries(|id| Some(format!("{id}.pdf")));
        let value = serde_json::to_value(&summaries[0]).unwrap();
        assert_eq!(value["pageId"], "a-page-1");
        assert_eq!(value["originalName"], "a.pdf");
        assert_eq!(value["rotation"], 0);
    }
}
