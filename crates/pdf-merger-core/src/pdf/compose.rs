//! Page-level composition of a new PDF from pages of other PDFs.
//!
//! # Object Import
//!
//! Each source is imported once per output: its objects are renumbered past
//! the output's current `max_id`, then every object except the page tree,
//! catalog and outlines is moved into the output. The source keeps its page
//! dictionaries so individual pages can be copied on demand.
//!
//! # Page Copies
//!
//! A copied page gets the output's single `Pages` node as parent. Because the
//! source's intermediate `Pages` nodes are dropped, inheritable attributes
//! (`Resources`, `MediaBox`, `CropBox`) are resolved from the source tree and
//! written onto the copy. `Rotate` is always overwritten with the requested
//! absolute angle.
//!
//! The first copy of a source page keeps its renumbered object id; further
//! copies of the same page get fresh ids so their rotations stay independent.

use std::collections::{BTreeMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::document::PdfDocument;
use super::page_index::PageIndex;
use crate::error::{Error, Result};
use crate::manifest::Rotation;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 3] = [b"Resources", b"MediaBox", b"CropBox"];

/// Page tree depth past which the parent chain is assumed to be cyclic.
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when a page has no MediaBox anywhere in its tree.
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

/// A source document whose shared objects already live in an output.
pub struct ImportedSource {
    /// Renumbered source, holding only its page tree
    document: Document,
    /// 1-based page number to renumbered page object id
    pages: BTreeMap<u32, ObjectId>,
    /// Page objects already placed in the output under their own id
    placed: HashSet<ObjectId>,
}

impl ImportedSource {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// A merged document under construction.
pub struct OutputDocument {
    document: Document,
    /// Reserved id of the single `Pages` node
    pages_id: ObjectId,
    /// Page object ids in output order
    kids: Vec<ObjectId>,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Move the shared objects of `source` into this output.
    pub fn import(&mut self, source: &PdfDocument) -> Result<ImportedSource> {
        let mut doc = source.open_document()?;

        doc.renumber_objects_with(self.document.max_id + 1);
        self.document.max_id = self.document.max_id.max(doc.max_id);

        let pages = doc.get_pages();

        let objects = std::mem::take(&mut doc.objects);
        let mut moved = 0usize;
        for (object_id, object) in objects {
            match object.type_name().unwrap_or(b"") {
                b"Page" | b"Pages" => {
                    doc.objects.insert(object_id, object);
                }
                b"Catalog" | b"Outlines" | b"Outline" => {}
                _ => {
                    self.document.objects.insert(object_id, object);
                    moved += 1;
                }
            }
        }
        debug!("Imported {} shared objects ({} pages)", moved, pages.len());

        Ok(ImportedSource {
            document: doc,
            pages,
            placed: HashSet::new(),
        })
    }

    /// Append a copy of page `index` of `source`, rotated to `rotation`.
    pub fn append_page(
        &mut self,
        source: &mut ImportedSource,
        index: PageIndex,
        rotation: Rotation,
    ) -> Result<()> {
        let page_id = Some(index)
            .filter(|index| index.is_within(source.page_count()))
            .and_then(PageIndex::as_lopdf_page_number)
            .and_then(|number| source.pages.get(&number).copied())
            .ok_or_else(|| {
                Error::AssemblyFailed(format!(
                    "page {} out of range (document has {} pages)",
                    index.page_number(),
                    source.page_count()
                ))
            })?;

        let mut page = source
            .document
            .get_dictionary(page_id)
            .map_err(|e| Error::AssemblyFailed(format!("unreadable page object: {e}")))?
            .clone();

        inherit_attributes(&source.document, &mut page);
        if !page.has(b"MediaBox") {
            page.set(
                "MediaBox",
                Object::Array(DEFAULT_MEDIA_BOX.iter().copied().map(Object::Integer).collect()),
            );
        }
        page.set("Parent", Object::Reference(self.pages_id));
        page.set("Rotate", Object::Integer(i64::from(rotation.degrees())));

        let target_id = if source.placed.insert(page_id) {
            page_id
        } else {
            self.document.new_object_id()
        };
        self.document.objects.insert(target_id, Object::Dictionary(page));
        self.kids.push(target_id);
        Ok(())
    }

    /// Build the page tree and catalog, then serialize.
    pub fn finish(mut self, title: &str) -> Result<Vec<u8>> {
        if self.kids.is_empty() {
            return Err(Error::AssemblyFailed("no pages to write".to_string()));
        }

        let count = i64::try_from(self.kids.len())
            .map_err(|_| Error::AssemblyFailed("too many pages".to_string()))?;
        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();

        let pages_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ]);
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.document.trailer.set("Root", Object::Reference(catalog_id));

        let info_id = self.document.add_object(Dictionary::from_iter([
            ("Producer", Object::string_literal("pdf-merger")),
            ("Title", Object::string_literal(title)),
        ]));
        self.document.trailer.set("Info", Object::Reference(info_id));

        let pruned = self.document.prune_objects();
        debug!("Pruned {} unreferenced objects", pruned.len());

        self.document.compress();

        let mut buffer = Vec::new();
        self.document
            .save_to(&mut buffer)
            .map_err(|e| Error::AssemblyFailed(format!("failed to serialize output: {e}")))?;
        Ok(buffer)
    }
}

/// Copy inheritable attributes missing on `page` from its nearest ancestor.
fn inherit_attributes(source: &Document, page: &mut Dictionary) {
    let first_parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for key in INHERITABLE {
        if page.has(key) {
            continue;
        }

        let mut parent = first_parent;
        let mut depth = 0;
        while let Some(parent_id) = parent
            && depth < MAX_TREE_DEPTH
        {
            let Ok(node) = source.get_dictionary(parent_id) else {
                break;
            };
            if let Ok(value) = node.get(key) {
                page.set(key, value.clone());
                break;
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            depth += 1;
        }
    }
}
