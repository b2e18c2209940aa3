mod compose;
mod document;
mod page_index;

pub use compose::{ImportedSource, OutputDocument};
pub use document::{DocumentMetadata, PdfDocument};
pub use page_index::PageIndex;
