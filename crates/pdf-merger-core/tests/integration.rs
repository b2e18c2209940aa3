//! Integration tests for pdf-merger-core
//!
//! These tests verify the end-to-end workflow:
//! - Upload registration and validation
//! - Manifest editing and merge planning
//! - Page-level assembly into a downloadable artifact
//! - Retention, cleanup and storage boundaries

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lopdf::{Dictionary, Document, Object, Stream};
use pdf_merger_core::{
    AppConfig, AssemblyOptions, Detection, DocumentId, Error, ErrorKind, MergePageRequest,
    MergeRequest, PageFlag, PageId, PageManifest, PdfDocument, PdfMerger, Result, Rotation,
    SourceDocument, UploadedFile,
    detect::{DetectorInfo, PageDetector},
};

// =============================================================================
// Mock Detector for Testing
// =============================================================================

/// A detector that flags every even page blank, counting its invocations.
struct MockDetector {
    calls: AtomicUsize,
}

impl MockDetector {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageDetector for MockDetector {
    fn info(&self) -> DetectorInfo {
        DetectorInfo {
            name: "mock",
        }
    }

    async fn detect(&self, document: &SourceDocument, pdf: &PdfDocument) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((1..=pdf.page_count())
            .filter(|n| n % 2 == 0)
            .map(|n| Detection::new(document.id.clone(), n, PageFlag::Blank))
            .collect())
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// Build a PDF whose page `n` draws the text `<label>-Page-<n>`.
fn build_pdf(label: &str, pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for n in 1..=pages {
        let content = format!("BT 72 720 Td ({label}-Page-{n}) Tj ET");
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            (
                "MediaBox",
                Object::Array([0, 0, 612, 792].into_iter().map(Object::Integer).collect()),
            ),
        ]));
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(i64::from(pages))),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture should serialize");
    bytes
}

/// A merger with storage in a fresh temporary directory
fn test_merger(detector: Arc<dyn PageDetector>) -> (tempfile::TempDir, PdfMerger) {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = AppConfig::default();
    config.storage.upload_dir = Some(dir.path().join("uploads"));
    config.storage.output_dir = Some(dir.path().join("outputs"));
    let merger = PdfMerger::with_detector(config, detector).expect("Should create merger");
    (dir, merger)
}

fn upload(merger: &PdfMerger, name: &str, bytes: Vec<u8>) -> DocumentId {
    let report = merger
        .upload(vec![UploadedFile {
            name: name.to_string(),
            content: bytes,
        }])
        .expect("upload should be accepted");
    assert!(report.errors.is_empty(), "upload errors: {:?}", report.errors);
    report.files[0].id.clone()
}

fn page_texts(bytes: &[u8]) -> Vec<(String, i64)> {
    let doc = Document::load_mem(bytes).expect("output should parse");
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let text = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
            let rotation = doc
                .get_dictionary(page_id)
                .unwrap()
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0);
            (text, rotation)
        })
        .collect()
}

// =============================================================================
// Registration Tests
// =============================================================================

#[test]
fn test_upload_registers_page_count() {
    let (_dir, merger) = test_merger(Arc::new(MockDetector::new()));
    let id = upload(&merger, "three.pdf", build_pdf("T", 3));

    let doc = merger.registry().get(&id).unwrap();
    assert_eq!(doc.page_count, 3);
    assert_eq!(doc.original_name, "three.pdf");
}

#[test]
fn test_unparsable_upload_is_rejected() {
    let (_dir, merger) = test_merger(Arc::new(MockDetector::new()));
    let report = merger
        .upload(vec![UploadedFile {
            name: "fake.pdf".to_string(),
            content: b"%PDF-1.7 this is not really a pdf".to_vec(),
        }])
        .unwrap();

    assert!(report.files.is_empty());
    assert_eq!(report.errors[0].error_kind, ErrorKind::InvalidDocument);
    assert!(merger.registry().is_empty());
}

// =============================================================================
// Merge Pipeline Tests
// =============================================================================

#[test]
fn test_merge_request_end_to_end() {
    let (_dir, merger) = test_merger(Arc::new(MockDetector::new()));
    let a = upload(&merger, "a.pdf", build_pdf("A", 3));
    let b = upload(&merger, "b.pdf", build_pdf("B", 2));

    let page = |id: &DocumentId, n: usize, rotation: Rotation| MergePageRequest {
        source_document_id: id.clone(),
        page_number: n,
        rotation,
    };
    let request = MergeRequest {
        pages: vec![
            page(&a, 1, Rotation::R90),
            page(&b, 2, Rotation::R0),
            page(&a, 3, Rotation::R180),
        ],
        output_name: Some("bundle".to_string()),
    };

    let result = merger.merge(&request).expect("merge should succeed");
    assert_eq!(result.page_count, 3);

    let download = merger.artifacts().retrieve(result.artifact_id.as_str()).unwrap();
    assert_eq!(download.file_name, "bundle.pdf");

    let pages = page_texts(&download.bytes);
    assert_eq!(pages.len(), 3);
    assert!(pages[0].0.contains("A-Page-1"));
    assert_eq!(pages[0].1, 90);
    assert!(pages[1].0.contains("B-Page-2"));
    assert_eq!(pages[1].1, 0);
    assert!(pages[2].0.contains("A-Page-3"));
    assert_eq!(pages[2].1, 180);
}

#[test]
fn test_manifest_edits_flow_into_output() {
    let (_dir, merger) = test_merger(Arc::new(MockDetector::new()));
    let a = upload(&merger, "a.pdf", build_pdf("A", 2));
    let b = upload(&merger, "b.pdf", build_pdf("B", 2));

    let manifest = merger.build_manifest(&[a.clone(), b.clone()]).unwrap();
    let order = vec![
        PageId::derive(&b, 2),
        PageId::derive(&a, 1),
        PageId::derive(&b, 1),
        PageId::derive(&a, 2),
    ];
    let manifest = manifest
        .reorder(&order)
        .and_then(|m| m.toggle(&PageId::derive(&b, 1)))
        .and_then(|m| m.rotate(&PageId::derive(&a, 2)))
        .and_then(|m| m.rotate(&PageId::derive(&a, 2)))
        .unwrap();

    let result = merger
        .merge_manifest(&manifest, None, &AssemblyOptions::default())
        .unwrap();
    assert!(result.artifact_id.as_str().ends_with("-merged.pdf"));

    let download = merger.artifacts().retrieve(result.artifact_id.as_str()).unwrap();
    let pages = page_texts(&download.bytes);
    let texts: Vec<bool> = ["B-Page-2", "A-Page-1", "A-Page-2"]
        .iter()
        .zip(&pages)
        .map(|(want, (text, _))| text.contains(want))
        .collect();
    assert_eq!(texts, vec![true, true, true]);
    assert_eq!(pages[2].1, 180);
}

#[test]
fn test_client_round_trip_of_manifest() {
    let (_dir, merger) = test_merger(Arc::new(MockDetector::new()));
    let a = upload(&merger, "a.pdf", build_pdf("A", 2));
    let manifest = merger.build_manifest(&[a]).unwrap();

    let json = serde_json::to_string(&serde_json::json!({ "pages": merger.summarize(&manifest) })).unwrap();
    let echoed: PageManifest = serde_json::from_str(&json).unwrap();
    assert_eq!(echoed, manifest);
}

#[test]
fn test_out_of_range_entry_fails_without_artifact() {
    let (dir, merger) = test_merger(Arc::new(MockDetector::new()));
    let a = upload(&merger, "a.pdf", build_pdf("A", 2));

    let request = MergeRequest {
        pages: vec![
            MergePageRequest {
                source_document_id: a.clone(),
                page_number: 1,
                rotation: Rotation::R0,
            },
            MergePageRequest {
                source_document_id: a,
                page_number: 5,
                rotation: Rotation::R0,
            },
        ],
        output_name: None,
    };

    let err = merger.merge(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AssemblyFailed);
    assert!(err.to_string().contains("entry 2"), "{err}");
    assert!(merger.artifacts().is_empty());

    let outputs = std::fs::read_dir(dir.path().join("outputs")).unwrap().count();
    assert_eq!(outputs, 0);
}

#[test]
fn test_empty_and_dangling_selections() {
    let (_dir, merger) = test_merger(Arc::new(MockDetector::new()));
    let a = upload(&merger, "a.pdf", build_pdf("A", 1));

    let empty = MergeRequest {
        pages: Vec::new(),
        output_name: None,
    };
    assert!(matches!(merger.merge(&empty), Err(Error::EmptySelection)));

    let manifest = merger.build_manifest(&[a.clone()]).unwrap();
    merger.cleanup(&[a.as_str()]);
    let err = merger
        .merge_manifest(&manifest, None, &AssemblyOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::DanglingReference(ref id) if id == a.as_str()));
}

// =============================================================================
// Detection Tests
// =============================================================================

#[tokio::test]
async fn test_detection_flags_are_advisory() {
    let detector = Arc::new(MockDetector::new());
    let (_dir, merger) = test_merger(detector.clone());
    let a = upload(&merger, "a.pdf", build_pdf("A", 4));

    let detections = merger.detect(&a).await.unwrap();
    assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(detections.len(), 2);

    let manifest = merger.build_manifest(&[a.clone()]).unwrap();
    let flagged = manifest.apply_detection_flags(&detections);
    assert!(flagged.get(&PageId::derive(&a, 2)).unwrap().flags.contains(&PageFlag::Blank));
    assert_eq!(flagged.enabled_pages().count(), 4);
}

// =============================================================================
// Retention and Cleanup Tests
// =============================================================================

#[test]
fn test_artifact_expires_after_download() {
    let (_dir, merger) = test_merger(Arc::new(MockDetector::new()));
    let a = upload(&merger, "a.pdf", build_pdf("A", 1));
    let request = MergeRequest {
        pages: vec![MergePageRequest {
            source_document_id: a,
            page_number: 1,
            rotation: Rotation::R0,
        }],
        output_name: None,
    };
    let result = merger.merge(&request).unwrap();

    let first = merger.artifacts().retrieve(result.artifact_id.as_str()).unwrap();
    assert!(first.first_retrieval);

    merger.artifacts().expire(&result.artifact_id).unwrap();
    let err = merger.artifacts().retrieve(result.artifact_id.as_str()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_cleanup_twice_reports_same_outcome() {
    let (_dir, merger) = test_merger(Arc::new(MockDetector::new()));
    let a = upload(&merger, "a.pdf", build_pdf("A", 1));

    let first = merger.cleanup(&[a.as_str()]);
    let second = merger.cleanup(&[a.as_str()]);
    assert_eq!(first, second);
    assert!(second.errors.is_empty());
}

#[test]
fn test_traversal_identifiers_are_denied() {
    let (dir, merger) = test_merger(Arc::new(MockDetector::new()));
    std::fs::write(dir.path().join("secret.pdf"), build_pdf("S", 1)).unwrap();

    for id in ["../secret.pdf", "..\\secret.pdf", "/etc/passwd", "a/../../secret.pdf"] {
        let err = merger.artifacts().retrieve(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied, "{id}");
        assert!(DocumentId::parse(id).is_err());
    }

    let report = merger.cleanup(&["../secret.pdf"]);
    assert_eq!(report.errors[0].error_kind, ErrorKind::AccessDenied);
    assert!(dir.path().join("secret.pdf").exists());
}

#[test]
fn test_sweep_keeps_fresh_files() {
    let (_dir, merger) = test_merger(Arc::new(MockDetector::new()));
    upload(&merger, "a.pdf", build_pdf("A", 1));

    let report = merger.sweep();
    assert!(report.is_empty());
    assert_eq!(merger.registry().len(), 1);
}
