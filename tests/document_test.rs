//! Integration tests for document loading, splitting, and merging.

mod common;

use common::{sample_document, sample_pdf_bytes};
use ocrflow::{Document, Error, PageSelection};

#[test]
fn test_load_from_path_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.pdf");
    std::fs::write(&path, sample_pdf_bytes(3)).unwrap();

    let doc = ocrflow::load_document(&path).unwrap();
    assert_eq!(doc.name(), "input.pdf");
    assert_eq!(doc.page_count(), 3);
    assert_eq!(doc.path(), Some(path.as_path()));
}

#[test]
fn test_unnamed_document_gets_placeholder_name() {
    let doc = Document::from_bytes(sample_pdf_bytes(1), None).unwrap();
    assert!(doc.name().starts_with("PDF-"));
    assert!(doc.name().ends_with(".pdf"));
}

#[test]
fn test_hash_changes_with_content() {
    let a = sample_document(2);
    let b = sample_document(3);
    assert_ne!(a.document_hash(), b.document_hash());

    let copy = Document::from_bytes(a.bytes().to_vec(), Some("copy.pdf".into())).unwrap();
    assert_eq!(copy.document_hash(), a.document_hash());
}

#[test]
fn test_split_names_carry_page_range() {
    let doc = sample_document(5);

    let range = doc.split(&PageSelection::Range(2..=4)).unwrap();
    assert_eq!(range.page_count(), 3);
    assert!(range.name().contains("pages 2-4"));

    let single = doc.split(&PageSelection::Pages(vec![3])).unwrap();
    assert_eq!(single.page_count(), 1);
    assert!(single.name().contains("page 3"));

    // A contiguous Pages selection still reads as a range.
    let run = doc.split(&PageSelection::Pages(vec![2, 3, 4])).unwrap();
    assert!(run.name().contains("pages 2-4"));
}

#[test]
fn test_split_name_lists_non_contiguous_pages() {
    let doc = sample_document(5);
    let picked = doc.split(&PageSelection::Pages(vec![1, 3, 5])).unwrap();
    assert_eq!(picked.page_count(), 3);
    assert!(picked.name().contains("pages 1,3,5"));
    assert!(!picked.name().contains("1-5"));
}

#[test]
fn test_split_result_is_standalone() {
    let doc = sample_document(4);
    let excerpt = doc.split_range(3, 4).unwrap();

    // The excerpt must load on its own, with its own page numbering.
    let reloaded = Document::from_bytes(excerpt.bytes().to_vec(), None).unwrap();
    assert_eq!(reloaded.page_count(), 2);
    assert!(reloaded.page_dimensions(1).is_ok());
    assert!(reloaded.page_dimensions(2).is_ok());
}

#[test]
fn test_split_rejects_bad_selections() {
    let doc = sample_document(3);
    assert!(matches!(
        doc.split(&PageSelection::Pages(vec![5])),
        Err(Error::PageOutOfRange(5, 3))
    ));
    assert!(doc.split(&PageSelection::Pages(vec![])).is_err());
    assert!(doc.split_range(0, 2).is_err());
}

#[test]
fn test_split_batches_by_page_count() {
    let doc = sample_document(7);
    let chunks = doc.split_batches(3, None).unwrap();

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].page_count(), 3);
    assert_eq!(chunks[1].page_count(), 3);
    assert_eq!(chunks[2].page_count(), 1);
}

#[test]
fn test_split_batches_within_limits_returns_whole() {
    let doc = sample_document(2);
    let chunks = doc.split_batches(15, Some(20 * 1024 * 1024)).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].document_hash(), doc.document_hash());
}

#[test]
fn test_split_batches_byte_limit_shrinks_chunks() {
    let doc = sample_document(6);
    // A limit just over a single-page document forces one page per chunk.
    let single_page = doc.split_range(1, 1).unwrap();
    let limit = single_page.bytes().len() + 64;

    let chunks = doc.split_batches(6, Some(limit)).unwrap();
    assert!(chunks.len() >= 2);
    let total: u32 = chunks.iter().map(|c| c.page_count()).sum();
    assert_eq!(total, 6);
    for chunk in &chunks {
        assert!(chunk.bytes().len() <= limit);
    }
}

#[test]
fn test_split_batches_huge_page_limit() {
    let doc = sample_document(2);
    let single = doc.split_range(1, 1).unwrap();
    let limit = single.bytes().len() + 64;

    // The byte limit forces chunking even though the page limit never
    // binds; the page arithmetic must not overflow.
    let chunks = doc.split_batches(u32::MAX, Some(limit)).unwrap();
    assert_eq!(chunks.iter().map(|c| c.page_count()).sum::<u32>(), 2);
    for chunk in &chunks {
        assert!(chunk.bytes().len() <= limit);
    }
}

#[test]
fn test_split_batches_page_too_large() {
    let doc = sample_document(2);
    assert!(matches!(
        doc.split_batches(1, Some(16)),
        Err(Error::ChunkTooLarge(1, 16))
    ));
}

#[test]
fn test_merge_preserves_page_count_and_loads() {
    let a = sample_document(2);
    let b = sample_document(3);
    let c = sample_document(1);

    let merged = a.merge([&b, &c]).unwrap();
    assert_eq!(merged.page_count(), 6);
    assert!(merged.name().contains("merged"));

    for page in 1..=6 {
        let (w, h) = merged.page_dimensions(page).unwrap();
        assert_eq!((w, h), (612.0, 792.0));
    }
}

#[test]
fn test_split_then_merge_restores_pages() {
    let doc = sample_document(4);
    let front = doc.split_range(1, 2).unwrap();
    let back = doc.split_range(3, 4).unwrap();

    let rejoined = front.merge([&back]).unwrap();
    assert_eq!(rejoined.page_count(), 4);

    let appended = front.append(&back).unwrap();
    assert_eq!(appended.page_count(), 4);
}

#[test]
fn test_write_to_directory_uses_document_name() {
    let dir = tempfile::tempdir().unwrap();
    let doc = sample_document(1);

    let written = doc.write_to_path(dir.path()).unwrap();
    assert_eq!(written.file_name().unwrap().to_str(), Some("sample-1.pdf"));
    assert_eq!(std::fs::read(&written).unwrap(), doc.bytes());
}
