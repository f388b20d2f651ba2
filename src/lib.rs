//! # ocrflow
//!
//! PDF document plumbing for OCR pipelines.
//!
//! This library loads PDF documents, splits and merges page ranges,
//! rasterizes pages through PDFium, and dispatches pages to OCR
//! providers (Google Document AI, Azure Document Intelligence, local
//! Tesseract), caching the normalized results on an in-memory document
//! tree.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ocrflow::{load_document, PageSelection};
//!
//! fn main() -> ocrflow::Result<()> {
//!     let doc = load_document("report.pdf")?;
//!     println!("{}: {} pages", doc.name(), doc.page_count());
//!
//!     // Extract pages 2-4 into a standalone PDF
//!     let excerpt = doc.split(&PageSelection::parse("2-4")?)?;
//!     excerpt.write_to_path("excerpt.pdf")?;
//!
//!     Ok(())
//! }
//! ```
//!
//! Running OCR goes through a provider and a [`DocumentNode`], which
//! caches per-page results keyed by provider name:
//!
//! ```no_run
//! use ocrflow::provider::{process_document_node, GoogleDocumentAiProvider};
//! use ocrflow::{load_document_node, PageSelection};
//!
//! # async fn run() -> ocrflow::Result<()> {
//! let mut node = load_document_node("report.pdf")?;
//! let provider = GoogleDocumentAiProvider::from_env("my-project", "processor-id")?;
//!
//! let results = process_document_node(&provider, &mut node, &PageSelection::All).await?;
//! for (page, result) in &results {
//!     println!("--- page {page} ---\n{}", result.page_text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Page-range surgery**: split, sub-split under page/byte limits, merge
//! - **Rasterization**: PDFium rendering with DPI and size controls
//! - **Provider dispatch**: chunked uploads, retry with backoff, polling
//! - **Normalized geometry**: words, lines, and blocks in page-relative
//!   coordinates, with skew-aware bounding polygons

pub mod detect;
pub mod error;
pub mod model;
pub mod pdf;
pub mod provider;
pub mod raster;
pub mod select;

// Re-export commonly used types
pub use detect::{is_pdf, is_pdf_bytes, sniff, sniff_path, PdfFormat};
pub use error::{Error, Result};
pub use model::{
    BlockLevel, BoundingPoly, Direction, Document, DocumentNode, Geometry, NormBBox,
    OcrPageResult, PageNode, Point, ProviderResult, TextBlock, DEFAULT_DPI,
};
pub use provider::{process_document_node, Capability, OcrProvider};
pub use raster::{rasterize_document, rasterize_page, RasterFormat, RasterOptions};
pub use select::PageSelection;

use std::path::Path;

/// Load a PDF document from a file path.
///
/// # Example
///
/// ```no_run
/// use ocrflow::load_document;
///
/// let doc = load_document("document.pdf").unwrap();
/// println!("Pages: {}", doc.page_count());
/// ```
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Document> {
    Document::from_path(path)
}

/// Load a PDF from raw bytes.
pub fn load_document_bytes(data: Vec<u8>, name: Option<String>) -> Result<Document> {
    Document::from_bytes(data, name)
}

/// Load a PDF file and wrap it in a [`DocumentNode`] ready for OCR
/// result caching.
///
/// # Example
///
/// ```no_run
/// use ocrflow::load_document_node;
///
/// let node = load_document_node("document.pdf").unwrap();
/// assert_eq!(node.pages().len() as u32, node.page_count());
/// ```
pub fn load_document_node<P: AsRef<Path>>(path: P) -> Result<DocumentNode> {
    Ok(DocumentNode::from_document(Document::from_path(path)?))
}

/// Concatenate PDF files into a single document.
///
/// # Example
///
/// ```no_run
/// use ocrflow::merge_files;
///
/// let merged = merge_files(&["a.pdf", "b.pdf"]).unwrap();
/// merged.write_to_path("combined.pdf").unwrap();
/// ```
pub fn merge_files<P: AsRef<Path>>(paths: &[P]) -> Result<Document> {
    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        docs.push(Document::from_path(path)?);
    }

    let (first, rest) = docs
        .split_first()
        .ok_or(Error::EmptyDocument)?;
    first.merge(rest)
}
