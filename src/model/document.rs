//! The in-memory PDF document.

use crate::detect;
use crate::error::{Error, Result};
use crate::pdf;
use crate::select::PageSelection;
use chrono::Utc;
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default rendering resolution in dots per inch.
pub const DEFAULT_DPI: u32 = 100;

/// A loaded PDF document: raw bytes plus derived metadata.
///
/// The document holds the original file bytes; structural queries go
/// through lopdf on demand and rasterization goes through PDFium. Pages
/// are 1-indexed everywhere.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    bytes: Vec<u8>,
    path: Option<PathBuf>,
    page_count: u32,
    hash: OnceLock<String>,
}

impl Document {
    /// Load a document from a file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        let mut doc = Self::from_bytes(bytes, Some(name))?;
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Create a document from raw PDF bytes.
    ///
    /// Validates the PDF header and counts pages. An unnamed document
    /// gets a timestamped placeholder name.
    pub fn from_bytes(bytes: Vec<u8>, name: Option<String>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::EmptyDocument);
        }
        detect::sniff(&bytes)?;

        let page_count = pdf::page_count(&bytes)?;
        let name =
            name.unwrap_or_else(|| format!("PDF-{}.pdf", Utc::now().format("%Y%m%dT%H%M%S")));

        Ok(Self {
            name,
            bytes,
            path: None,
            page_count,
            hash: OnceLock::new(),
        })
    }

    /// The document name (file name or generated placeholder).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw PDF bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Source path, when loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// MD5 hex digest of the document bytes, computed once on first use.
    pub fn document_hash(&self) -> &str {
        self.hash.get_or_init(|| {
            let mut hasher = Md5::new();
            hasher.update(&self.bytes);
            format!("{:x}", hasher.finalize())
        })
    }

    /// Page dimensions in PDF points (1 pt = 1/72 inch).
    pub fn page_dimensions(&self, page_number: u32) -> Result<(f32, f32)> {
        self.check_page(page_number)?;
        pdf::page_dimensions(&self.bytes, page_number)
    }

    /// Pixel dimensions a page renders to at the given DPI.
    pub fn render_size(&self, page_number: u32, dpi: u32) -> Result<(u32, u32)> {
        let (width_pt, height_pt) = self.page_dimensions(page_number)?;
        let width_px = (width_pt / 72.0 * dpi as f32).round() as u32;
        let height_px = (height_pt / 72.0 * dpi as f32).round() as u32;
        Ok((width_px, height_px))
    }

    /// Write the document bytes to a path. When the path is a directory,
    /// the document name is appended.
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let mut path = path.as_ref().to_path_buf();
        if path.is_dir() {
            path.push(&self.name);
        }
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }

    /// Extract the selected pages into a new document.
    pub fn split(&self, selection: &PageSelection) -> Result<Document> {
        let pages = selection.resolve(self.page_count)?;
        let bytes = pdf::extract_pages(&self.bytes, &pages)?;

        let suffix = match pages.as_slice() {
            [single] => format!("page {single}"),
            // Contiguous run
            [first, .., last] if (last - first) as usize + 1 == pages.len() => {
                format!("pages {first}-{last}")
            }
            _ => {
                let list: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
                format!("pages {}", list.join(","))
            }
        };

        Document::from_bytes(bytes, Some(format!("{} ({suffix})", self.name)))
    }

    /// Extract an inclusive 1-indexed page range into a new document.
    pub fn split_range(&self, start: u32, end: u32) -> Result<Document> {
        self.split(&PageSelection::Range(start..=end))
    }

    /// Split the document into successive chunks of at most
    /// `max_page_count` pages, each at most `max_bytes` bytes when a
    /// limit is given.
    ///
    /// A chunk over the byte limit is shrunk page by page; a single page
    /// that still exceeds the limit is an error. A document already
    /// within both limits is returned whole without a rewrite.
    pub fn split_batches(
        &self,
        max_page_count: u32,
        max_bytes: Option<usize>,
    ) -> Result<Vec<Document>> {
        if max_page_count == 0 {
            return Err(Error::InvalidPageRange("max_page_count must be >= 1".into()));
        }

        let within_bytes = max_bytes.map_or(true, |max| self.bytes.len() <= max);
        if self.page_count <= max_page_count && within_bytes {
            return Ok(vec![self.clone()]);
        }

        let mut chunks = Vec::new();
        let mut start = 1u32;

        while start <= self.page_count {
            let mut end = start.saturating_add(max_page_count - 1).min(self.page_count);
            let mut chunk = self.split_range(start, end)?;

            if let Some(max) = max_bytes {
                while chunk.bytes.len() > max {
                    if end == start {
                        return Err(Error::ChunkTooLarge(start, max));
                    }
                    end -= 1;
                    log::debug!(
                        "shrinking chunk {}-{} to fit {} byte limit",
                        start,
                        end,
                        max
                    );
                    chunk = self.split_range(start, end)?;
                }
            }

            chunks.push(chunk);
            start = end + 1;
        }

        Ok(chunks)
    }

    /// Concatenate this document with others into a new document.
    pub fn merge<'a, I>(&self, others: I) -> Result<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut inputs: Vec<&[u8]> = vec![&self.bytes];
        let sources: Vec<&Document> = others.into_iter().collect();
        for doc in &sources {
            inputs.push(&doc.bytes);
        }

        let bytes = pdf::merge_documents(&inputs)?;
        Document::from_bytes(bytes, Some(format!("{} (merged)", self.name)))
    }

    /// Append another document's pages after this document's pages.
    pub fn append(&self, other: &Document) -> Result<Document> {
        self.merge([other])
    }

    fn check_page(&self, page_number: u32) -> Result<()> {
        if page_number == 0 || page_number > self.page_count {
            return Err(Error::PageOutOfRange(page_number, self.page_count));
        }
        Ok(())
    }
}
