//! Per-document and per-page caches for derived artifacts.
//!
//! A [`DocumentNode`] is an in-memory tree built over a [`Document`]:
//! one [`PageNode`] per page, each holding the OCR results and raster
//! images produced for that page. Nothing here is persisted by the
//! library; the tree lives and dies with the process unless the caller
//! serializes the results it cares about.

use super::document::Document;
use super::result::OcrPageResult;
use crate::error::{Error, Result};
use crate::raster::{self, RasterOptions};
use std::collections::HashMap;

/// Cached artifacts for a single page.
#[derive(Debug, Clone, Default)]
pub struct PageNode {
    /// Page number within the document (1-indexed)
    pub page_number: u32,

    /// OCR results keyed by provider name
    pub ocr_results: HashMap<String, OcrPageResult>,

    /// Rasterized images keyed by raster settings (see
    /// [`RasterOptions::cache_key`])
    raster_cache: HashMap<String, Vec<u8>>,
}

impl PageNode {
    pub fn new(page_number: u32) -> Self {
        Self {
            page_number,
            ocr_results: HashMap::new(),
            raster_cache: HashMap::new(),
        }
    }

    /// OCR result from a specific provider, if present.
    pub fn ocr_result(&self, provider_name: &str) -> Option<&OcrPageResult> {
        self.ocr_results.get(provider_name)
    }

    /// Any cached OCR text for this page, from whichever provider ran.
    pub fn text(&self) -> Option<&str> {
        self.ocr_results.values().next().map(|r| r.page_text.as_str())
    }

    /// Cached raster bytes for the given settings, if present.
    pub fn raster(&self, options: &RasterOptions) -> Option<&[u8]> {
        self.raster_cache.get(&options.cache_key()).map(|v| v.as_slice())
    }

    /// Insert raster bytes for the given settings.
    pub fn cache_raster(&mut self, options: &RasterOptions, bytes: Vec<u8>) {
        self.raster_cache.insert(options.cache_key(), bytes);
    }

    /// Drop all cached rasters for this page.
    pub fn clear_raster_cache(&mut self) {
        self.raster_cache.clear();
    }
}

/// An in-memory tree over a document: the document plus one node per page.
#[derive(Debug, Clone)]
pub struct DocumentNode {
    document: Document,
    pages: Vec<PageNode>,
}

impl DocumentNode {
    /// Build a node tree over a document, one page node per page.
    pub fn from_document(document: Document) -> Self {
        let pages = (1..=document.page_count()).map(PageNode::new).collect();
        Self { document, pages }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_count(&self) -> u32 {
        self.document.page_count()
    }

    /// Page node by 1-indexed page number.
    pub fn page(&self, page_number: u32) -> Option<&PageNode> {
        if page_number == 0 {
            return None;
        }
        self.pages.get((page_number - 1) as usize)
    }

    /// Mutable page node by 1-indexed page number.
    pub fn page_mut(&mut self, page_number: u32) -> Option<&mut PageNode> {
        if page_number == 0 {
            return None;
        }
        self.pages.get_mut((page_number - 1) as usize)
    }

    pub fn pages(&self) -> &[PageNode] {
        &self.pages
    }

    /// Rasterize a page through the cache: returns the cached image when
    /// the same settings were rendered before, renders and stores it
    /// otherwise.
    pub fn rasterize_cached(&mut self, page_number: u32, options: &RasterOptions) -> Result<Vec<u8>> {
        let page_count = self.page_count();
        let node = self
            .page_mut(page_number)
            .ok_or(Error::PageOutOfRange(page_number, page_count))?;

        if let Some(bytes) = node.raster_cache.get(&options.cache_key()) {
            return Ok(bytes.clone());
        }

        let bytes = raster::rasterize_page(&self.document, page_number, options)?;
        // page_mut re-borrow after the render call released `node`
        let node = self
            .page_mut(page_number)
            .ok_or(Error::PageOutOfRange(page_number, page_count))?;
        node.cache_raster(options, bytes.clone());
        Ok(bytes)
    }

    /// Store a provider's per-page results onto the matching page nodes.
    ///
    /// A later run with the same provider overwrites its own entries;
    /// other providers' entries are untouched.
    pub fn store_ocr_results<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = OcrPageResult>,
    {
        for result in results {
            let page_number = result.page_number;
            if let Some(node) = self.page_mut(page_number) {
                node.ocr_results.insert(result.provider_name.clone(), result);
            } else {
                log::warn!(
                    "dropping OCR result for page {} outside document ({} pages)",
                    page_number,
                    self.page_count()
                );
            }
        }
    }

    /// Page texts from the given provider, in page order.
    pub fn provider_text(&self, provider_name: &str) -> Vec<(u32, &str)> {
        self.pages
            .iter()
            .filter_map(|p| {
                p.ocr_results
                    .get(provider_name)
                    .map(|r| (p.page_number, r.page_text.as_str()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_document_builds_page_nodes() {
        let doc = crate::pdf::tests::sample_document(3);
        let node = DocumentNode::from_document(doc);
        assert_eq!(node.page_count(), 3);
        assert_eq!(node.pages().len(), 3);
        assert_eq!(node.page(1).unwrap().page_number, 1);
        assert_eq!(node.page(3).unwrap().page_number, 3);
        assert!(node.page(0).is_none());
        assert!(node.page(4).is_none());
    }

    #[test]
    fn test_store_results_keyed_by_provider() {
        let doc = crate::pdf::tests::sample_document(2);
        let mut node = DocumentNode::from_document(doc);

        node.store_ocr_results(vec![
            OcrPageResult::new("alpha", 1, "first".into()),
            OcrPageResult::new("alpha", 2, "second".into()),
        ]);
        node.store_ocr_results(vec![OcrPageResult::new("beta", 1, "other".into())]);

        assert_eq!(node.page(1).unwrap().ocr_results.len(), 2);
        assert_eq!(node.page(2).unwrap().ocr_results.len(), 1);
        assert_eq!(
            node.provider_text("alpha"),
            vec![(1, "first"), (2, "second")]
        );

        // Re-running a provider overwrites only its own entry.
        node.store_ocr_results(vec![OcrPageResult::new("alpha", 1, "redone".into())]);
        assert_eq!(
            node.page(1).unwrap().ocr_result("alpha").unwrap().page_text,
            "redone"
        );
        assert_eq!(
            node.page(1).unwrap().ocr_result("beta").unwrap().page_text,
            "other"
        );
    }

    #[test]
    fn test_out_of_range_results_dropped() {
        let doc = crate::pdf::tests::sample_document(1);
        let mut node = DocumentNode::from_document(doc);
        node.store_ocr_results(vec![OcrPageResult::new("alpha", 7, "ghost".into())]);
        assert!(node.page(1).unwrap().ocr_results.is_empty());
    }

    #[test]
    fn test_raster_cache_round_trip() {
        let mut page = PageNode::new(1);
        let options = RasterOptions::new().with_dpi(150);

        assert!(page.raster(&options).is_none());
        page.cache_raster(&options, vec![1, 2, 3]);
        assert_eq!(page.raster(&options), Some(&[1u8, 2, 3][..]));

        // Different settings miss the cache.
        let other = RasterOptions::new().with_dpi(300);
        assert!(page.raster(&other).is_none());

        page.clear_raster_cache();
        assert!(page.raster(&options).is_none());
    }
}
