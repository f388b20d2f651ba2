//! Provider output containers.

use super::layout::{BlockLevel, TextBlock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OCR output for a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrPageResult {
    /// Name of the provider that produced this result
    pub provider_name: String,

    /// Page number within the source document (1-indexed)
    pub page_number: u32,

    /// Full page text in reading order
    pub page_text: String,

    /// Word-level blocks
    #[serde(default)]
    pub words: Vec<TextBlock>,

    /// Line-level blocks
    #[serde(default)]
    pub lines: Vec<TextBlock>,

    /// Block-level blocks
    #[serde(default)]
    pub blocks: Vec<TextBlock>,

    /// Rasterized page image used for OCR, when the provider returned one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raster_image: Option<Vec<u8>>,
}

impl OcrPageResult {
    pub fn new(provider_name: impl Into<String>, page_number: u32, page_text: String) -> Self {
        Self {
            provider_name: provider_name.into(),
            page_number,
            page_text,
            words: Vec::new(),
            lines: Vec::new(),
            blocks: Vec::new(),
            raster_image: None,
        }
    }

    /// Blocks at a given granularity.
    pub fn text_blocks(&self, level: BlockLevel) -> &[TextBlock] {
        match level {
            BlockLevel::Word => &self.words,
            BlockLevel::Line => &self.lines,
            // Paragraph-level output folds into blocks
            BlockLevel::Block | BlockLevel::Paragraph => &self.blocks,
        }
    }

    /// Mean confidence over word blocks, if any carry one.
    pub fn mean_word_confidence(&self) -> Option<f32> {
        let confidences: Vec<f32> = self.words.iter().filter_map(|w| w.confidence).collect();
        if confidences.is_empty() {
            return None;
        }
        Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
    }
}

/// The result of running a provider over a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    /// Name of the provider that produced the results
    pub provider_name: String,

    /// Per-page results, keyed by absolute 1-indexed page number
    pub pages: BTreeMap<u32, OcrPageResult>,
}

impl ProviderResult {
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            pages: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, result: OcrPageResult) {
        self.pages.insert(result.page_number, result);
    }

    pub fn page(&self, page_number: u32) -> Option<&OcrPageResult> {
        self.pages.get(&page_number)
    }

    /// Page texts joined in page order.
    pub fn full_text(&self) -> String {
        self.pages
            .values()
            .map(|p| p.page_text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
