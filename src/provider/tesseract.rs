//! Local Tesseract adapter.
//!
//! Rasterizes each page through PDFium, then shells out to the
//! `tesseract` executable in TSV mode and rebuilds words, lines, and
//! blocks from the TSV hierarchy. No network involved.

use super::{Capability, OcrProvider};
use crate::error::{Error, Result};
use crate::model::{
    BlockLevel, Document, Geometry, NormBBox, OcrPageResult, ProviderResult, TextBlock,
};
use crate::raster::{self, RasterOptions};
use crate::select::PageSelection;
use image::GenericImageView;
use std::io::Write;
use std::process::Command;

const PROVIDER_NAME: &str = "tesseract";

const CAPABILITIES: &[Capability] = &[
    Capability::TextExtraction,
    Capability::LayoutAnalysis,
    Capability::Rasterization,
];

/// TSV hierarchy level for word rows.
const TSV_LEVEL_WORD: u32 = 5;

/// OCR through a locally installed `tesseract` executable.
#[derive(Debug, Clone)]
pub struct TesseractProvider {
    command: String,
    language: String,
    raster: RasterOptions,
    keep_rasters: bool,
}

impl Default for TesseractProvider {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            language: "eng".to_string(),
            raster: RasterOptions::new().with_dpi(200),
            keep_rasters: false,
        }
    }
}

impl TesseractProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path or name of the tesseract executable.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Language model passed via `-l`, `eng` by default.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_raster_options(mut self, options: RasterOptions) -> Self {
        self.raster = options;
        self
    }

    /// Attach the rendered page image to each result.
    pub fn with_raster_output(mut self, keep: bool) -> Self {
        self.keep_rasters = keep;
        self
    }

    fn process_page(&self, document: &Document, page_number: u32) -> Result<OcrPageResult> {
        let png = raster::rasterize_page(document, page_number, &self.raster)?;
        let (width, height) = image::load_from_memory(&png)?.dimensions();

        let tsv = self.run_tesseract(&png)?;
        let mut result = parse_tsv(&tsv, page_number, width as f32, height as f32)?;

        if self.keep_rasters {
            result.raster_image = Some(png);
        }
        Ok(result)
    }

    fn run_tesseract(&self, png: &[u8]) -> Result<String> {
        let mut input = tempfile::Builder::new()
            .prefix("ocrflow-page-")
            .suffix(".png")
            .tempfile()?;
        input.write_all(png)?;
        input.flush()?;

        let output = Command::new(&self.command)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("tsv")
            .output()
            .map_err(|e| Error::Tesseract(format!("failed to run '{}': {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Tesseract(format!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrProvider for TesseractProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    async fn process_document(
        &self,
        document: &Document,
        selection: &PageSelection,
    ) -> Result<ProviderResult> {
        let pages = selection.resolve(document.page_count())?;
        log::info!(
            "{PROVIDER_NAME}: running over {} page(s) of '{}'",
            pages.len(),
            document.name()
        );

        let mut result = ProviderResult::new(PROVIDER_NAME);
        for page_number in pages {
            result.insert(self.process_page(document, page_number)?);
        }
        Ok(result)
    }
}

/// One word row of tesseract's TSV output.
#[derive(Debug, Clone, PartialEq)]
struct TsvRow {
    level: u32,
    block: u32,
    paragraph: u32,
    line: u32,
    conf: f32,
    bbox: NormBBox,
    text: String,
}

fn parse_tsv_row(line: &str, width: f32, height: f32) -> Option<TsvRow> {
    // level page block par line word left top width height conf text
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 12 {
        return None;
    }

    let level = fields[0].parse().ok()?;
    let block = fields[2].parse().ok()?;
    let paragraph = fields[3].parse().ok()?;
    let line_num = fields[4].parse().ok()?;
    let left: f32 = fields[6].parse().ok()?;
    let top: f32 = fields[7].parse().ok()?;
    let box_width: f32 = fields[8].parse().ok()?;
    let box_height: f32 = fields[9].parse().ok()?;
    let conf: f32 = fields[10].parse().ok()?;

    Some(TsvRow {
        level,
        block,
        paragraph,
        line: line_num,
        conf,
        bbox: NormBBox::new(
            left / width,
            top / height,
            (left + box_width) / width,
            (top + box_height) / height,
        ),
        text: fields[11].to_string(),
    })
}

fn parse_tsv(tsv: &str, page_number: u32, width: f32, height: f32) -> Result<OcrPageResult> {
    if width <= 0.0 || height <= 0.0 {
        return Err(Error::Tesseract("raster image has zero size".into()));
    }

    // The header row fails to parse and drops out here.
    let rows: Vec<TsvRow> = tsv
        .lines()
        .filter_map(|line| parse_tsv_row(line, width, height))
        .collect();

    let word_rows: Vec<&TsvRow> = rows
        .iter()
        .filter(|r| r.level == TSV_LEVEL_WORD && !r.text.trim().is_empty())
        .collect();

    let words = word_rows
        .iter()
        .map(|row| {
            let mut block =
                TextBlock::new(row.text.clone(), BlockLevel::Word, Geometry::new(row.bbox));
            if row.conf >= 0.0 {
                block = block.with_confidence(row.conf / 100.0);
            }
            block
        })
        .collect();

    let line_runs = group_runs(&word_rows, |r| (r.block, r.paragraph, r.line));
    let lines: Vec<TextBlock> = line_runs
        .iter()
        .filter_map(|run| combine_run(run, BlockLevel::Line))
        .collect();

    let block_runs = group_runs(&word_rows, |r| r.block);
    let blocks = block_runs
        .iter()
        .filter_map(|run| combine_run(run, BlockLevel::Block))
        .collect();

    let page_text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut result = OcrPageResult::new(PROVIDER_NAME, page_number, page_text);
    result.words = words;
    result.lines = lines;
    result.blocks = blocks;
    Ok(result)
}

/// Group consecutive rows sharing a key, preserving reading order.
fn group_runs<'a, K, F>(rows: &[&'a TsvRow], key: F) -> Vec<Vec<&'a TsvRow>>
where
    K: PartialEq,
    F: Fn(&TsvRow) -> K,
{
    let mut runs: Vec<Vec<&TsvRow>> = Vec::new();
    let mut current_key: Option<K> = None;

    for &row in rows {
        let k = key(row);
        if current_key.as_ref() == Some(&k) {
            if let Some(last) = runs.last_mut() {
                last.push(row);
            }
        } else {
            runs.push(vec![row]);
            current_key = Some(k);
        }
    }
    runs
}

fn combine_run(run: &[&TsvRow], level: BlockLevel) -> Option<TextBlock> {
    let text = run
        .iter()
        .map(|r| r.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let bbox = NormBBox::combine(run.iter().map(|r| r.bbox)).ok()?;

    let mut block = TextBlock::new(text, level, Geometry::new(bbox));
    let confidences: Vec<f32> = run.iter().filter(|r| r.conf >= 0.0).map(|r| r.conf).collect();
    if !confidences.is_empty() {
        block = block
            .with_confidence(confidences.iter().sum::<f32>() / confidences.len() as f32 / 100.0);
    }
    Some(block)
}
