//! Page rasterization via PDFium.
//!
//! Rendering is delegated entirely to the PDFium library; this module
//! sizes the render from the document's page geometry, encodes the
//! bitmap, and fans page encoding out over rayon.

use crate::error::{Error, Result};
use crate::model::{Document, DEFAULT_DPI};
use image::DynamicImage;
use pdfium_render::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::io::Cursor;

/// Output encoding for rasterized pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RasterFormat {
    /// 8-bit RGBA PNG
    #[default]
    Png,
    /// 8-bit grayscale PNG
    Gray,
}

impl RasterFormat {
    fn label(&self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Gray => "gray",
        }
    }
}

/// Options controlling page rasterization.
#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Render resolution in dots per inch
    pub dpi: u32,

    /// Output image encoding
    pub format: RasterFormat,

    /// Cap on the longest rendered edge in pixels
    pub max_edge: Option<u32>,
}

impl RasterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_format(mut self, format: RasterFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_max_edge(mut self, max_edge: u32) -> Self {
        self.max_edge = Some(max_edge);
        self
    }

    /// Cache key for [`PageNode`](crate::model::PageNode) raster caches.
    /// Two option sets produce the same key iff they render identically.
    pub fn cache_key(&self) -> String {
        match self.max_edge {
            Some(edge) => format!("{}@{}dpi|max{}", self.format.label(), self.dpi, edge),
            None => format!("{}@{}dpi", self.format.label(), self.dpi),
        }
    }
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            format: RasterFormat::Png,
            max_edge: None,
        }
    }
}

/// Rasterize a single 1-indexed page to encoded image bytes.
pub fn rasterize_page(document: &Document, page_number: u32, options: &RasterOptions) -> Result<Vec<u8>> {
    let image = render_page_image(document, page_number, options)?;
    encode_image(image, options.format)
}

/// Rasterize the given 1-indexed pages, returning encoded image bytes
/// keyed by page number.
///
/// PDFium renders sequentially (the native library is single-threaded);
/// image encoding runs in parallel over rayon.
pub fn rasterize_document(
    document: &Document,
    pages: &[u32],
    options: &RasterOptions,
) -> Result<BTreeMap<u32, Vec<u8>>> {
    let mut rendered: Vec<(u32, DynamicImage)> = Vec::with_capacity(pages.len());
    for &page_number in pages {
        rendered.push((page_number, render_page_image(document, page_number, options)?));
    }

    let encoded: Vec<(u32, Vec<u8>)> = rendered
        .into_par_iter()
        .map(|(page_number, image)| Ok((page_number, encode_image(image, options.format)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(encoded.into_iter().collect())
}

fn render_page_image(
    document: &Document,
    page_number: u32,
    options: &RasterOptions,
) -> Result<DynamicImage> {
    if page_number == 0 || page_number > document.page_count() {
        return Err(Error::PageOutOfRange(page_number, document.page_count()));
    }

    let (mut width_px, mut height_px) = document.render_size(page_number, options.dpi)?;
    if let Some(max_edge) = options.max_edge {
        let longest = width_px.max(height_px);
        if longest > max_edge {
            let scale = max_edge as f32 / longest as f32;
            width_px = (width_px as f32 * scale).round() as u32;
            height_px = (height_px as f32 * scale).round() as u32;
        }
    }

    log::debug!(
        "rasterizing page {} of '{}' at {}x{}px",
        page_number,
        document.name(),
        width_px,
        height_px
    );

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| Error::Raster(format!("failed to bind to PDFium library: {e:?}")))?;
    let pdfium = Pdfium::new(bindings);

    let pdf = pdfium
        .load_pdf_from_byte_slice(document.bytes(), None)
        .map_err(|e| Error::Raster(format!("failed to load PDF: {e:?}")))?;

    let page = pdf
        .pages()
        .get((page_number - 1) as u16)
        .map_err(|e| Error::Raster(format!("failed to get page {page_number}: {e:?}")))?;

    let config = PdfRenderConfig::new()
        .set_target_width(width_px as i32)
        .set_maximum_height(height_px as i32);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| Error::Raster(format!("render failed: {e:?}")))?;

    Ok(bitmap.as_image())
}

fn encode_image(image: DynamicImage, format: RasterFormat) -> Result<Vec<u8>> {
    let image = match format {
        RasterFormat::Png => image,
        RasterFormat::Gray => DynamicImage::ImageLuma8(image.to_luma8()),
    };

    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    image.write_to(&mut cursor, image::ImageFormat::Png)?;
    Ok(buf)
}
