//! Document model: the document itself, OCR geometry, provider results,
//! and the per-page cache tree populated by provider runs.

mod document;
mod layout;
mod node;
mod result;

pub use document::{Document, DEFAULT_DPI};
pub use layout::{BlockLevel, BoundingPoly, Direction, Geometry, NormBBox, Point, TextBlock};
pub use node::{DocumentNode, PageNode};
pub use result::{OcrPageResult, ProviderResult};
