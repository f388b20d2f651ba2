//! Error types for the ocrflow library.

use std::io;
use thiserror::Error;

/// Result type alias for ocrflow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during document processing.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The document contains no bytes.
    #[error("Document is empty")]
    EmptyDocument,

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted and requires a password.
    #[error("Document is encrypted")]
    Encrypted,

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Invalid page range specification.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// A split chunk cannot be shrunk below a single page.
    #[error("Page {0} alone exceeds the {1} byte limit")]
    ChunkTooLarge(u32, usize),

    /// Error rasterizing a page via PDFium.
    #[error("Rasterization error: {0}")]
    Raster(String),

    /// Error encoding a rasterized page image.
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// HTTP transport error talking to a provider.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A provider returned an error response.
    #[error("Provider '{provider}' failed: {message}")]
    Provider {
        /// Name of the provider that failed
        provider: String,
        /// Provider-supplied error detail
        message: String,
    },

    /// A provider response could not be decoded.
    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    /// Credentials required by a provider are missing.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// The tesseract executable failed.
    #[error("Tesseract failed: {0}")]
    Tesseract(String),

    /// Geometry operation on malformed input.
    #[error("Invalid geometry: {0}")]
    Geometry(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}
