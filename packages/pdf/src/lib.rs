#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! PDF access for inspection reports.
//!
//! Two capabilities live here: reading the embedded text layer with
//! [`pdf_extract`], and turning the first page of a scanned report into an
//! image that an OCR engine can read (see [`render`]). Neither knows
//! anything about report layouts; that is the extractor's job.

pub mod render;

use std::panic::{AssertUnwindSafe, catch_unwind};

pub use render::{EmbeddedImageRasterizer, PageRasterizer};

/// Errors specific to PDF handling.
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    /// The byte stream could not be parsed as a PDF.
    #[error("PDF parse error: {0}")]
    Parse(String),

    /// Text-layer extraction failed.
    #[error("PDF extraction error: {0}")]
    Extraction(String),

    /// The document has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// The page has no embedded image to rasterize.
    #[error("No image XObjects found on page {0}")]
    NoImage(usize),

    /// An embedded image could not be decoded.
    #[error("Image decode error: {0}")]
    Image(String),
}

/// Extracts the embedded text layer of a PDF.
///
/// Scanned reports typically yield an empty or whitespace-only string here,
/// which callers treat as the signal to fall back to OCR.
///
/// # Errors
///
/// Returns [`PdfError::Extraction`] if the PDF cannot be read, including the
/// case where the underlying extractor panics on malformed input.
pub fn extract_text(bytes: &[u8]) -> Result<String, PdfError> {
    let result = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }))
    .map_err(|_| PdfError::Extraction("text extractor panicked on malformed PDF".to_owned()))?;

    let text = result
        .map_err(|e| PdfError::Extraction(format!("failed to extract text from PDF: {e}")))?;

    log::debug!(
        "Extracted {} characters of text from {} byte PDF",
        text.len(),
        bytes.len()
    );

    Ok(text)
}
