#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Optical character recognition for scanned inspection reports.
//!
//! A [`RecognitionEngine`] turns one image into text. Engines are expensive
//! to initialize, so callers build one up front and share it (behind an
//! [`Arc`](std::sync::Arc)) across every document they process.
//!
//! Scanned pages are frequently fed through the scanner sideways or upside
//! down. [`sweep`] runs the engine at each of the four right-angle
//! rotations and keeps the best reading.

pub mod rotation;
#[cfg(feature = "tesseract")]
pub mod tesseract;

use image::DynamicImage;

pub use rotation::{Rotation, SweepOutcome, sweep};

/// Errors produced by OCR engines.
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    /// The engine could not be initialized.
    #[error("OCR initialization failed: {0}")]
    Init(String),

    /// Language data for the engine was not found.
    #[error("OCR language data not found: {0}")]
    LanguageDataNotFound(std::path::PathBuf),

    /// The image could not be prepared for recognition.
    #[error("OCR image preparation failed: {0}")]
    Image(String),

    /// Recognition itself failed.
    #[error("OCR recognition failed: {0}")]
    Recognition(String),
}

/// Converts an image into text.
///
/// Implementations must be `Send + Sync` so that a single initialized
/// engine can serve parallel extraction workers.
pub trait RecognitionEngine: Send + Sync {
    /// Recognizes the text in `image`.
    ///
    /// # Errors
    ///
    /// Returns [`OcrError`] if the image cannot be recognized.
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;

    /// Short name used in log output.
    fn name(&self) -> &'static str {
        "ocr"
    }
}
