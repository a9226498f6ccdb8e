//! Document normalization.
//!
//! Stage 1 reads the document's own text: the PDF text layer, or the HTML
//! with tags stripped. Only when that comes back blank does stage 2 run:
//! the first PDF page is rasterized and read by the [`RecognitionEngine`]
//! at each right-angle rotation. Both stages finish with
//! [`charset::clean`](crate::charset::clean).

use std::sync::Arc;

use inspection_extract_models::{NormalizedText, RawDocument, SourceKind, TextOrigin};
use inspection_extract_ocr::{RecognitionEngine, sweep};
use inspection_extract_pdf::{EmbeddedImageRasterizer, PageRasterizer};

use crate::ExtractError;
use crate::charset::clean;
use crate::html::html_to_text;

/// Turns [`RawDocument`]s into [`NormalizedText`].
///
/// Holds the shared recognition engine, if any. Build one normalizer per
/// process and share it; it carries no per-document state.
#[derive(Clone)]
pub struct Normalizer {
    engine: Option<Arc<dyn RecognitionEngine>>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("engine", &self.engine.as_ref().map(|e| e.name()))
            .finish_non_exhaustive()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// A normalizer without OCR. Scanned PDFs fail with
    /// [`ExtractError::EmptyDocument`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: None,
            rasterizer: Arc::new(EmbeddedImageRasterizer),
        }
    }

    /// Enables the OCR fallback with `engine`.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn RecognitionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replaces the page rasterizer used for OCR.
    #[must_use]
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Whether `raw` could go through the OCR stage.
    #[must_use]
    pub fn can_ocr(&self, raw: &RawDocument) -> bool {
        self.engine.is_some() && raw.source_kind() == SourceKind::Pdf
    }

    /// Normalizes `raw`, trying the text layer first and OCR second.
    ///
    /// `plausible` decides whether an OCR reading is good enough to stop
    /// the rotation sweep early.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::EmptyDocument`] if no stage yields text.
    pub fn normalize(
        &self,
        raw: &RawDocument,
        plausible: impl Fn(&str) -> bool,
    ) -> Result<NormalizedText, ExtractError> {
        if let Some(text) = self.text_layer(raw) {
            log::debug!(
                "Normalized {} document from text layer ({} chars)",
                raw.source_kind(),
                text.as_str().len()
            );
            return Ok(text);
        }

        if let Some(text) = self.ocr(raw, plausible) {
            return Ok(text);
        }

        Err(ExtractError::EmptyDocument)
    }

    /// Stage 1: the document's own text, or `None` if it is blank.
    #[must_use]
    pub fn text_layer(&self, raw: &RawDocument) -> Option<NormalizedText> {
        let text = match raw.source_kind() {
            SourceKind::Pdf => match inspection_extract_pdf::extract_text(raw.bytes()) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("Text layer unavailable: {e}");
                    return None;
                }
            },
            SourceKind::Html => html_to_text(&String::from_utf8_lossy(raw.bytes())),
        };

        let text = clean(&text);
        if text.trim().is_empty() {
            None
        } else {
            Some(NormalizedText::new(text, TextOrigin::TextLayer))
        }
    }

    /// Stage 2: OCR of the first page, or `None` if OCR is unavailable or
    /// reads nothing.
    pub fn ocr(
        &self,
        raw: &RawDocument,
        plausible: impl Fn(&str) -> bool,
    ) -> Option<NormalizedText> {
        let engine = self.engine.as_deref()?;
        if raw.source_kind() != SourceKind::Pdf {
            return None;
        }

        let image = match self.rasterizer.rasterize_first_page(raw.bytes()) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Could not rasterize first page for OCR: {e}");
                return None;
            }
        };

        match sweep(engine, &image, |text| plausible(&clean(text))) {
            Ok(Some(outcome)) => {
                let rotation = outcome.rotation.degrees();
                log::info!(
                    "OCR read {} chars at {rotation} degrees{}",
                    outcome.text.len(),
                    if outcome.accepted { "" } else { " (no field matched)" }
                );
                Some(NormalizedText::new(
                    clean(&outcome.text),
                    TextOrigin::Ocr { rotation },
                ))
            }
            Ok(None) => {
                log::warn!("OCR produced no text at any rotation");
                None
            }
            Err(e) => {
                log::warn!("OCR failed at every rotation: {e}");
                None
            }
        }
    }
}
