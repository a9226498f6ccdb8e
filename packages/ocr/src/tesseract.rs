//! Tesseract-backed [`RecognitionEngine`].
//!
//! Only available when compiled with the `tesseract` feature, which links
//! against the system `libtesseract`.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::DynamicImage;
use tesseract::Tesseract;

use crate::{OcrError, RecognitionEngine};

/// Page segmentation mode 6: assume a single uniform block of text.
const PAGE_SEG_MODE: &str = "6";

/// A Tesseract instance initialized once and reused across calls.
///
/// The underlying API is not thread-safe, so calls are serialized through a
/// mutex. An instance consumed by a failed call is rebuilt on the next one.
pub struct TesseractEngine {
    tessdata_dir: Option<PathBuf>,
    language: String,
    instance: Mutex<Option<Tesseract>>,
}

impl std::fmt::Debug for TesseractEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TesseractEngine")
            .field("tessdata_dir", &self.tessdata_dir)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl TesseractEngine {
    /// Initializes Tesseract for `language` (e.g. `"eng"`).
    ///
    /// When `tessdata_dir` is `None` the library's compiled-in default
    /// location is used.
    ///
    /// # Errors
    ///
    /// Returns [`OcrError::LanguageDataNotFound`] if `tessdata_dir` lacks the
    /// language's traineddata file, or [`OcrError::Init`] if Tesseract
    /// cannot start.
    pub fn new(tessdata_dir: Option<&Path>, language: &str) -> Result<Self, OcrError> {
        if let Some(dir) = tessdata_dir {
            let traineddata = dir.join(format!("{language}.traineddata"));
            if !traineddata.exists() {
                return Err(OcrError::LanguageDataNotFound(traineddata));
            }
        }

        let engine = Self {
            tessdata_dir: tessdata_dir.map(Path::to_path_buf),
            language: language.to_owned(),
            instance: Mutex::new(None),
        };

        let instance = engine.init()?;
        *engine.lock() = Some(instance);

        log::info!("Initialized Tesseract ({language})");

        Ok(engine)
    }

    fn init(&self) -> Result<Tesseract, OcrError> {
        let datapath = match &self.tessdata_dir {
            Some(dir) => Some(
                dir.to_str()
                    .ok_or_else(|| OcrError::Init("tessdata path is not UTF-8".to_owned()))?,
            ),
            None => None,
        };

        Tesseract::new(datapath, Some(&self.language))
            .map_err(|e| OcrError::Init(format!("{e:?}")))?
            .set_variable("tessedit_pageseg_mode", PAGE_SEG_MODE)
            .map_err(|e| OcrError::Init(format!("{e:?}")))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Tesseract>> {
        self.instance
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RecognitionEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, image::ImageFormat::Png)
            .map_err(|e| OcrError::Image(format!("PNG encode failed: {e}")))?;

        let mut slot = self.lock();
        let instance = match slot.take() {
            Some(instance) => instance,
            None => {
                log::warn!("Rebuilding Tesseract instance after earlier failure");
                self.init()?
            }
        };

        let mut instance = instance
            .set_image_from_mem(png.get_ref())
            .map_err(|e| OcrError::Image(format!("{e:?}")))?;

        let text = instance
            .get_text()
            .map_err(|e| OcrError::Recognition(format!("{e:?}")))?;

        *slot = Some(instance);

        Ok(text)
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}
