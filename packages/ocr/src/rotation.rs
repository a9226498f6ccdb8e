//! Right-angle rotation sweep.

use image::DynamicImage;

use crate::{OcrError, RecognitionEngine};

/// Clockwise rotation applied to a page image before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// Upright.
    Deg0,
    /// Quarter turn clockwise.
    Deg90,
    /// Upside down.
    Deg180,
    /// Quarter turn counter-clockwise.
    Deg270,
}

impl Rotation {
    /// Every rotation in the order the sweep tries them.
    pub const ALL: [Self; 4] = [Self::Deg0, Self::Deg90, Self::Deg180, Self::Deg270];

    /// The rotation in degrees.
    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Returns `image` rotated by this amount.
    #[must_use]
    pub fn apply(self, image: &DynamicImage) -> DynamicImage {
        match self {
            Self::Deg0 => image.clone(),
            Self::Deg90 => image.rotate90(),
            Self::Deg180 => image.rotate180(),
            Self::Deg270 => image.rotate270(),
        }
    }
}

/// The reading kept by [`sweep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Recognized text.
    pub text: String,
    /// Rotation that produced it.
    pub rotation: Rotation,
    /// Whether `accept` approved this reading.
    pub accepted: bool,
}

/// Recognizes `image` at each rotation in [`Rotation::ALL`].
///
/// Stops at the first reading for which `accept` returns `true`. Otherwise
/// keeps the longest reading. A failure at one rotation is logged and the
/// sweep moves on to the next.
///
/// Returns `Ok(None)` when every rotation produced blank text.
///
/// # Errors
///
/// Returns the last [`OcrError`] if recognition failed at every rotation.
pub fn sweep(
    engine: &dyn RecognitionEngine,
    image: &DynamicImage,
    accept: impl Fn(&str) -> bool,
) -> Result<Option<SweepOutcome>, OcrError> {
    let mut best: Option<SweepOutcome> = None;
    let mut last_error = None;
    let mut any_success = false;

    for rotation in Rotation::ALL {
        let rotated = rotation.apply(image);
        let text = match engine.recognize(&rotated) {
            Ok(text) => text,
            Err(e) => {
                log::warn!(
                    "{} failed at {} degrees: {e}",
                    engine.name(),
                    rotation.degrees()
                );
                last_error = Some(e);
                continue;
            }
        };
        any_success = true;

        let len = text.trim().chars().count();
        log::debug!(
            "{} read {len} characters at {} degrees",
            engine.name(),
            rotation.degrees()
        );

        if len == 0 {
            continue;
        }

        if accept(&text) {
            return Ok(Some(SweepOutcome {
                text,
                rotation,
                accepted: true,
            }));
        }

        let longer = best
            .as_ref()
            .is_none_or(|b| len > b.text.trim().chars().count());
        if longer {
            best = Some(SweepOutcome {
                text,
                rotation,
                accepted: false,
            });
        }
    }

    match (best, last_error) {
        (Some(best), _) => Ok(Some(best)),
        (None, Some(e)) if !any_success => Err(e),
        (None, _) => Ok(None),
    }
}
