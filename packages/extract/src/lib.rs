#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Structured field extraction from inspection reports.
//!
//! Licensing agencies publish inspection reports as PDFs (sometimes
//! scanned, sometimes sideways) or HTML pages with little consistent
//! structure. This crate turns one such document into a list of
//! [`ExtractionRecord`]s:
//!
//! 1. [`normalize`] flattens the document into clean plain text, falling
//!    back to OCR when the PDF has no text layer.
//! 2. [`segment`] cuts the text into one block per deficiency, citation,
//!    or report, using the profile's section markers.
//! 3. [`continuation`] folds blocks split by page breaks back together.
//! 4. [`pattern`] fills each field from an ordered list of candidate
//!    regexes, first match wins.
//! 5. [`validate`] flags suspicious combinations without discarding them.
//!
//! What to look for in a given agency's reports is described by an
//! [`ExtractionProfile`], loaded from TOML (see [`registry`] for the
//! built-in ones). The [`Extractor`] in [`pipeline`] ties it all together.

pub mod batch;
pub mod casing;
pub mod charset;
pub mod continuation;
pub mod html;
pub mod normalize;
pub mod pattern;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod registry;
pub mod segment;
pub mod validate;

pub use batch::{DocumentOutcome, extract_batch};
pub use inspection_extract_models::{
    Confidence, ExtractedField, ExtractionRecord, FieldKind, FieldValue, NormalizedText,
    RawDocument, RecordSegment, SourceKind, TextOrigin,
};
pub use normalize::Normalizer;
pub use pipeline::Extractor;
pub use profile::{ExtractionProfile, ProfileDefinition, parse_profile_toml};

/// Errors raised while processing a single document.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Neither the text layer nor OCR produced any usable text. The
    /// document should be logged and skipped.
    #[error("Document yielded no extractable text")]
    EmptyDocument,
}

/// Errors raised while loading or compiling an extraction profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The TOML document could not be deserialized.
    #[error("Failed to parse profile {name}: {message}")]
    Parse {
        /// Profile file or registry name.
        name: String,
        /// Deserializer message.
        message: String,
    },

    /// A pattern failed to compile.
    #[error("Invalid pattern '{id}': {source}")]
    Pattern {
        /// Identifier of the offending pattern.
        id: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// A matcher refers to a capture group its pattern does not have.
    #[error("Pattern '{id}' has no capture group {group}")]
    MissingGroup {
        /// Identifier of the offending pattern.
        id: String,
        /// Requested group index.
        group: usize,
    },

    /// Two fields share a name.
    #[error("Duplicate field '{0}'")]
    DuplicateField(String),

    /// A field uses a name reserved for record metadata.
    #[error("Field name '{0}' is reserved")]
    ReservedField(String),

    /// A validation rule names a field the profile does not declare.
    #[error("Validation rule references unknown field '{0}'")]
    UnknownField(String),

    /// A validation rule names a field that is not an integer.
    #[error("Validation rule field '{0}' is not an integer field")]
    NonIntegerField(String),

    /// No built-in profile has the requested id.
    #[error("Unknown profile '{0}'")]
    UnknownProfile(String),

    /// A profile file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
