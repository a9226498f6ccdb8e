#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Document, segment, and extraction record types.
//!
//! A fetched report enters the extractor as a [`RawDocument`], is flattened
//! into a [`NormalizedText`], split into [`RecordSegment`]s, and leaves as
//! one [`ExtractionRecord`] per segment. None of these values outlive a
//! single document's processing and none of them are shared between
//! documents.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Keys that [`ExtractionRecord::to_flat_json`] writes alongside the
/// extracted fields. Profiles may not declare fields with these names.
pub const RESERVED_KEYS: &[&str] = &[
    "validation_warnings",
    "is_structured",
    "extraction_method",
    "start_marker",
];

/// Warning attached to a record whose trailing continuation marker never
/// found a successor segment to merge with.
pub const INCOMPLETE_CONTINUATION: &str = "incomplete_continuation";

/// Separates the cells of a table row within one line of normalized text.
///
/// Multi-column table rows are flattened to a single line with their cells
/// joined by this character, so column position survives normalization.
pub const CELL_SEPARATOR: char = '\t';

/// The format of a fetched document.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SourceKind {
    /// A PDF byte stream.
    Pdf,
    /// An HTML page.
    Html,
}

/// An immutable document payload as handed over by a fetching
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    bytes: Vec<u8>,
    source_kind: SourceKind,
}

impl RawDocument {
    /// Wraps `bytes` as a document of the given kind.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>, source_kind: SourceKind) -> Self {
        Self {
            bytes: bytes.into(),
            source_kind,
        }
    }

    /// Wraps a PDF byte stream.
    #[must_use]
    pub fn pdf(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(bytes, SourceKind::Pdf)
    }

    /// Wraps an HTML page.
    #[must_use]
    pub fn html(markup: impl Into<String>) -> Self {
        Self::new(markup.into().into_bytes(), SourceKind::Html)
    }

    /// The raw payload.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The payload format.
    #[must_use]
    pub const fn source_kind(&self) -> SourceKind {
        self.source_kind
    }
}

/// Which normalization stage produced a [`NormalizedText`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum TextOrigin {
    /// Direct extraction from the PDF text layer or the HTML markup.
    TextLayer,
    /// Optical character recognition of the rasterized first page.
    Ocr {
        /// Clockwise rotation (in degrees) applied before recognition.
        rotation: u16,
    },
}

impl TextOrigin {
    /// Whether the text came from the noisier OCR stage.
    #[must_use]
    pub const fn is_ocr(&self) -> bool {
        matches!(self, Self::Ocr { .. })
    }

    /// Short label describing the stage, e.g. `"text"` or
    /// `"ocr_rotated_90"`.
    #[must_use]
    pub fn method_label(&self) -> String {
        match self {
            Self::TextLayer => "text".to_owned(),
            Self::Ocr { rotation } => format!("ocr_rotated_{rotation}"),
        }
    }
}

/// Plain, newline-delimited text with encoding artifacts removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    text: String,
    origin: TextOrigin,
}

impl NormalizedText {
    /// Creates a normalized text produced by `origin`.
    #[must_use]
    pub const fn new(text: String, origin: TextOrigin) -> Self {
        Self { text, origin }
    }

    /// The full text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The stage that produced this text.
    #[must_use]
    pub const fn origin(&self) -> TextOrigin {
        self.origin
    }

    /// Iterates over the lines of the text.
    pub fn lines(&self) -> std::str::Lines<'_> {
        self.text.lines()
    }
}

/// One logical record (a deficiency, a citation, a report) cut out of a
/// normalized document.
///
/// `raw_lines` starts with the marker line that opened the segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSegment {
    /// Identifier of the marker that opened this segment.
    pub marker_id: String,
    /// The marker line as it appeared in the document.
    pub start_marker: String,
    /// Lines belonging to this segment, in document order.
    pub raw_lines: Vec<String>,
    /// Whether the segment ends on a continuation marker and expects its
    /// successor to be folded into it.
    pub continuation_pending: bool,
    /// Non-fatal anomalies noticed while segmenting or merging.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl RecordSegment {
    /// Starts a new segment at `start_marker`.
    #[must_use]
    pub fn new(marker_id: &str, start_marker: &str) -> Self {
        Self {
            marker_id: marker_id.to_owned(),
            start_marker: start_marker.to_owned(),
            raw_lines: vec![start_marker.to_owned()],
            continuation_pending: false,
            warnings: Vec::new(),
        }
    }

    /// Starts a new segment at marker line `line`.
    ///
    /// For a table row only the first cell is the marker; the remaining
    /// cells stay on the segment's first line.
    #[must_use]
    pub fn opened_by(marker_id: &str, line: &str) -> Self {
        let line = line.trim();
        let header = line.split(CELL_SEPARATOR).next().unwrap_or(line).trim();
        Self {
            raw_lines: vec![line.to_owned()],
            ..Self::new(marker_id, header)
        }
    }

    /// Lines after the opening marker line.
    #[must_use]
    pub fn body_lines(&self) -> &[String] {
        self.raw_lines.get(1..).unwrap_or_default()
    }

    /// The segment's lines joined with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.raw_lines.join("\n")
    }
}

/// The value type a field is parsed into.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
    /// Parsed as a signed integer.
    Integer,
    /// Whitespace-normalized string.
    #[default]
    Text,
    /// A list of whitespace-normalized strings.
    TextList,
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// An integer count.
    Integer(i64),
    /// A single string.
    Text(String),
    /// A list of strings.
    TextList(Vec<String>),
}

impl FieldValue {
    /// Returns the integer value, if this is an integer.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string value, if this is a single string.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(items) => Some(items),
            _ => None,
        }
    }

    /// The value's kind.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Integer(_) => FieldKind::Integer,
            Self::Text(_) => FieldKind::Text,
            Self::TextList(_) => FieldKind::TextList,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::TextList(items) => f.write_str(&items.join("; ")),
        }
    }
}

/// How much a matched value should be trusted, as declared by the
/// pattern that produced it.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Confidence {
    /// Permissive pattern that may pick up stray numbers or text.
    Low,
    /// Reasonably anchored pattern.
    #[default]
    Medium,
    /// Strict layout-specific pattern.
    High,
}

/// The outcome of matching one field against one segment.
///
/// A field that no pattern matched is still present, with `value` set to
/// `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedField {
    /// Field name.
    pub name: String,
    /// Parsed value, `None` when no pattern matched.
    pub value: Option<FieldValue>,
    /// Identifier of the pattern that produced `value`.
    pub matched_pattern_id: Option<String>,
    /// Confidence declared by that pattern.
    pub confidence: Option<Confidence>,
}

impl ExtractedField {
    /// A field that no pattern matched.
    #[must_use]
    pub fn absent(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            value: None,
            matched_pattern_id: None,
            confidence: None,
        }
    }

    /// A field filled by the pattern `pattern_id`.
    #[must_use]
    pub fn matched(
        name: &str,
        value: FieldValue,
        pattern_id: &str,
        confidence: Confidence,
    ) -> Self {
        Self {
            name: name.to_owned(),
            value: Some(value),
            matched_pattern_id: Some(pattern_id.to_owned()),
            confidence: Some(confidence),
        }
    }

    /// Whether a pattern filled this field.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

/// The fields extracted from one segment plus any warnings raised about
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Every field declared by the profile, keyed by name.
    pub fields: BTreeMap<String, ExtractedField>,
    /// Human-readable warnings for review. Never cause the record to be
    /// dropped.
    pub validation_warnings: Vec<String>,
    /// `false` when the document had no recognizable section markers and
    /// the whole text was treated as one record.
    pub is_structured: bool,
    /// Marker line that opened the segment, if any.
    pub start_marker: Option<String>,
    /// Normalization stage that produced the underlying text.
    pub origin: TextOrigin,
}

impl ExtractionRecord {
    /// Creates an empty record.
    #[must_use]
    pub const fn new(origin: TextOrigin, is_structured: bool, start_marker: Option<String>) -> Self {
        Self {
            fields: BTreeMap::new(),
            validation_warnings: Vec::new(),
            is_structured,
            start_marker,
            origin,
        }
    }

    /// Inserts (or replaces) a field.
    pub fn insert(&mut self, field: ExtractedField) {
        self.fields.insert(field.name.clone(), field);
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&ExtractedField> {
        self.fields.get(name)
    }

    /// Looks up a field's value by name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).and_then(|f| f.value.as_ref())
    }

    /// Looks up an integer field's value by name.
    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(FieldValue::as_integer)
    }

    /// Looks up a string field's value by name.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(FieldValue::as_text)
    }

    /// Appends a warning.
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.validation_warnings.push(warning.into());
    }

    /// Whether at least one field has a value.
    #[must_use]
    pub fn has_any_value(&self) -> bool {
        self.fields.values().any(ExtractedField::is_present)
    }

    /// Renders the record as a flat JSON object: one key per field (null
    /// when absent) plus the reserved metadata keys.
    #[must_use]
    pub fn to_flat_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (name, field) in &self.fields {
            let value = field
                .value
                .as_ref()
                .and_then(|v| serde_json::to_value(v).ok())
                .unwrap_or(serde_json::Value::Null);
            map.insert(name.clone(), value);
        }

        map.insert(
            "validation_warnings".to_owned(),
            serde_json::Value::Array(
                self.validation_warnings
                    .iter()
                    .cloned()
                    .map(serde_json::Value::String)
                    .collect(),
            ),
        );
        map.insert(
            "is_structured".to_owned(),
            serde_json::Value::Bool(self.is_structured),
        );
        map.insert(
            "extraction_method".to_owned(),
            serde_json::Value::String(self.origin.method_label()),
        );
        map.insert(
            "start_marker".to_owned(),
            self.start_marker
                .clone()
                .map_or(serde_json::Value::Null, serde_json::Value::String),
        );

        serde_json::Value::Object(map)
    }
}
