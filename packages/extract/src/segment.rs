//! Section segmentation.
//!
//! Splits a normalized document into one [`RecordSegment`] per logical
//! record. A segment starts at every line matching one of the profile's
//! markers and runs until the next such line. Text before the first marker
//! is front matter and is dropped. On table rows only the first cell is
//! tested against the markers.

use inspection_extract_models::{CELL_SEPARATOR, NormalizedText, RecordSegment};
use regex::Regex;

/// Default length below which a pure-digit line is treated as page or line
/// numbering rather than a record marker.
pub const DEFAULT_MIN_NUMERIC_MARKER_LEN: usize = 5;

/// Rows of space-separated numbers at least this long are content, not a
/// numbering column.
const MAX_NUMBERING_ROW_LEN: usize = 50;

/// A compiled section-header marker.
#[derive(Debug, Clone)]
pub struct Marker {
    /// Identifier recorded on every segment this marker opens.
    pub id: String,
    /// Pattern tested against each trimmed line.
    pub regex: Regex,
}

/// Compiled segmentation settings from a profile.
#[derive(Debug, Clone)]
pub struct SegmentRules {
    /// Markers in priority order. The first one matching a line wins.
    pub markers: Vec<Marker>,
    /// See [`is_numbering_artifact`].
    pub min_numeric_marker_len: usize,
}

impl Default for SegmentRules {
    fn default() -> Self {
        Self {
            markers: Vec::new(),
            min_numeric_marker_len: DEFAULT_MIN_NUMERIC_MARKER_LEN,
        }
    }
}

/// Whether `line` is page or line numbering left behind by the PDF layout.
///
/// That is a line made only of digits and whitespace which is either a
/// single number shorter than `min_len`, or a short row of several numbers
/// (a line-number column flattened onto one line).
#[must_use]
pub fn is_numbering_artifact(line: &str, min_len: usize) -> bool {
    let line = line.trim();
    if line.is_empty() || !line.chars().all(|c| c.is_ascii_digit() || c.is_whitespace()) {
        return false;
    }

    if line.contains(char::is_whitespace) {
        line.len() < MAX_NUMBERING_ROW_LEN
    } else {
        line.len() < min_len
    }
}

/// Splits `text` into segments at marker lines.
///
/// Returns an empty list when no line matches a marker, which callers treat
/// as an unstructured document.
#[must_use]
pub fn segment(text: &NormalizedText, rules: &SegmentRules) -> Vec<RecordSegment> {
    let mut segments: Vec<RecordSegment> = Vec::new();

    for line in text.lines() {
        let head = line.split(CELL_SEPARATOR).next().unwrap_or(line).trim();

        let marker = if head.is_empty()
            || is_numbering_artifact(head, rules.min_numeric_marker_len)
        {
            None
        } else {
            rules.markers.iter().find(|m| m.regex.is_match(head))
        };

        if let Some(marker) = marker {
            segments.push(RecordSegment::opened_by(&marker.id, line));
        } else if let Some(current) = segments.last_mut() {
            current.raw_lines.push(line.to_owned());
        }
    }

    log::debug!("Segmented document into {} segments", segments.len());

    segments
}
