//! Field pattern matching.
//!
//! Every field carries an ordered list of candidate [`Matcher`]s, strictest
//! first. They are tried in declaration order and the first one that
//! produces a usable value wins; later, looser matchers only get a chance
//! when the stricter ones miss. OCR text gets its own matcher list, since
//! the recognizer scrambles line structure and spacing.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::LazyLock;

use inspection_extract_models::{
    CELL_SEPARATOR, Confidence, ExtractedField, FieldKind, FieldValue,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::casing::smart_title_case;

static NONE_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:none|n/?a|not applicable)\W*$").unwrap_or_else(|_| unreachable!())
});

/// Where a field is looked for.
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
pub enum FieldScope {
    /// Matched separately in every segment.
    #[default]
    Segment,
    /// Matched once against the whole document and copied into every
    /// record, e.g. a facility number printed in the report header.
    Document,
}

/// One candidate rule for a field.
#[derive(Debug, Clone)]
pub struct Matcher {
    /// Identifier reported as `matched_pattern_id`.
    pub id: String,
    /// Compiled pattern.
    pub regex: Regex,
    /// Capture group holding the value.
    pub group: usize,
    /// Confidence attached to values this matcher produces.
    pub confidence: Confidence,
    /// When set, the pattern only sees this table column (1-based): the
    /// matching cell of every cell-separated row, one per line.
    pub column: Option<NonZeroUsize>,
}

impl Matcher {
    /// Captures this matcher's value text from `text`.
    fn capture<'t>(&self, text: &'t str) -> Option<Cow<'t, str>> {
        match self.column {
            None => {
                let captured = self.regex.captures(text)?.get(self.group)?;
                Some(Cow::Borrowed(captured.as_str()))
            }
            Some(column) => {
                let cells = table_column(text, column);
                if cells.is_empty() {
                    return None;
                }
                let captured = self.regex.captures(&cells)?.get(self.group)?;
                Some(Cow::Owned(captured.as_str().to_owned()))
            }
        }
    }
}

/// The non-empty cells of `column` (1-based) in every table row of `text`,
/// one per line. Lines that are not table rows are skipped.
#[must_use]
pub fn table_column(text: &str, column: NonZeroUsize) -> String {
    text.lines()
        .filter(|line| line.contains(CELL_SEPARATOR))
        .filter_map(|line| line.split(CELL_SEPARATOR).nth(column.get() - 1))
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cuts `text` at every match of `start`. Without any match the whole text
/// is a single item.
fn split_at_starts<'t>(text: &'t str, start: &Regex) -> Vec<&'t str> {
    let starts: Vec<usize> = start.find_iter(text).map(|found| found.start()).collect();
    if starts.is_empty() {
        return vec![text];
    }
    starts
        .iter()
        .zip(starts.iter().skip(1).copied().chain(std::iter::once(text.len())))
        .map(|(&from, to)| &text[from..to])
        .collect()
}

/// A field and its ordered candidate matchers.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    /// Field name.
    pub name: String,
    /// Value type.
    pub kind: FieldKind,
    /// Where the field is looked for.
    pub scope: FieldScope,
    /// Rank among the profile's fields. Lower ranks come first in output.
    pub priority: u32,
    /// Title-case all-caps string values.
    pub title_case: bool,
    /// Splits a matched list section into items. `None` splits on lines.
    pub item_separator: Option<Regex>,
    /// Each match begins a new list item and stays part of it. Text before
    /// the first match is dropped. Takes precedence over `item_separator`.
    pub item_start: Option<Regex>,
    /// List items shorter than this are dropped.
    pub min_item_len: usize,
    /// Matchers for text-layer input, in priority order.
    pub text: Vec<Matcher>,
    /// Matchers for OCR input, in priority order. Empty reuses `text`.
    pub ocr: Vec<Matcher>,
}

impl FieldPattern {
    /// The matcher list used for text from the given stage.
    #[must_use]
    pub fn matchers(&self, ocr: bool) -> &[Matcher] {
        if ocr && !self.ocr.is_empty() {
            &self.ocr
        } else {
            &self.text
        }
    }

    /// Tries each matcher in order and returns the first usable value along
    /// with the matcher that produced it.
    #[must_use]
    pub fn first_match(&self, text: &str, ocr: bool) -> Option<(&Matcher, FieldValue)> {
        self.matchers(ocr).iter().find_map(|matcher| {
            let captured = matcher.capture(text)?;
            self.parse(&captured).map(|value| (matcher, value))
        })
    }

    /// Matches this field against `text`. A field nothing matches is
    /// returned with no value.
    #[must_use]
    pub fn extract_from(&self, text: &str, ocr: bool) -> ExtractedField {
        match self.first_match(text, ocr) {
            Some((matcher, value)) => {
                log::debug!("{} matched by '{}': {value}", self.name, matcher.id);
                ExtractedField::matched(&self.name, value, &matcher.id, matcher.confidence)
            }
            None => {
                log::debug!("{} not matched", self.name);
                ExtractedField::absent(&self.name)
            }
        }
    }

    /// Parses captured text into this field's type. `None` means the capture
    /// is unusable and the next matcher should be tried.
    fn parse(&self, captured: &str) -> Option<FieldValue> {
        match self.kind {
            FieldKind::Integer => captured
                .trim()
                .replace(',', "")
                .parse::<i64>()
                .ok()
                .map(FieldValue::Integer),
            FieldKind::Text => {
                let value = collapse_whitespace(captured);
                if value.is_empty() {
                    None
                } else if self.title_case {
                    Some(FieldValue::Text(smart_title_case(&value)))
                } else {
                    Some(FieldValue::Text(value))
                }
            }
            FieldKind::TextList => self.parse_list(captured).map(FieldValue::TextList),
        }
    }

    fn parse_list(&self, captured: &str) -> Option<Vec<String>> {
        let whole = collapse_whitespace(captured);
        if whole.is_empty() {
            return None;
        }
        if NONE_LIST.is_match(&whole) {
            return Some(Vec::new());
        }

        let items: Vec<String> = match (&self.item_start, &self.item_separator) {
            (Some(start), _) => split_at_starts(captured, start)
                .into_iter()
                .map(collapse_whitespace)
                .collect(),
            (None, Some(separator)) => separator.split(captured).map(collapse_whitespace).collect(),
            (None, None) => captured.lines().map(collapse_whitespace).collect(),
        };

        let items: Vec<String> = items
            .into_iter()
            .filter(|item| item.chars().count() >= self.min_item_len.max(1))
            .map(|item| {
                if self.title_case {
                    smart_title_case(&item)
                } else {
                    item
                }
            })
            .collect();

        if items.is_empty() { None } else { Some(items) }
    }
}

/// Collapses runs of whitespace to single spaces and trims.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Matches every field in `fields` against `text`.
///
/// Every field appears in the result, with no value when nothing matched.
/// `ocr` selects the OCR matcher lists.
#[must_use]
pub fn extract<'a>(
    text: &str,
    fields: impl IntoIterator<Item = &'a FieldPattern>,
    ocr: bool,
) -> BTreeMap<String, ExtractedField> {
    fields
        .into_iter()
        .map(|field| (field.name.clone(), field.extract_from(text, ocr)))
        .collect()
}
