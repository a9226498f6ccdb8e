//! Continuation merging.
//!
//! Long deficiencies often run across a page break. The report generator
//! then prints a "continued on next page" notice at the bottom of one page
//! and repeats the section header at the top of the next, which the
//! segmenter sees as a new record. [`merge`] detects these notices and folds
//! the continuation back into the record it belongs to.

use inspection_extract_models::{CELL_SEPARATOR, INCOMPLETE_CONTINUATION, RecordSegment};
use regex::Regex;

use crate::segment::{DEFAULT_MIN_NUMERIC_MARKER_LEN, is_numbering_artifact};

/// Continuation notices recognized when a profile does not list its own.
pub const DEFAULT_MARKERS: &[&str] = &["CONTINUED ON NEXT PAGE", "****CONTINUED", "SEE NEXT PAGE"];

/// Only this many trailing characters are searched for a notice.
const TAIL_WINDOW: usize = 100;

/// A notice followed by more than this much text is not at the segment end.
const MAX_TEXT_AFTER_MARKER: usize = 50;

/// Compiled continuation settings from a profile.
#[derive(Debug, Clone)]
pub struct ContinuationRules {
    /// Lowercased notice phrases.
    markers: Vec<String>,
    /// Matches any notice phrase, for stripping after a merge.
    marker_regex: Option<Regex>,
    /// Whether a segment whose last line ends with `:` is continued.
    trailing_colon: bool,
    /// Extra patterns removed from merged text, such as page footers.
    strip: Vec<Regex>,
    /// Threshold passed to [`is_numbering_artifact`].
    min_numeric_len: usize,
}

impl ContinuationRules {
    /// Builds rules from notice phrases and strip patterns.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if the phrases cannot be combined into a
    /// single pattern.
    pub fn new(
        markers: &[String],
        trailing_colon: bool,
        strip: Vec<Regex>,
        min_numeric_len: usize,
    ) -> Result<Self, regex::Error> {
        let marker_regex = if markers.is_empty() {
            None
        } else {
            let alternatives = markers
                .iter()
                .map(|m| regex::escape(m))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!("(?i)(?:{alternatives})"))?)
        };

        Ok(Self {
            markers: markers.iter().map(|m| m.to_lowercase()).collect(),
            marker_regex,
            trailing_colon,
            strip,
            min_numeric_len,
        })
    }

    fn is_noise(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.is_empty()
            || is_numbering_artifact(trimmed, self.min_numeric_len)
            || self
                .strip
                .iter()
                .any(|re| re.find(trimmed).is_some_and(|m| m.as_str() == trimmed))
    }
}

impl Default for ContinuationRules {
    fn default() -> Self {
        let markers: Vec<String> = DEFAULT_MARKERS.iter().map(|m| (*m).to_owned()).collect();
        Self::new(&markers, true, Vec::new(), DEFAULT_MIN_NUMERIC_MARKER_LEN)
            .unwrap_or_else(|_| unreachable!())
    }
}

/// Whether `segment` ends on a continuation notice.
///
/// Trailing blank lines and page/line numbering are ignored. The segment is
/// continued when a notice phrase appears in its last [`TAIL_WINDOW`]
/// characters with little text after it, or when `trailing_colon` is set
/// and the last line introduces a list that never arrives. When the last
/// line is a table row, each of its cells is also checked on its own.
#[must_use]
pub fn is_continuation_pending(segment: &RecordSegment, rules: &ContinuationRules) -> bool {
    let content: Vec<&str> = segment
        .raw_lines
        .iter()
        .map(String::as_str)
        .rev()
        .skip_while(|line| rules.is_noise(line))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let Some(last_line) = content.last() else {
        return false;
    };

    if rules.trailing_colon && last_line.trim_end().ends_with(':') {
        return true;
    }

    let joined = content.join("\n");
    let cells = last_line.split(CELL_SEPARATOR).skip(1);

    std::iter::once(joined.as_str())
        .chain(cells)
        .any(|text| ends_on_notice(text, rules))
}

fn ends_on_notice(text: &str, rules: &ContinuationRules) -> bool {
    let lowered = text.to_lowercase();
    let tail = tail_chars(&lowered, TAIL_WINDOW);

    rules.markers.iter().any(|marker| {
        tail.rfind(marker.as_str()).is_some_and(|pos| {
            tail[pos + marker.len()..].trim().chars().count() < MAX_TEXT_AFTER_MARKER
        })
    })
}

fn tail_chars(s: &str, n: usize) -> &str {
    let start = s
        .char_indices()
        .rev()
        .nth(n.saturating_sub(1))
        .map_or(0, |(i, _)| i);
    &s[start..]
}

/// Folds continuation fragments into the records they continue.
///
/// Segments are flagged with [`is_continuation_pending`] and processed in
/// document order. A flagged segment absorbs the body of its successor
/// (without the successor's repeated header, though the other cells of a
/// header table row are kept) and takes over the
/// successor's flag, so chains of any length fold into one record. Merged
/// records have notice phrases, numbering artifacts, and strip patterns
/// removed.
///
/// If the last segment is still flagged, the flag is cleared and an
/// [`INCOMPLETE_CONTINUATION`] warning is attached.
#[must_use]
pub fn merge(segments: Vec<RecordSegment>, rules: &ContinuationRules) -> Vec<RecordSegment> {
    let mut merged: Vec<RecordSegment> = Vec::with_capacity(segments.len());
    let mut joined_into: Vec<bool> = Vec::with_capacity(segments.len());
    let mut merges = 0_usize;

    for mut segment in segments {
        segment.continuation_pending = is_continuation_pending(&segment, rules);

        match merged.last_mut() {
            Some(current) if current.continuation_pending => {
                let mut lines = segment.raw_lines.into_iter();
                let repeated_header = lines.next();
                current
                    .raw_lines
                    .extend(repeated_header.as_deref().and_then(trailing_cells));
                current.raw_lines.extend(lines);
                current.warnings.extend(segment.warnings);
                current.continuation_pending = segment.continuation_pending;
                if let Some(flag) = joined_into.last_mut() {
                    *flag = true;
                }
                merges += 1;
            }
            _ => {
                merged.push(segment);
                joined_into.push(false);
            }
        }
    }

    for (segment, was_merged) in merged.iter_mut().zip(&joined_into) {
        if *was_merged {
            strip_artifacts(segment, rules);
        }
    }

    if let Some(last) = merged.last_mut().filter(|s| s.continuation_pending) {
        log::debug!(
            "Segment '{}' ends on a continuation with no successor",
            last.start_marker
        );
        last.continuation_pending = false;
        last.warnings.push(INCOMPLETE_CONTINUATION.to_owned());
    }

    log::debug!(
        "Merged {merges} continuation fragments into {} segments",
        merged.len()
    );

    merged
}

/// A repeated header row without its marker cell, or `None` when the header
/// is not a table row or its other cells are empty.
fn trailing_cells(header: &str) -> Option<String> {
    let (_, rest) = header.split_once(CELL_SEPARATOR)?;
    if rest.trim().is_empty() {
        None
    } else {
        Some(format!("{CELL_SEPARATOR}{rest}"))
    }
}

/// Removes notice phrases, strip-pattern matches, and numbering rows from
/// the body of a merged segment. Table rows are cleaned cell by cell so
/// their columns stay aligned.
fn strip_artifacts(segment: &mut RecordSegment, rules: &ContinuationRules) {
    let mut lines = segment.raw_lines.drain(..);
    let Some(header) = lines.next() else {
        return;
    };

    let separator = CELL_SEPARATOR.to_string();
    let body: Vec<String> = lines
        .filter_map(|line| {
            let cells: Vec<String> = line
                .split(CELL_SEPARATOR)
                .map(|cell| clean_cell(cell, rules))
                .collect();
            let keep = cells.iter().rposition(|cell| !cell.is_empty())?;
            Some(cells[..=keep].join(separator.as_str()))
        })
        .collect();

    segment.raw_lines = std::iter::once(header).chain(body).collect();
}

fn clean_cell(cell: &str, rules: &ContinuationRules) -> String {
    let mut cell = cell.to_owned();
    if let Some(re) = &rules.marker_regex {
        cell = re.replace_all(&cell, "").into_owned();
    }
    for re in &rules.strip {
        cell = re.replace_all(&cell, "").into_owned();
    }
    let cell = cell.trim_matches(|c: char| c.is_whitespace() || c == '*');
    if is_numbering_artifact(cell, rules.min_numeric_len) {
        String::new()
    } else {
        cell.to_owned()
    }
}
