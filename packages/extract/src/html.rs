//! HTML to plain text.
//!
//! Block-level elements become line breaks, multi-column table rows become
//! cell-separated lines, and non-content elements (`script`, `style`, ...)
//! are dropped. The result keeps enough line structure for the segmenter's line-based
//! markers to work on HTML reports the same way they do on PDF text.

use inspection_extract_models::CELL_SEPARATOR;
use scraper::{ElementRef, Html};

use crate::pattern::collapse_whitespace;

const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "head"];

const BLOCKS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "caption",
    "dd",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "legend",
    "li",
    "main",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "thead",
    "tfoot",
    "tr",
    "ul",
];

/// Strips tags from `markup`, returning newline-delimited text with
/// whitespace collapsed within each line and blank lines removed.
///
/// A table row with more than one non-empty cell becomes a single line with
/// its cells joined by [`CELL_SEPARATOR`], so a cell's column can still be
/// told apart after flattening. A row with one filled cell is emitted like
/// any other block, keeping that cell's own line breaks.
#[must_use]
pub fn html_to_text(markup: &str) -> String {
    let document = Html::parse_document(markup);
    let mut raw = String::new();
    walk(document.root_element(), &mut raw);
    tidy_lines(&raw)
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }
    if name == "tr" {
        walk_row(element, out);
        return;
    }

    let block = BLOCKS.contains(&name) || matches!(name, "td" | "th");
    if block {
        out.push('\n');
    }
    walk_children(element, out);
    if block {
        out.push('\n');
    }
}

fn walk_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
        } else if let Some(child) = ElementRef::wrap(child) {
            walk(child, out);
        }
    }
}

fn walk_row(row: ElementRef<'_>, out: &mut String) {
    let cells: Vec<String> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .map(|cell| {
            let mut text = String::new();
            walk_children(cell, &mut text);
            text
        })
        .collect();

    out.push('\n');
    let filled = cells.iter().filter(|cell| !cell.trim().is_empty()).count();
    if filled > 1 {
        let separator = CELL_SEPARATOR.to_string();
        let cells: Vec<String> = cells.iter().map(|cell| collapse_whitespace(cell)).collect();
        out.push_str(&cells.join(separator.as_str()));
    } else {
        for cell in cells {
            out.push_str(&cell);
            out.push('\n');
        }
    }
    out.push('\n');
}

/// Collapses whitespace within lines (cell by cell on table rows), drops
/// trailing empty cells, and drops blank lines.
fn tidy_lines(raw: &str) -> String {
    let separator = CELL_SEPARATOR.to_string();
    raw.lines()
        .filter_map(|line| {
            let cells: Vec<String> = line.split(CELL_SEPARATOR).map(collapse_whitespace).collect();
            let keep = cells.iter().rposition(|cell| !cell.is_empty())?;
            Some(cells[..=keep].join(separator.as_str()))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
