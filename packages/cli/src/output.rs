//! Writing extracted records as JSON or CSV.

use std::io::Write;

use inspection_extract::{ExtractionProfile, ExtractionRecord};

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// A JSON array of flat record objects.
    #[default]
    Json,
    /// One CSV row per record.
    Csv,
}

/// Errors from writing output.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Writing failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Metadata columns appended after the profile's fields.
const METADATA_COLUMNS: &[&str] = &[
    "validation_warnings",
    "is_structured",
    "extraction_method",
    "start_marker",
];

/// Writes `records` to `writer` in the requested format.
///
/// # Errors
///
/// Returns [`OutputError`] if serialization or the underlying write fails.
pub fn write_records<W: Write>(
    writer: W,
    format: OutputFormat,
    profile: &ExtractionProfile,
    records: &[ExtractionRecord],
) -> Result<(), OutputError> {
    match format {
        OutputFormat::Json => write_json(writer, records),
        OutputFormat::Csv => write_csv(writer, profile, records),
    }
}

fn write_json<W: Write>(mut writer: W, records: &[ExtractionRecord]) -> Result<(), OutputError> {
    let rows: Vec<serde_json::Value> = records.iter().map(ExtractionRecord::to_flat_json).collect();
    serde_json::to_writer_pretty(&mut writer, &rows)?;
    writeln!(writer)?;
    Ok(())
}

/// Columns are the profile's fields in priority order followed by the
/// metadata columns. List values and warnings are joined with `"; "`.
fn write_csv<W: Write>(
    writer: W,
    profile: &ExtractionProfile,
    records: &[ExtractionRecord],
) -> Result<(), OutputError> {
    let mut csv = csv::Writer::from_writer(writer);

    let header: Vec<&str> = profile
        .field_names()
        .chain(METADATA_COLUMNS.iter().copied())
        .collect();
    csv.write_record(&header)?;

    for record in records {
        let mut row: Vec<String> = profile
            .field_names()
            .map(|name| record.value(name).map(ToString::to_string).unwrap_or_default())
            .collect();
        row.push(record.validation_warnings.join("; "));
        row.push(record.is_structured.to_string());
        row.push(record.origin.method_label());
        row.push(record.start_marker.clone().unwrap_or_default());
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}
