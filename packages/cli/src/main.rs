#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the inspection report extractor.
//!
//! Reads PDF and HTML reports from disk or over HTTP, runs them through an
//! extraction profile, and writes the records as JSON or CSV.
//!
//! Uses `indicatif-log-bridge` (via
//! [`inspection_extract_cli_utils::init_logger`]) to route `log` output
//! through `indicatif::MultiProgress` so that log lines and progress bars
//! never fight for the terminal.

mod fetch;
mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use futures::StreamExt as _;
use inspection_extract::progress::ProgressCallback;
use inspection_extract::registry::{all_profiles, find_profile, load_profile_file};
use inspection_extract::{
    DocumentOutcome, ExtractionProfile, Extractor, Normalizer, RawDocument, SourceKind,
    extract_batch,
};
use inspection_extract_cli_utils::IndicatifProgress;

use crate::output::OutputFormat;

/// Per-request timeout for downloads.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(
    name = "inspection_extract",
    about = "Extract structured fields from inspection reports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in extraction profiles
    Profiles,
    /// Extract records from one or more reports
    Extract {
        /// Built-in profile id (see `profiles`)
        #[arg(long, default_value = "ut_checklist")]
        profile: String,
        /// Load the profile from a TOML file instead of the built-ins
        #[arg(long)]
        profile_file: Option<PathBuf>,
        /// Treat every input as this kind instead of detecting it
        #[arg(long, value_parser = parse_kind)]
        kind: Option<SourceKind>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Write output to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Number of documents fetched and extracted concurrently
        #[arg(long, short, default_value = "4")]
        jobs: usize,
        /// Directory holding Tesseract language data
        #[arg(long, env = "TESSDATA_PREFIX")]
        tessdata: Option<PathBuf>,
        /// Tesseract language
        #[arg(long, default_value = "eng")]
        language: String,
        /// Files or `http(s)` URLs to process
        #[arg(required = true)]
        inputs: Vec<String>,
    },
}

fn parse_kind(s: &str) -> Result<SourceKind, String> {
    s.parse::<SourceKind>()
        .map_err(|_| format!("unknown document kind '{s}' (expected pdf or html)"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = inspection_extract_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Profiles => {
            let profiles = all_profiles()?;
            println!("{:<20} NAME", "ID");
            println!("{}", "-".repeat(60));
            for profile in &profiles {
                println!("{:<20} {}", profile.id, profile.name);
            }
        }
        Commands::Extract {
            profile,
            profile_file,
            kind,
            format,
            output,
            jobs,
            tessdata,
            language,
            inputs,
        } => {
            let start = Instant::now();
            let profile = match &profile_file {
                Some(path) => load_profile_file(path)?,
                None => find_profile(&profile)?,
            };
            log::info!("Using profile {} ({})", profile.id, profile.name);

            let normalizer = build_normalizer(tessdata.as_deref(), &language);
            let extractor = Arc::new(Extractor::new(profile).with_normalizer(normalizer));

            let progress =
                IndicatifProgress::documents_bar(&multi, "Fetching documents...");
            progress.set_total(inputs.len() as u64);

            let jobs = jobs.max(1);
            let documents = fetch_all(inputs, kind, jobs, &progress).await?;
            let outcomes = extract_all(&extractor, documents, jobs, &progress).await?;

            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            let records: Vec<_> = outcomes
                .into_iter()
                .filter_map(|o| o.result.ok())
                .flatten()
                .collect();
            progress.finish(format!("{} records", records.len()));

            write_output(output, format, extractor.profile(), &records)?;

            log::info!(
                "Extracted {} records ({failed} documents skipped) in {:.1}s",
                records.len(),
                start.elapsed().as_secs_f64()
            );
        }
    }

    Ok(())
}

/// Fetches every input, `jobs` at a time, keeping input order. Inputs that
/// fail to load are logged, counted as done, and dropped.
async fn fetch_all(
    inputs: Vec<String>,
    kind: Option<SourceKind>,
    jobs: usize,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<(String, RawDocument)>, Box<dyn std::error::Error>> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    let fetched: Vec<_> = futures::stream::iter(inputs)
        .map(|input| {
            let client = &client;
            async move {
                let result = fetch::fetch_input(client, &input, kind).await;
                (input, result)
            }
        })
        .buffered(jobs)
        .collect()
        .await;

    let mut documents = Vec::with_capacity(fetched.len());
    for (input, result) in fetched {
        match result {
            Ok(raw) => documents.push((input, raw)),
            Err(e) => {
                log::warn!("Skipping {input}: {e}");
                progress.inc(1);
            }
        }
    }
    Ok(documents)
}

/// Splits the documents into `jobs` contiguous chunks and extracts each on
/// a blocking worker thread. Outcomes come back in input order.
async fn extract_all(
    extractor: &Arc<Extractor>,
    documents: Vec<(String, RawDocument)>,
    jobs: usize,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<DocumentOutcome>, Box<dyn std::error::Error>> {
    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_size = documents.len().div_ceil(jobs);
    let mut chunks = Vec::new();
    let mut remaining = documents.into_iter().peekable();
    while remaining.peek().is_some() {
        chunks.push(remaining.by_ref().take(chunk_size).collect::<Vec<_>>());
    }

    let handles = chunks.into_iter().map(|chunk| {
        let extractor = Arc::clone(extractor);
        let progress = Arc::clone(progress);
        tokio::task::spawn_blocking(move || extract_batch(&extractor, chunk, &progress))
    });

    let outcomes = futures::future::try_join_all(handles).await?;
    Ok(outcomes.into_iter().flatten().collect())
}

fn write_output(
    path: Option<PathBuf>,
    format: OutputFormat,
    profile: &ExtractionProfile,
    records: &[inspection_extract::ExtractionRecord],
) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let file = std::io::BufWriter::new(std::fs::File::create(&path)?);
            output::write_records(file, format, profile, records)?;
            log::info!("Wrote {} records to {}", records.len(), path.display());
        }
        None => output::write_records(std::io::stdout().lock(), format, profile, records)?,
    }
    Ok(())
}

#[cfg(feature = "tesseract")]
fn build_normalizer(tessdata: Option<&std::path::Path>, language: &str) -> Normalizer {
    match inspection_extract_ocr::tesseract::TesseractEngine::new(tessdata, language) {
        Ok(engine) => Normalizer::new().with_engine(Arc::new(engine)),
        Err(e) => {
            log::warn!("OCR disabled: {e}");
            Normalizer::new()
        }
    }
}

#[cfg(not(feature = "tesseract"))]
fn build_normalizer(tessdata: Option<&std::path::Path>, _language: &str) -> Normalizer {
    if tessdata.is_some() {
        log::warn!("Built without the `tesseract` feature; scanned PDFs will be skipped");
    }
    Normalizer::new()
}
