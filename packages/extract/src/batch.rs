//! Running the pipeline over many documents.

use std::sync::Arc;

use inspection_extract_models::{ExtractionRecord, RawDocument};

use crate::ExtractError;
use crate::pipeline::Extractor;
use crate::progress::ProgressCallback;

/// What happened to one document of a batch.
#[derive(Debug)]
pub struct DocumentOutcome {
    /// Caller-supplied label (a path or URL).
    pub label: String,
    /// The document's records, or why it was skipped.
    pub result: Result<Vec<ExtractionRecord>, ExtractError>,
}

/// Extracts every document in order.
///
/// A document that fails is logged and reported in its outcome; the batch
/// always continues with the next one. `progress` advances once per
/// document.
#[must_use]
pub fn extract_batch(
    extractor: &Extractor,
    documents: Vec<(String, RawDocument)>,
    progress: &Arc<dyn ProgressCallback>,
) -> Vec<DocumentOutcome> {
    documents
        .into_iter()
        .map(|(label, raw)| {
            progress.set_message(label.clone());

            let result = extractor.extract_document(&raw);
            match &result {
                Ok(records) => {
                    let warnings: usize =
                        records.iter().map(|r| r.validation_warnings.len()).sum();
                    log::info!(
                        "{label}: {} records, {warnings} warnings",
                        records.len()
                    );
                }
                Err(e) => log::warn!("Skipping {label}: {e}"),
            }

            progress.inc(1);
            DocumentOutcome { label, result }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::profile::parse_profile_toml;

    struct Recorder(Mutex<u64>);

    impl ProgressCallback for Recorder {
        fn set_total(&self, _total: u64) {}
        fn inc(&self, delta: u64) {
            *self.0.lock().unwrap() += delta;
        }
        fn set_message(&self, _msg: String) {}
        fn finish(&self, _msg: String) {}
    }

    fn census_extractor() -> Extractor {
        let profile = parse_profile_toml(
            "census",
            r#"
                id = "census"
                name = "Census"

                [[fields]]
                name = "census"
                kind = "integer"
                text = [{ id = "present", pattern = 'Present\s+(\d+)' }]
            "#,
        )
        .unwrap()
        .compile()
        .unwrap();
        Extractor::new(profile)
    }

    #[test]
    fn bad_document_does_not_stop_batch() {
        let extractor = census_extractor();
        let recorder = Arc::new(Recorder(Mutex::new(0)));
        let progress: Arc<dyn ProgressCallback> = recorder.clone();

        let outcomes = extract_batch(
            &extractor,
            vec![
                ("a.html".to_owned(), RawDocument::html("<p>Present 3</p>")),
                ("blank.html".to_owned(), RawDocument::html("")),
                ("c.html".to_owned(), RawDocument::html("<p>Present 7</p>")),
            ],
            &progress,
        );

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].label, "a.html");
        assert_eq!(
            outcomes[0].result.as_ref().unwrap()[0].integer("census"),
            Some(3)
        );
        assert!(matches!(outcomes[1].result, Err(ExtractError::EmptyDocument)));
        assert_eq!(
            outcomes[2].result.as_ref().unwrap()[0].integer("census"),
            Some(7)
        );
        assert_eq!(*recorder.0.lock().unwrap(), 3);
    }

    #[test]
    fn silent_batch_still_extracts() {
        let outcomes = extract_batch(
            &census_extractor(),
            vec![("only.html".to_owned(), RawDocument::html("<p>Present 5</p>"))],
            &crate::progress::null_progress(),
        );
        assert_eq!(
            outcomes[0].result.as_ref().unwrap()[0].integer("census"),
            Some(5)
        );
    }
}
