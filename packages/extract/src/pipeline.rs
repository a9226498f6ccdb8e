//! The extraction pipeline.
//!
//! ```text
//! RawDocument ─ normalize ─▶ NormalizedText ─ segment ─▶ [RecordSegment]
//!     ─ merge ─▶ [RecordSegment] ─ match fields ─ validate ─▶ [ExtractionRecord]
//! ```

use std::collections::BTreeMap;

use inspection_extract_models::{
    ExtractedField, ExtractionRecord, NormalizedText, RawDocument, TextOrigin,
};

use crate::continuation::merge;
use crate::normalize::Normalizer;
use crate::pattern::{FieldScope, extract};
use crate::profile::ExtractionProfile;
use crate::segment::segment;
use crate::validate::validate;
use crate::ExtractError;

/// Runs one profile over documents.
///
/// An extractor holds only read-only configuration and can be shared
/// between threads. Every call is independent of every other.
#[derive(Debug, Clone)]
pub struct Extractor {
    profile: ExtractionProfile,
    normalizer: Normalizer,
}

impl Extractor {
    /// Creates an extractor for `profile` without OCR.
    #[must_use]
    pub fn new(profile: ExtractionProfile) -> Self {
        Self {
            profile,
            normalizer: Normalizer::new(),
        }
    }

    /// Replaces the normalizer, e.g. with one that has a recognition
    /// engine.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// The profile this extractor runs.
    #[must_use]
    pub const fn profile(&self) -> &ExtractionProfile {
        &self.profile
    }

    /// Extracts every record from `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::EmptyDocument`] if the document has no
    /// extractable text. Every other anomaly is reported inside the
    /// records.
    pub fn extract_document(
        &self,
        raw: &RawDocument,
    ) -> Result<Vec<ExtractionRecord>, ExtractError> {
        let plausible = |text: &str| self.profile.any_field_matches(text, true);

        let text = self.normalizer.normalize(raw, plausible)?;
        let records = self.extract_text(&text);

        if self.profile.ocr_on_empty_fields
            && text.origin() == TextOrigin::TextLayer
            && !records.iter().any(ExtractionRecord::has_any_value)
            && self.normalizer.can_ocr(raw)
        {
            log::info!("Text layer matched no fields, retrying with OCR");
            if let Some(ocr_text) = self.normalizer.ocr(raw, plausible) {
                let ocr_records = self.extract_text(&ocr_text);
                if ocr_records.iter().any(ExtractionRecord::has_any_value) {
                    return Ok(ocr_records);
                }
            }
        }

        Ok(records)
    }

    /// Extracts every record from already-normalized text.
    ///
    /// A document with no section markers yields exactly one record
    /// covering the whole text, with `is_structured` unset.
    #[must_use]
    pub fn extract_text(&self, text: &NormalizedText) -> Vec<ExtractionRecord> {
        let ocr = text.origin().is_ocr();
        let document_fields = extract(
            text.as_str(),
            self.profile.fields_in(FieldScope::Document),
            ocr,
        );

        let segments = segment(text, &self.profile.segmentation);

        if segments.is_empty() {
            log::debug!("No section markers found, extracting from whole document");
            let record = self.build_record(
                text.as_str(),
                text.origin(),
                false,
                None,
                &document_fields,
                Vec::new(),
            );
            return vec![record];
        }

        merge(segments, &self.profile.continuation)
            .into_iter()
            .map(|segment| {
                self.build_record(
                    &segment.text(),
                    text.origin(),
                    true,
                    Some(segment.start_marker),
                    &document_fields,
                    segment.warnings,
                )
            })
            .collect()
    }

    fn build_record(
        &self,
        segment_text: &str,
        origin: TextOrigin,
        is_structured: bool,
        start_marker: Option<String>,
        document_fields: &BTreeMap<String, ExtractedField>,
        warnings: Vec<String>,
    ) -> ExtractionRecord {
        let mut record = ExtractionRecord::new(origin, is_structured, start_marker);
        record.validation_warnings = warnings;

        for field in document_fields.values() {
            record.insert(field.clone());
        }
        for (_, field) in extract(
            segment_text,
            self.profile.fields_in(FieldScope::Segment),
            origin.is_ocr(),
        ) {
            record.insert(field);
        }

        validate(record, &self.profile.orderings)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use inspection_extract_models::{FieldValue, INCOMPLETE_CONTINUATION};

    use super::*;
    use crate::normalize::tests::{BlankPage, SidewaysScan};
    use crate::profile::parse_profile_toml;

    const DEFICIENCIES: &str = r#"
        id = "deficiencies"
        name = "Deficiencies"

        [segmentation]
        markers = [{ id = "type", pattern = '^Type\s+[A-Z]\b' }]

        [continuation]
        strip_patterns = ['(?i)^page\s+\d+\s+of\s+\d+$']

        [[fields]]
        name = "facility_number"
        kind = "integer"
        scope = "document"
        text = [{ id = "facility_number", pattern = 'Facility Number:\s*(\d+)' }]

        [[fields]]
        name = "deficiency_type"
        text = [{ id = "type", pattern = '^Type\s+([A-Z])' }]

        [[fields]]
        name = "description"
        text = [{ id = "body", pattern = '(?s)^[^\n]*\n(.+)$' }]

        [[fields]]
        name = "census"
        kind = "integer"
        text = [{ id = "census", pattern = 'Census:\s*(\d+)' }]
        ocr = [{ id = "census_ocr", pattern = '(?s)Present.*?(\d+).*?Capacity' }]

        [[fields]]
        name = "capacity"
        kind = "integer"
        scope = "document"
        text = [{ id = "capacity", pattern = 'Capacity:\s*(\d+)' }]

        [[validation.ordering]]
        lesser = "census"
        greater = "capacity"
    "#;

    fn extractor() -> Extractor {
        let profile = parse_profile_toml("deficiencies", DEFICIENCIES)
            .unwrap()
            .compile()
            .unwrap();
        Extractor::new(profile)
    }

    const CENSUS_WITH_RETRY: &str = r#"
        id = "census"
        name = "Census"
        ocr_on_empty_fields = true

        [[fields]]
        name = "census"
        kind = "integer"
        text = [{ id = "census", pattern = 'Census:\s*(\d+)' }]
        ocr = [{ id = "census_ocr", pattern = '(?s)Present.*?(\d+).*?Capacity' }]
    "#;

    fn retrying_extractor(engine: Arc<SidewaysScan>) -> Extractor {
        let profile = parse_profile_toml("census", CENSUS_WITH_RETRY)
            .unwrap()
            .compile()
            .unwrap();
        Extractor::new(profile).with_normalizer(
            Normalizer::new()
                .with_engine(engine)
                .with_rasterizer(Arc::new(BlankPage)),
        )
    }

    /// A one-page PDF whose text layer is the single line `line`.
    fn text_layer_pdf(line: &str) -> RawDocument {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => dictionary! {
                        "Type" => "Font",
                        "Subtype" => "Type1",
                        "BaseFont" => "Courier",
                    },
                },
            },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        RawDocument::pdf(buf)
    }

    fn text(s: &str) -> NormalizedText {
        NormalizedText::new(s.to_owned(), TextOrigin::TextLayer)
    }

    #[test]
    fn extracts_one_record_per_deficiency_with_header_fields() {
        let records = extractor().extract_text(&text(
            "Facility Number: 197608046\n\
             Capacity: 6\n\
             Type A\n\
             The licensee failed to ensure that\n\
             CONTINUED ON NEXT PAGE\n\
             Page 1 of 2\n\
             Type A\n\
             residents received medication.\n\
             Type B\n\
             Census: 8\n\
             Beds were unmade.",
        ));

        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert!(first.is_structured);
        assert_eq!(first.start_marker.as_deref(), Some("Type A"));
        assert_eq!(first.integer("facility_number"), Some(197_608_046));
        assert_eq!(first.text("deficiency_type"), Some("A"));
        assert_eq!(
            first.text("description"),
            Some("The licensee failed to ensure that residents received medication.")
        );
        assert!(first.field("census").is_some_and(|f| f.value.is_none()));
        assert!(first.validation_warnings.is_empty());

        let second = &records[1];
        assert_eq!(second.integer("facility_number"), Some(197_608_046));
        assert_eq!(second.text("deficiency_type"), Some("B"));
        assert_eq!(
            second.validation_warnings,
            vec!["SUSPICIOUS: Census (8) > Capacity (6)"]
        );
    }

    #[test]
    fn unstructured_document_yields_single_record() {
        let records = extractor().extract_text(&text("Census: 4\nCapacity: 6"));

        assert_eq!(records.len(), 1);
        assert!(!records[0].is_structured);
        assert_eq!(records[0].start_marker, None);
        assert_eq!(records[0].integer("census"), Some(4));
        assert!(records[0].field("deficiency_type").is_some());
    }

    #[test]
    fn dangling_continuation_warning_reaches_record() {
        let records = extractor().extract_text(&text("Type A\nstaff failed to:\n"));
        assert_eq!(records[0].validation_warnings, vec![INCOMPLETE_CONTINUATION]);
    }

    #[test]
    fn ocr_text_uses_ocr_patterns() {
        let records = extractor().extract_text(&NormalizedText::new(
            "Present 4 9 0 Capacity".to_owned(),
            TextOrigin::Ocr { rotation: 180 },
        ));
        assert_eq!(records[0].integer("census"), Some(4));
        assert_eq!(
            records[0].field("census").unwrap().matched_pattern_id.as_deref(),
            Some("census_ocr")
        );
        assert_eq!(records[0].origin.method_label(), "ocr_rotated_180");
    }

    #[test]
    fn extract_document_from_html() {
        let raw = RawDocument::html(
            "<table><tr><td>Census:</td><td>3</td></tr><tr><td>Capacity:</td><td>5</td></tr></table>",
        );
        let records = extractor().extract_document(&raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value("census"), Some(&FieldValue::Integer(3)));
        assert_eq!(records[0].integer("capacity"), Some(5));
    }

    #[test]
    fn scanned_pdf_goes_through_ocr() {
        let engine = Arc::new(SidewaysScan::new("Present 12 x Capacity", true));
        let normalizer = Normalizer::new()
            .with_engine(engine)
            .with_rasterizer(Arc::new(BlankPage));
        let extractor = extractor().with_normalizer(normalizer);

        let records = extractor
            .extract_document(&RawDocument::pdf(b"%PDF-1.4 scanned".to_vec()))
            .unwrap();

        assert_eq!(records[0].integer("census"), Some(12));
        assert_eq!(records[0].origin, TextOrigin::Ocr { rotation: 90 });
    }

    #[test]
    fn empty_document_is_an_error() {
        assert!(matches!(
            extractor().extract_document(&RawDocument::html("   ")),
            Err(ExtractError::EmptyDocument)
        ));
    }

    #[test]
    fn extraction_is_repeatable() {
        let input = text("Facility Number: 1\nType A\nfoo\nType B\nbar");
        let extractor = extractor();
        assert_eq!(extractor.extract_text(&input), extractor.extract_text(&input));
    }

    #[test]
    fn unmatched_text_layer_is_retried_with_ocr() {
        let engine = Arc::new(SidewaysScan::new("Present 12 x Capacity", true));
        let records = retrying_extractor(engine.clone())
            .extract_document(&text_layer_pdf("Quarterly summary only"))
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].integer("census"), Some(12));
        assert_eq!(records[0].origin, TextOrigin::Ocr { rotation: 90 });
        assert_eq!(engine.calls(), 2);
    }

    #[test]
    fn text_layer_records_survive_a_fruitless_retry() {
        let engine = Arc::new(SidewaysScan::new("illegible smudge", false));
        let records = retrying_extractor(engine.clone())
            .extract_document(&text_layer_pdf("Quarterly summary only"))
            .unwrap();

        assert_eq!(engine.calls(), 4);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].origin, TextOrigin::TextLayer);
        assert!(records[0].field("census").is_some_and(|f| !f.is_present()));
    }

    #[test]
    fn matched_text_layer_is_not_retried() {
        let engine = Arc::new(SidewaysScan::new("Present 12 x Capacity", true));
        let records = retrying_extractor(engine.clone())
            .extract_document(&text_layer_pdf("Census: 7"))
            .unwrap();

        assert_eq!(records[0].integer("census"), Some(7));
        assert_eq!(records[0].origin, TextOrigin::TextLayer);
        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn html_is_never_retried_with_ocr() {
        let engine = Arc::new(SidewaysScan::new("Present 12 x Capacity", true));
        let records = retrying_extractor(engine.clone())
            .extract_document(&RawDocument::html("<p>Quarterly summary only</p>"))
            .unwrap();

        assert_eq!(records[0].origin, TextOrigin::TextLayer);
        assert!(records[0].field("census").is_some_and(|f| !f.is_present()));
        assert_eq!(engine.calls(), 0);
    }
}
