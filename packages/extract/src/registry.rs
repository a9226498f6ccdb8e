//! Profile registry: loads the built-in extraction profiles from embedded
//! TOML.
//!
//! Each `.toml` file in `packages/extract/profiles/` is baked into the binary
//! at compile time via [`include_str!`]. Adding a new report family is a
//! matter of writing a TOML file and adding it to the list below.

use std::path::Path;

use crate::ProfileError;
use crate::profile::{ExtractionProfile, ProfileDefinition, parse_profile_toml};

/// TOML profiles embedded at compile time.
const PROFILE_TOMLS: &[(&str, &str)] = &[
    ("ut_checklist", include_str!("../profiles/ut_checklist.toml")),
    ("ca_deficiency", include_str!("../profiles/ca_deficiency.toml")),
    (
        "ct_field_visit",
        include_str!("../profiles/ct_field_visit.toml"),
    ),
];

/// Total number of built-in profiles (used in tests).
#[cfg(test)]
const EXPECTED_PROFILE_COUNT: usize = 3;

/// Returns every built-in profile definition, parsed from embedded TOML.
///
/// # Errors
///
/// Returns [`ProfileError::Parse`] if an embedded TOML file is malformed.
pub fn all_profiles() -> Result<Vec<ProfileDefinition>, ProfileError> {
    PROFILE_TOMLS
        .iter()
        .map(|(name, toml)| parse_profile_toml(name, toml))
        .collect()
}

/// Looks up a built-in profile by id and compiles it.
///
/// # Errors
///
/// Returns [`ProfileError::UnknownProfile`] if no built-in profile has the
/// id, or any parse/compile error from the profile itself.
pub fn find_profile(id: &str) -> Result<ExtractionProfile, ProfileError> {
    let (name, toml) = PROFILE_TOMLS
        .iter()
        .find(|(name, _)| *name == id)
        .ok_or_else(|| ProfileError::UnknownProfile(id.to_owned()))?;

    parse_profile_toml(name, toml)?.compile()
}

/// Reads, parses, and compiles a profile from a TOML file on disk.
///
/// # Errors
///
/// Returns [`ProfileError::Io`] if the file cannot be read, or any
/// parse/compile error from its contents.
pub fn load_profile_file(path: &Path) -> Result<ExtractionProfile, ProfileError> {
    let toml = std::fs::read_to_string(path)?;
    log::info!("Loading profile from {}", path.display());
    parse_profile_toml(&path.display().to_string(), &toml)?.compile()
}

#[cfg(test)]
mod tests {
    use inspection_extract_models::{ExtractionRecord, NormalizedText, RawDocument, TextOrigin};

    use super::*;
    use crate::pipeline::Extractor;

    fn run(profile: &str, text: &str, origin: TextOrigin) -> Vec<ExtractionRecord> {
        let extractor = Extractor::new(find_profile(profile).unwrap());
        extractor.extract_text(&NormalizedText::new(text.to_owned(), origin))
    }

    #[test]
    fn loads_all_profiles() {
        assert_eq!(all_profiles().unwrap().len(), EXPECTED_PROFILE_COUNT);
    }

    #[test]
    fn profile_ids_are_unique_and_match_registry_names() {
        let profiles = all_profiles().unwrap();
        for ((name, _), profile) in PROFILE_TOMLS.iter().zip(&profiles) {
            assert_eq!(*name, profile.id);
        }
        let mut ids: Vec<&str> = profiles.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), EXPECTED_PROFILE_COUNT);
    }

    #[test]
    fn all_profiles_compile() {
        for def in all_profiles().unwrap() {
            let profile = def
                .compile()
                .unwrap_or_else(|e| panic!("{} failed to compile: {e}", def.id));
            assert!(!profile.name.is_empty(), "{}: name is empty", def.id);
            assert!(!profile.fields.is_empty(), "{}: no fields", def.id);
        }
    }

    #[test]
    fn unknown_profile_is_an_error() {
        assert!(matches!(
            find_profile("tx_inspection"),
            Err(ProfileError::UnknownProfile(id)) if id == "tx_inspection"
        ));
    }

    #[test]
    fn missing_profile_file_is_an_io_error() {
        assert!(matches!(
            load_profile_file(Path::new("/nonexistent/profile.toml")),
            Err(ProfileError::Io(_))
        ));
    }

    #[test]
    fn checklist_reads_census_below_approved_of_present() {
        let records = run(
            "ut_checklist",
            "Inspection Checklist\nApproved # of Present\n5\n",
            TextOrigin::TextLayer,
        );
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_structured);
        let census = records[0].field("census").unwrap();
        assert_eq!(census.value.as_ref().and_then(|v| v.as_integer()), Some(5));
        assert_eq!(
            census.matched_pattern_id.as_deref(),
            Some("approved_of_present_newline")
        );
    }

    #[test]
    fn checklist_reads_ocr_census_between_present_and_capacity() {
        let records = run(
            "ut_checklist",
            "Present 4 9 0 Capacity",
            TextOrigin::Ocr { rotation: 90 },
        );
        let census = records[0].field("census").unwrap();
        assert_eq!(census.value.as_ref().and_then(|v| v.as_integer()), Some(4));
        assert_eq!(
            census.matched_pattern_id.as_deref(),
            Some("present_before_capacity")
        );
        assert_eq!(records[0].origin.method_label(), "ocr_rotated_90");
    }

    #[test]
    fn checklist_reads_three_column_table() {
        let records = run(
            "ut_checklist",
            "Approved # Capacity Present\n16 16 12\n",
            TextOrigin::TextLayer,
        );
        assert_eq!(records[0].integer("census"), Some(12));
        assert_eq!(records[0].integer("capacity"), Some(16));
        assert!(records[0].validation_warnings.is_empty());
    }

    #[test]
    fn checklist_flags_census_over_capacity() {
        let records = run(
            "ut_checklist",
            "Present: 20\nCapacity: 16\n",
            TextOrigin::TextLayer,
        );
        assert_eq!(records[0].integer("census"), Some(20));
        assert_eq!(records[0].integer("capacity"), Some(16));
        assert_eq!(
            records[0].validation_warnings,
            vec!["SUSPICIOUS: Census (20) > Capacity (16)"]
        );
    }

    #[test]
    fn checklist_reads_contact_and_licensor() {
        let records = run(
            "ut_checklist",
            "Name of Individual Informed of Inspection: JANE   DOE\n\
             Licensor(s) Conducting Inspection: John Smith OL Staff\n",
            TextOrigin::TextLayer,
        );
        assert_eq!(records[0].text("contact_person"), Some("JANE DOE"));
        assert_eq!(records[0].text("licensor"), Some("John Smith"));
        assert!(records[0].field("census").is_some_and(|f| !f.is_present()));
    }

    #[test]
    fn deficiency_report_merges_page_break_continuation() {
        let records = run(
            "ca_deficiency",
            "Facility Number: 197608046\n\
             FACILITY NAME: SUNNY ACRES HOME\n\
             Type A 08/15/2024 Section Cited CCR 80087(a)\n\
             The licensee did not ensure that the\n\
             CONTINUED ON NEXT PAGE\n\
             Page 1 of 2\n\
             Type A 08/15/2024 Section Cited CCR 80087(a)\n\
             bathroom was clean and in good repair.\n\
             PLAN OF CORRECTION: Licensee will clean daily.\n\
             Type B 09/01/2024 Section Cited 80075\n\
             Medications were not centrally stored.\n",
            TextOrigin::TextLayer,
        );

        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert!(first.is_structured);
        assert_eq!(first.text("facility_number"), Some("197608046"));
        assert_eq!(first.text("facility_name"), Some("Sunny Acres Home"));
        assert_eq!(first.text("deficiency_type"), Some("A"));
        assert_eq!(first.text("section_cited"), Some("80087(a)"));
        assert_eq!(first.text("poc_due_date"), Some("08/15/2024"));
        let description = first.text("description").unwrap();
        assert_eq!(
            description,
            "The licensee did not ensure that the bathroom was clean and in good repair."
        );
        assert!(!description.to_uppercase().contains("CONTINUED"));
        assert_eq!(
            first.text("plan_of_correction"),
            Some("Licensee will clean daily.")
        );
        assert!(first.validation_warnings.is_empty());

        let second = &records[1];
        assert_eq!(second.text("facility_number"), Some("197608046"));
        assert_eq!(second.text("deficiency_type"), Some("B"));
        assert_eq!(second.text("section_cited"), Some("80075"));
        assert_eq!(
            second.text("description"),
            Some("Medications were not centrally stored.")
        );
        assert!(second.field("plan_of_correction").is_some_and(|f| !f.is_present()));
    }

    #[test]
    fn field_visit_reads_bulleted_sections() {
        let records = run(
            "ct_field_visit",
            "Field Visit Reporting Form\n\
             NAME OF FACILITY / PROGRAM: HIGH MEADOWS CAMPUS\n\
             TIME OF VISIT (FROM - TO): 9:00-11:30 DATE: 03/14/2024\n\
             Areas / Topics covered during visit:\n\
             \u{2022} Medication administration\n\
             \u{2022} Staffing ratios and\n\
             overnight coverage\n\
             Corrective Actions implemented as a result of previous visit:\n\
             None\n\
             Recommendations: (if applicable)\n\
             - Update fire drill log\n\
             Areas of regulatory non-compliance identified during this visit:\n\
             None identified.\n",
            TextOrigin::TextLayer,
        );

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.text("facility_name"), Some("High Meadows Campus"));
        assert_eq!(record.text("visit_time"), Some("9:00-11:30"));
        assert_eq!(record.text("visit_date"), Some("03/14/2024"));
        assert_eq!(
            record.value("areas_topics").and_then(|v| v.as_list()),
            Some(
                &[
                    "Medication administration".to_owned(),
                    "Staffing ratios and overnight coverage".to_owned(),
                ][..]
            )
        );
        assert_eq!(
            record.value("corrective_actions").and_then(|v| v.as_list()),
            Some(&[][..])
        );
        assert_eq!(
            record.value("recommendations").and_then(|v| v.as_list()),
            Some(&["Update fire drill log".to_owned()][..])
        );
        assert_eq!(record.text("non_compliance"), Some("None identified."));
    }

    #[test]
    fn deficiency_table_reads_each_column() {
        let html = "<table>\
            <tr><td>FACILITY NAME:<br>SUNNY ACRES HOME</td><td>FACILITY NUMBER: 197608046</td></tr>\
            <tr><td>ADMINISTRATOR:<br>JANE ROE</td><td>CAPACITY: 6</td><td>CENSUS: 4</td></tr>\
            <tr><th>Type/Section</th><th>DEFICIENCIES</th><th>PLAN OF CORRECTION</th></tr>\
            <tr><td>Type A<br>08/15/2024<br>Section Cited<br>CCR 80087(a)</td>\
                <td>The licensee did not ensure that the bathroom was clean.</td>\
                <td>Licensee will clean daily.</td></tr>\
            <tr><td>Type B<br>09/01/2024<br>Section Cited<br>80075</td>\
                <td>Medications were not centrally stored.</td>\
                <td>Lock cabinet installed.</td></tr>\
            </table>";
        let extractor = Extractor::new(find_profile("ca_deficiency").unwrap());
        let records = extractor.extract_document(&RawDocument::html(html)).unwrap();

        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.start_marker.as_deref(), Some("Type A 08/15/2024 Section Cited CCR 80087(a)"));
        assert_eq!(first.text("facility_name"), Some("Sunny Acres Home"));
        assert_eq!(first.text("administrator"), Some("Jane Roe"));
        assert_eq!(first.text("facility_number"), Some("197608046"));
        assert_eq!(first.integer("capacity"), Some(6));
        assert_eq!(first.integer("census"), Some(4));
        assert_eq!(first.text("deficiency_type"), Some("A"));
        assert_eq!(first.text("section_cited"), Some("80087(a)"));
        assert_eq!(first.text("poc_due_date"), Some("08/15/2024"));
        assert_eq!(
            first.text("description"),
            Some("The licensee did not ensure that the bathroom was clean.")
        );
        assert_eq!(
            first.field("description").unwrap().matched_pattern_id.as_deref(),
            Some("deficiencies_column")
        );
        assert_eq!(first.text("plan_of_correction"), Some("Licensee will clean daily."));
        assert!(first.validation_warnings.is_empty());

        let second = &records[1];
        assert_eq!(second.text("deficiency_type"), Some("B"));
        assert_eq!(second.text("section_cited"), Some("80075"));
        assert_eq!(second.text("description"), Some("Medications were not centrally stored."));
        assert_eq!(second.text("plan_of_correction"), Some("Lock cabinet installed."));
    }

    #[test]
    fn complaint_report_reads_allegations_and_findings() {
        let records = run(
            "ca_deficiency",
            "COMPLAINT INVESTIGATION REPORT\n\
             Facility Number: 197608046\n\
             Date Signed: 08/20/2024 10:32:11 AM\n\
             Unannounced\n\
             Complaint Investigation\n\
             The complaint received in the office on 07/30/2024 alleged the following.\n\
             ALLEGATION(S):\n\
             1 Staff did not supervise residents at night.\n\
             2 Residents were not given their medication.\n\
             INVESTIGATION FINDINGS:\n\
             The evaluator interviewed staff and reviewed the medication log.\n\
             The allegations are Unsubstantiated.\n\
             NARRATIVE\n\
             Licensing Program Analyst met with the administrator.\n\
             SUPERVISOR'S NAME: Mary Major\n",
            TextOrigin::TextLayer,
        );

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(!record.is_structured);
        assert_eq!(record.text("date_signed"), Some("08/20/2024 10:32:11 AM"));
        assert_eq!(record.text("complaint_received_date"), Some("07/30/2024"));
        assert_eq!(record.text("announced_status"), Some("Unannounced"));
        assert_eq!(record.text("visit_type"), Some("Complaint Investigation"));
        assert_eq!(record.text("complaint_status"), Some("Unsubstantiated"));
        assert_eq!(
            record.value("allegations").and_then(|v| v.as_list()),
            Some(
                &[
                    "Staff did not supervise residents at night.".to_owned(),
                    "Residents were not given their medication.".to_owned(),
                ][..]
            )
        );
        assert_eq!(
            record.text("investigation_findings"),
            Some(
                "The evaluator interviewed staff and reviewed the medication log. \
                 The allegations are Unsubstantiated."
            )
        );
        assert_eq!(
            record.text("narrative"),
            Some("Licensing Program Analyst met with the administrator.")
        );
        assert_eq!(record.text("supervisor"), Some("Mary Major"));
    }

    #[test]
    fn field_visit_listing_yields_one_record_per_report() {
        let records = run(
            "ct_field_visit",
            "12345+++03/14/2024+++Field Visit Reporting Form\n\
             NAME OF FACILITY / PROGRAM: HIGH MEADOWS CAMPUS\n\
             TIME OF VISIT (FROM - TO): 9:00-11:30 DATE: 03/14/2024\n\
             AGENCY PERSONNEL WHO PARTICIPATED:\n\
             Name\tJob Title\n\
             Jane Doe\tProgram Manager\n\
             List of Areas / Topics covered during visit:\n\
             \u{2022} Medication administration\n\
             Areas of regulatory non-compliance identified during this visit:\n\
             Fire Safety: Sec. 17a-145-12.\n\
             Fire drills were not logged.\n\
             Staffing: Sec. 17a-145-40.\n\
             Overnight ratio unmet.\n\
             Please submit a plan of correction.\n\
             12399+++06/02/2024+++Field Visit Reporting Form\n\
             NAME OF FACILITY / PROGRAM: HIGH MEADOWS CAMPUS\n\
             TIME OF VISIT (FROM - TO): 13:00-15:00 DATE: 06/02/2024\n\
             Areas of regulatory non-compliance identified during this visit:\n\
             None\n",
            TextOrigin::TextLayer,
        );

        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert!(first.is_structured);
        assert_eq!(first.text("report_id"), Some("12345"));
        assert_eq!(first.text("report_date"), Some("03/14/2024"));
        assert_eq!(first.text("visit_time"), Some("9:00-11:30"));
        assert_eq!(
            first.value("personnel").and_then(|v| v.as_list()),
            Some(&["Jane Doe Program Manager".to_owned()][..])
        );
        assert_eq!(
            first.value("areas_topics").and_then(|v| v.as_list()),
            Some(&["Medication administration".to_owned()][..])
        );
        assert_eq!(
            first.value("non_compliance_citations").and_then(|v| v.as_list()),
            Some(
                &[
                    "Fire Safety: Sec. 17a-145-12. Fire drills were not logged.".to_owned(),
                    "Staffing: Sec. 17a-145-40. Overnight ratio unmet.".to_owned(),
                ][..]
            )
        );

        let second = &records[1];
        assert_eq!(second.text("report_id"), Some("12399"));
        assert_eq!(second.text("report_date"), Some("06/02/2024"));
        assert_eq!(second.text("visit_date"), Some("06/02/2024"));
        assert_eq!(second.text("facility_name"), Some("High Meadows Campus"));
        assert!(second.field("personnel").is_some_and(|f| !f.is_present()));
        assert_eq!(
            second.value("non_compliance_citations").and_then(|v| v.as_list()),
            Some(&[][..])
        );
        assert_eq!(second.text("non_compliance"), Some("None"));
    }
}
