//! Soft consistency checks on extracted records.
//!
//! Violations are recorded as warnings on the record for human review.
//! Values are never changed or removed.

use inspection_extract_models::ExtractionRecord;
use serde::{Deserialize, Serialize};

/// Two integer fields where `lesser` must not exceed `greater`, such as a
/// resident count and the licensed capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderingRule {
    /// Field expected to be the smaller value.
    pub lesser: String,
    /// Field expected to be the larger value.
    pub greater: String,
}

/// Applies `rules` to `record`, appending a warning for every violated rule
/// whose fields both have values.
#[must_use]
pub fn validate(mut record: ExtractionRecord, rules: &[OrderingRule]) -> ExtractionRecord {
    for rule in rules {
        let (Some(lesser), Some(greater)) =
            (record.integer(&rule.lesser), record.integer(&rule.greater))
        else {
            continue;
        };

        if lesser > greater {
            let warning = format!(
                "SUSPICIOUS: {} ({lesser}) > {} ({greater})",
                label(&rule.lesser),
                label(&rule.greater),
            );
            log::warn!("{warning}");
            record.push_warning(warning);
        }
    }

    record
}

/// `contact_person` → `Contact person`.
fn label(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
