//! Extraction profiles.
//!
//! A profile describes one family of reports: how records are delimited,
//! how page-break continuations are spotted, which fields to pull out and
//! with which patterns, and which consistency rules to check. Profiles are
//! written in TOML ([`ProfileDefinition`]) and compiled once into an
//! [`ExtractionProfile`] whose regexes are reused for every document.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use inspection_extract_models::{Confidence, FieldKind, RESERVED_KEYS};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ProfileError;
use crate::continuation::{ContinuationRules, DEFAULT_MARKERS};
use crate::pattern::{FieldPattern, FieldScope, Matcher};
use crate::segment::{DEFAULT_MIN_NUMERIC_MARKER_LEN, Marker, SegmentRules};
use crate::validate::OrderingRule;

// ── TOML definition ──────────────────────────────────────────────────────

/// A profile as written in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileDefinition {
    /// Unique identifier (e.g. `"ut_checklist"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What reports this profile is for.
    #[serde(default)]
    pub description: String,
    /// Re-read a PDF through OCR when its text layer produced no field at
    /// all. Needs a recognition engine.
    #[serde(default)]
    pub ocr_on_empty_fields: bool,
    /// Record delimiting. No markers means every document is one record.
    #[serde(default)]
    pub segmentation: SegmentationDef,
    /// Page-break continuation handling.
    #[serde(default)]
    pub continuation: ContinuationDef,
    /// Fields to extract, in output order unless `priority` says otherwise.
    pub fields: Vec<FieldDef>,
    /// Consistency checks.
    #[serde(default)]
    pub validation: ValidationDef,
}

/// `[segmentation]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentationDef {
    /// Section-header markers, tried in order against each line.
    #[serde(default)]
    pub markers: Vec<PatternDef>,
    /// Pure-digit lines shorter than this are never markers.
    #[serde(default = "default_min_numeric_marker_len")]
    pub min_numeric_marker_len: usize,
}

impl Default for SegmentationDef {
    fn default() -> Self {
        Self {
            markers: Vec::new(),
            min_numeric_marker_len: DEFAULT_MIN_NUMERIC_MARKER_LEN,
        }
    }
}

const fn default_min_numeric_marker_len() -> usize {
    DEFAULT_MIN_NUMERIC_MARKER_LEN
}

/// `[continuation]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContinuationDef {
    /// Notice phrases, matched case-insensitively.
    #[serde(default = "default_continuation_markers")]
    pub markers: Vec<String>,
    /// Treat a segment ending in `:` as continued.
    #[serde(default = "default_true")]
    pub trailing_colon: bool,
    /// Patterns removed from merged text (page footers and the like).
    #[serde(default)]
    pub strip_patterns: Vec<String>,
}

impl Default for ContinuationDef {
    fn default() -> Self {
        Self {
            markers: default_continuation_markers(),
            trailing_colon: true,
            strip_patterns: Vec::new(),
        }
    }
}

fn default_continuation_markers() -> Vec<String> {
    DEFAULT_MARKERS.iter().map(|m| (*m).to_owned()).collect()
}

const fn default_true() -> bool {
    true
}

/// An identified pattern (used for segment markers).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternDef {
    /// Identifier.
    pub id: String,
    /// Regular expression.
    pub pattern: String,
}

/// One `[[fields]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    /// Field name, unique within the profile.
    pub name: String,
    /// Value type.
    #[serde(default)]
    pub kind: FieldKind,
    /// Per segment, or once per document.
    #[serde(default)]
    pub scope: FieldScope,
    /// Output rank. Defaults to declaration order.
    #[serde(default)]
    pub priority: Option<u32>,
    /// Title-case all-caps values.
    #[serde(default)]
    pub title_case: bool,
    /// Pattern splitting a list section into items (`text_list` only).
    #[serde(default)]
    pub item_separator: Option<String>,
    /// Pattern whose matches begin list items (`text_list` only).
    #[serde(default)]
    pub item_start: Option<String>,
    /// Minimum list item length in characters.
    #[serde(default = "default_min_item_len")]
    pub min_item_len: usize,
    /// Matchers for text-layer input.
    #[serde(default)]
    pub text: Vec<MatcherDef>,
    /// Matchers for OCR input.
    #[serde(default)]
    pub ocr: Vec<MatcherDef>,
}

const fn default_min_item_len() -> usize {
    1
}

/// One candidate matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherDef {
    /// Identifier reported as `matched_pattern_id`.
    pub id: String,
    /// Regular expression.
    pub pattern: String,
    /// Capture group holding the value.
    #[serde(default = "default_group")]
    pub group: usize,
    /// Confidence of values produced by this matcher.
    #[serde(default)]
    pub confidence: Confidence,
    /// Restrict the pattern to one table column (1-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<NonZeroUsize>,
}

const fn default_group() -> usize {
    1
}

/// `[validation]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationDef {
    /// `lesser <= greater` constraints.
    #[serde(default)]
    pub ordering: Vec<OrderingRule>,
}

/// Parses a [`ProfileDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns [`ProfileError::Parse`] if the TOML is malformed or missing
/// required keys.
pub fn parse_profile_toml(name: &str, toml_str: &str) -> Result<ProfileDefinition, ProfileError> {
    toml::de::from_str(toml_str).map_err(|e| ProfileError::Parse {
        name: name.to_owned(),
        message: e.to_string(),
    })
}

// ── Compiled profile ─────────────────────────────────────────────────────

/// A profile with every pattern compiled, ready to run.
#[derive(Debug, Clone)]
pub struct ExtractionProfile {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What reports this profile is for.
    pub description: String,
    /// See [`ProfileDefinition::ocr_on_empty_fields`].
    pub ocr_on_empty_fields: bool,
    /// Record delimiting.
    pub segmentation: SegmentRules,
    /// Continuation handling.
    pub continuation: ContinuationRules,
    /// Fields sorted by priority.
    pub fields: Vec<FieldPattern>,
    /// Consistency checks.
    pub orderings: Vec<OrderingRule>,
}

impl ExtractionProfile {
    /// Field names in output order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Fields with the given scope.
    pub fn fields_in(&self, scope: FieldScope) -> impl Iterator<Item = &FieldPattern> {
        self.fields.iter().filter(move |f| f.scope == scope)
    }

    /// Whether any field matches `text`. Used to judge whether an OCR
    /// reading is plausible.
    #[must_use]
    pub fn any_field_matches(&self, text: &str, ocr: bool) -> bool {
        self.fields
            .iter()
            .any(|field| field.first_match(text, ocr).is_some())
    }
}

impl ProfileDefinition {
    /// Compiles every pattern and checks the profile for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] if a pattern does not compile or lacks its
    /// capture group, a field name is duplicated or reserved, or a
    /// validation rule names an unknown or non-integer field.
    pub fn compile(&self) -> Result<ExtractionProfile, ProfileError> {
        let markers = self
            .segmentation
            .markers
            .iter()
            .map(|m| {
                Ok(Marker {
                    id: m.id.clone(),
                    regex: compile_regex(&m.id, &m.pattern)?,
                })
            })
            .collect::<Result<Vec<_>, ProfileError>>()?;

        let strip = self
            .continuation
            .strip_patterns
            .iter()
            .enumerate()
            .map(|(i, pattern)| compile_regex(&format!("strip_patterns[{i}]"), pattern))
            .collect::<Result<Vec<_>, _>>()?;

        let continuation = ContinuationRules::new(
            &self.continuation.markers,
            self.continuation.trailing_colon,
            strip,
            self.segmentation.min_numeric_marker_len,
        )
        .map_err(|source| ProfileError::Pattern {
            id: "continuation.markers".to_owned(),
            source,
        })?;

        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        for (index, def) in self.fields.iter().enumerate() {
            if RESERVED_KEYS.contains(&def.name.as_str()) {
                return Err(ProfileError::ReservedField(def.name.clone()));
            }
            if !seen.insert(def.name.as_str()) {
                return Err(ProfileError::DuplicateField(def.name.clone()));
            }
            let default_priority = u32::try_from(index).unwrap_or(u32::MAX);
            fields.push(compile_field(def, default_priority)?);
        }
        fields.sort_by_key(|f| f.priority);

        for rule in &self.validation.ordering {
            for name in [&rule.lesser, &rule.greater] {
                let field = fields
                    .iter()
                    .find(|f| &f.name == name)
                    .ok_or_else(|| ProfileError::UnknownField(name.clone()))?;
                if field.kind != FieldKind::Integer {
                    return Err(ProfileError::NonIntegerField(name.clone()));
                }
            }
        }

        log::debug!(
            "Compiled profile {} ({} fields, {} markers)",
            self.id,
            fields.len(),
            markers.len()
        );

        Ok(ExtractionProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            ocr_on_empty_fields: self.ocr_on_empty_fields,
            segmentation: SegmentRules {
                markers,
                min_numeric_marker_len: self.segmentation.min_numeric_marker_len,
            },
            continuation,
            fields,
            orderings: self.validation.ordering.clone(),
        })
    }
}

fn compile_field(def: &FieldDef, default_priority: u32) -> Result<FieldPattern, ProfileError> {
    let item_separator = def
        .item_separator
        .as_deref()
        .map(|pattern| compile_regex(&format!("{}.item_separator", def.name), pattern))
        .transpose()?;
    let item_start = def
        .item_start
        .as_deref()
        .map(|pattern| compile_regex(&format!("{}.item_start", def.name), pattern))
        .transpose()?;

    Ok(FieldPattern {
        name: def.name.clone(),
        kind: def.kind,
        scope: def.scope,
        priority: def.priority.unwrap_or(default_priority),
        title_case: def.title_case,
        item_separator,
        item_start,
        min_item_len: def.min_item_len,
        text: compile_matchers(&def.text)?,
        ocr: compile_matchers(&def.ocr)?,
    })
}

fn compile_matchers(defs: &[MatcherDef]) -> Result<Vec<Matcher>, ProfileError> {
    defs.iter()
        .map(|def| {
            let regex = compile_regex(&def.id, &def.pattern)?;
            if def.group >= regex.captures_len() {
                return Err(ProfileError::MissingGroup {
                    id: def.id.clone(),
                    group: def.group,
                });
            }
            Ok(Matcher {
                id: def.id.clone(),
                regex,
                group: def.group,
                confidence: def.confidence,
                column: def.column,
            })
        })
        .collect()
}

fn compile_regex(id: &str, pattern: &str) -> Result<Regex, ProfileError> {
    Regex::new(pattern).map_err(|source| ProfileError::Pattern {
        id: id.to_owned(),
        source,
    })
}
