//! Region page submission parsing
//!
//! Turns the raw form of one region page into a validated
//! [`RegionSubmission`]. Missing core fields fail the whole page; a bad
//! offensiveness value on a `Stereotype` item degrades to [`NOT_RATED`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Sentinel stored when an offensiveness rating does not apply
pub const NOT_RATED: i64 = -1;
/// Lowest rating on the 0-5 scales
pub const RATING_MIN: i64 = 0;
/// Highest rating on the 0-5 scales
pub const RATING_MAX: i64 = 5;

pub const FAMILIARITY_FIELD: &str = "familiarity_rating";
pub const ITEM_COUNT_FIELD: &str = "num_quiz_items";
/// Region the page was rendered for
pub const REGION_FIELD: &str = "target_region";

/// Categorical judgment for one stereotype item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationLabel {
    Stereotype,
    NotAStereotype,
    NotSure,
}

impl AnnotationLabel {
    pub const ALL: [AnnotationLabel; 3] = [
        AnnotationLabel::Stereotype,
        AnnotationLabel::NotAStereotype,
        AnnotationLabel::NotSure,
    ];

    /// Label as stored in the database and shown on the page
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationLabel::Stereotype => "Stereotype",
            AnnotationLabel::NotAStereotype => "Not a Stereotype",
            AnnotationLabel::NotSure => "Not sure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.as_str() == value)
    }
}

impl fmt::Display for AnnotationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered multi-map of submitted form fields
///
/// Keeps repeated keys (checkbox groups) and answers single lookups with
/// the first value, like an HTML form post.
#[derive(Debug, Clone, Default)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl From<Vec<(String, String)>> for FormFields {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::new(pairs)
    }
}

/// One validated annotation from a region page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationEntry {
    pub category: String,
    pub superset: String,
    pub label: AnnotationLabel,
    /// 0-5 for rated stereotypes, otherwise [`NOT_RATED`]
    pub offensiveness: i64,
}

/// A fully validated region page, ready to be saved atomically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSubmission {
    pub familiarity: i64,
    pub annotations: Vec<AnnotationEntry>,
}

/// Page-level rejection; nothing from the page may be persisted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("Familiarity rating is required. Please try again.")]
    MissingFamiliarity,

    #[error("Invalid familiarity rating '{0}' (must be 0-5).")]
    InvalidFamiliarity(String),

    #[error("Form processing error (missing item count). Please try again.")]
    MissingItemCount,

    #[error("Form processing error (invalid item count '{0}'). Please try again.")]
    InvalidItemCount(String),

    #[error("Incomplete data received for item {}. Submission cancelled for this region.", .index + 1)]
    IncompleteItem { index: usize },

    #[error("Unrecognised annotation '{value}' for item {}. Submission cancelled for this region.", .index + 1)]
    UnknownAnnotation { index: usize, value: String },

    #[error("Offensiveness rating missing for 'Stereotype' item {}. Submission cancelled.", .index + 1)]
    MissingOffensiveness { index: usize },
}

impl RegionSubmission {
    /// Validate a region page form
    pub fn parse(fields: &FormFields) -> Result<Self, SubmissionError> {
        let familiarity = parse_familiarity(fields.get(FAMILIARITY_FIELD))?;

        let raw_count = fields
            .get(ITEM_COUNT_FIELD)
            .ok_or(SubmissionError::MissingItemCount)?;
        let count: usize = raw_count
            .trim()
            .parse()
            .map_err(|_| SubmissionError::InvalidItemCount(raw_count.to_string()))?;

        let mut annotations = Vec::new();
        for index in 0..count {
            annotations.push(parse_item(fields, index)?);
        }

        Ok(Self {
            familiarity,
            annotations,
        })
    }
}

fn parse_familiarity(raw: Option<&str>) -> Result<i64, SubmissionError> {
    let raw = raw.ok_or(SubmissionError::MissingFamiliarity)?;
    match raw.trim().parse::<i64>() {
        Ok(rating) if (RATING_MIN..=RATING_MAX).contains(&rating) => Ok(rating),
        _ => Err(SubmissionError::InvalidFamiliarity(raw.to_string())),
    }
}

fn parse_item(fields: &FormFields, index: usize) -> Result<AnnotationEntry, SubmissionError> {
    let required = |prefix: &str| {
        fields
            .get(&format!("{prefix}_{index}"))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let (category, superset, raw_label) =
        match (required("category"), required("superset"), required("annotation")) {
            (Some(c), Some(s), Some(a)) => (c, s, a),
            _ => return Err(SubmissionError::IncompleteItem { index }),
        };

    let label = AnnotationLabel::parse(raw_label).ok_or_else(|| {
        SubmissionError::UnknownAnnotation {
            index,
            value: raw_label.to_string(),
        }
    })?;

    let offensiveness = if label == AnnotationLabel::Stereotype {
        let raw = fields
            .get(&format!("offensiveness_{index}"))
            .ok_or(SubmissionError::MissingOffensiveness { index })?;
        offensiveness_or_sentinel(raw)
    } else {
        NOT_RATED
    };

    Ok(AnnotationEntry {
        category: category.to_string(),
        superset: superset.to_string(),
        label,
        offensiveness,
    })
}

/// Digits-only value in 0-5, anything else becomes [`NOT_RATED`]
fn offensiveness_or_sentinel(raw: &str) -> i64 {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        tracing::warn!("Non-integer offensiveness rating '{}', storing {}", raw, NOT_RATED);
        return NOT_RATED;
    }
    match raw.parse::<i64>() {
        Ok(rating) if (RATING_MIN..=RATING_MAX).contains(&rating) => rating,
        _ => {
            tracing::warn!("Out-of-range offensiveness rating '{}', storing {}", raw, NOT_RATED);
            NOT_RATED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FormFields {
        FormFields::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn item(index: usize, label: &str, rating: Option<&str>) -> Vec<(String, String)> {
        let mut pairs = vec![
            (format!("category_{index}"), "Food".to_string()),
            (format!("superset_{index}"), format!("Attr {index}")),
            (format!("annotation_{index}"), label.to_string()),
        ];
        if let Some(rating) = rating {
            pairs.push((format!("offensiveness_{index}"), rating.to_string()));
        }
        pairs
    }

    fn page(familiarity: &str, count: &str, items: Vec<Vec<(String, String)>>) -> FormFields {
        let mut pairs = vec![
            (FAMILIARITY_FIELD.to_string(), familiarity.to_string()),
            (ITEM_COUNT_FIELD.to_string(), count.to_string()),
        ];
        pairs.extend(items.into_iter().flatten());
        FormFields::new(pairs)
    }

    #[test]
    fn test_form_fields_first_value_and_all_values() {
        let f = fields(&[("selected", "A"), ("name", "x"), ("selected", "B")]);
        assert_eq!(f.get("selected"), Some("A"));
        assert_eq!(f.get_all("selected"), vec!["A", "B"]);
        assert_eq!(f.get("missing"), None);
    }

    #[test]
    fn test_three_items_mixed_labels() {
        let form = page(
            "3",
            "3",
            vec![
                item(0, "Stereotype", Some("4")),
                item(1, "Not sure", None),
                item(2, "Not a Stereotype", Some("5")),
            ],
        );
        let submission = RegionSubmission::parse(&form).unwrap();
        assert_eq!(submission.familiarity, 3);
        let ratings: Vec<i64> = submission.annotations.iter().map(|a| a.offensiveness).collect();
        assert_eq!(ratings, vec![4, NOT_RATED, NOT_RATED]);
        assert_eq!(submission.annotations[2].label, AnnotationLabel::NotAStereotype);
    }

    #[test]
    fn test_familiarity_required_and_bounded() {
        assert_eq!(
            RegionSubmission::parse(&fields(&[(ITEM_COUNT_FIELD, "0")])),
            Err(SubmissionError::MissingFamiliarity)
        );
        for bad in ["6", "-1", "abc", ""] {
            assert_eq!(
                RegionSubmission::parse(&page(bad, "0", vec![])),
                Err(SubmissionError::InvalidFamiliarity(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_item_count_required_and_numeric() {
        assert_eq!(
            RegionSubmission::parse(&fields(&[(FAMILIARITY_FIELD, "2")])),
            Err(SubmissionError::MissingItemCount)
        );
        assert_eq!(
            RegionSubmission::parse(&page("2", "three", vec![])),
            Err(SubmissionError::InvalidItemCount("three".to_string()))
        );
        assert_eq!(
            RegionSubmission::parse(&page("2", "-1", vec![])),
            Err(SubmissionError::InvalidItemCount("-1".to_string()))
        );
    }

    #[test]
    fn test_zero_items_is_valid() {
        let submission = RegionSubmission::parse(&page("0", "0", vec![])).unwrap();
        assert!(submission.annotations.is_empty());
    }

    #[test]
    fn test_declared_count_exceeds_complete_items() {
        let form = page(
            "4",
            "3",
            vec![item(0, "Not sure", None), item(1, "Not sure", None)],
        );
        assert_eq!(
            RegionSubmission::parse(&form),
            Err(SubmissionError::IncompleteItem { index: 2 })
        );
    }

    #[test]
    fn test_blank_core_field_is_incomplete() {
        let mut pairs = item(0, "Not sure", None);
        pairs[1].1 = "   ".to_string();
        let form = page("1", "1", vec![pairs]);
        assert_eq!(
            RegionSubmission::parse(&form),
            Err(SubmissionError::IncompleteItem { index: 0 })
        );
    }

    #[test]
    fn test_unknown_annotation_label() {
        let form = page("1", "1", vec![item(0, "Maybe", None)]);
        assert!(matches!(
            RegionSubmission::parse(&form),
            Err(SubmissionError::UnknownAnnotation { index: 0, .. })
        ));
    }

    #[test]
    fn test_stereotype_rating_degrades_to_sentinel() {
        for raw in ["9", "abc", "", "-2", "3.5", "99999999999999999999999"] {
            let form = page("1", "1", vec![item(0, "Stereotype", Some(raw))]);
            let submission = RegionSubmission::parse(&form).unwrap();
            assert_eq!(submission.annotations[0].offensiveness, NOT_RATED, "input {raw:?}");
        }
        for raw in ["0", "5"] {
            let form = page("1", "1", vec![item(0, "Stereotype", Some(raw))]);
            let submission = RegionSubmission::parse(&form).unwrap();
            assert_eq!(submission.annotations[0].offensiveness, raw.parse::<i64>().unwrap());
        }
    }

    #[test]
    fn test_stereotype_without_rating_fails_page() {
        let form = page("1", "1", vec![item(0, "Stereotype", None)]);
        assert_eq!(
            RegionSubmission::parse(&form),
            Err(SubmissionError::MissingOffensiveness { index: 0 })
        );
    }

    #[test]
    fn test_error_messages_are_one_based() {
        let msg = SubmissionError::IncompleteItem { index: 0 }.to_string();
        assert!(msg.contains("item 1"));
    }
}
