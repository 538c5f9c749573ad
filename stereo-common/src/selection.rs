//! Participant identity and target region selection
//!
//! Both validators are pure: they never touch the session or the database,
//! so a rejected entry form leaves no trace anywhere.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lowest accepted participant age
pub const MIN_AGE: i64 = 1;
/// Highest accepted participant age
pub const MAX_AGE: i64 = 120;

/// Validated participant profile, fixed for the whole quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub native_region: String,
    pub age: i64,
    pub sex: String,
}

/// Raw entry form values, exactly as submitted
#[derive(Debug, Clone, Default)]
pub struct EntryForm {
    pub name: Option<String>,
    pub native_region: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
    pub selected_regions: Vec<String>,
}

/// Why a target region selection was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    WrongCount { expected: usize, actual: usize },
    NativeInTargets,
    UnknownRegions(Vec<String>),
    DuplicateRegions(Vec<String>),
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::WrongCount { expected, .. } => {
                write!(f, "Please select exactly {} target regions.", expected)
            }
            SelectionError::NativeInTargets => write!(
                f,
                "You cannot select your native region as a target region. Please uncheck it."
            ),
            SelectionError::UnknownRegions(regions) => write!(
                f,
                "Invalid target region(s) selected: {}. Please refresh and try again.",
                regions.join(", ")
            ),
            SelectionError::DuplicateRegions(regions) => write!(
                f,
                "Each target region may be selected only once (repeated: {}).",
                regions.join(", ")
            ),
        }
    }
}

/// Entry form problems, reported together
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    MissingName,
    InvalidNativeRegion,
    MissingSex,
    MissingAge,
    AgeNotANumber,
    AgeOutOfRange(i64),
    DefinitionsUnavailable,
    Selection(SelectionError),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::MissingName => write!(f, "Name is required."),
            IdentityError::InvalidNativeRegion => {
                write!(f, "Please select your valid native region.")
            }
            IdentityError::MissingSex => write!(f, "Please select your sex."),
            IdentityError::MissingAge => write!(f, "Age is required."),
            IdentityError::AgeNotANumber => write!(f, "Please enter a valid number for age."),
            IdentityError::AgeOutOfRange(_) => write!(f, "Please enter a valid age."),
            IdentityError::DefinitionsUnavailable => write!(
                f,
                "Application error: region data could not be loaded. Please contact support."
            ),
            IdentityError::Selection(e) => fmt::Display::fmt(e, f),
        }
    }
}

/// Validate a target region selection
///
/// Checks run in a fixed order (count, native, unknown, duplicates) and the
/// first failure is reported. Total and side-effect free.
pub fn validate_selection<S: AsRef<str>>(
    native: &str,
    selected: &[S],
    all_regions: &[String],
    k: usize,
) -> Result<(), SelectionError> {
    if selected.len() != k {
        return Err(SelectionError::WrongCount {
            expected: k,
            actual: selected.len(),
        });
    }

    if selected.iter().any(|s| s.as_ref() == native) {
        return Err(SelectionError::NativeInTargets);
    }

    let unknown: Vec<String> = selected
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !all_regions.iter().any(|r| r == s))
        .map(str::to_string)
        .collect();
    if !unknown.is_empty() {
        return Err(SelectionError::UnknownRegions(unknown));
    }

    let mut seen = BTreeSet::new();
    let mut repeated = BTreeSet::new();
    for s in selected {
        if !seen.insert(s.as_ref()) {
            repeated.insert(s.as_ref().to_string());
        }
    }
    if !repeated.is_empty() {
        return Err(SelectionError::DuplicateRegions(repeated.into_iter().collect()));
    }

    Ok(())
}

impl Participant {
    /// Validate the entry form into a participant and their target regions
    ///
    /// Identity fields are all checked so every problem can be shown at
    /// once; the region selection is only checked when they pass. The
    /// returned regions are in submission order (shuffling happens when the
    /// quiz starts).
    pub fn from_entry_form(
        form: &EntryForm,
        all_regions: &[String],
        k: usize,
    ) -> Result<(Participant, Vec<String>), Vec<IdentityError>> {
        let mut errors = Vec::new();

        let name = form.name.as_deref().unwrap_or("").trim().to_string();
        if name.is_empty() {
            errors.push(IdentityError::MissingName);
        }

        if all_regions.is_empty() {
            errors.push(IdentityError::DefinitionsUnavailable);
            return Err(errors);
        }

        let native_region = form.native_region.as_deref().unwrap_or("").to_string();
        if native_region.is_empty() || !all_regions.iter().any(|r| *r == native_region) {
            errors.push(IdentityError::InvalidNativeRegion);
        }

        let sex = form.sex.as_deref().unwrap_or("").trim().to_string();
        if sex.is_empty() {
            errors.push(IdentityError::MissingSex);
        }

        let age = match form.age.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push(IdentityError::MissingAge);
                None
            }
            Some(raw) => match raw.parse::<i64>() {
                Ok(age) if (MIN_AGE..=MAX_AGE).contains(&age) => Some(age),
                Ok(age) => {
                    errors.push(IdentityError::AgeOutOfRange(age));
                    None
                }
                Err(_) => {
                    errors.push(IdentityError::AgeNotANumber);
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        if let Err(e) = validate_selection(&native_region, &form.selected_regions, all_regions, k) {
            return Err(vec![IdentityError::Selection(e)]);
        }

        let participant = Participant {
            name,
            native_region,
            // Checked above
            age: age.unwrap_or(MIN_AGE),
            sex,
        };
        Ok((participant, form.selected_regions.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions() -> Vec<String> {
        ["A", "B", "C", "D", "E", "F", "G"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn entry(selected: &[&str]) -> EntryForm {
        EntryForm {
            name: Some("  Asha ".to_string()),
            native_region: Some("F".to_string()),
            age: Some("29".to_string()),
            sex: Some("Female".to_string()),
            selected_regions: selected.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_valid_selection_accepted() {
        assert_eq!(
            validate_selection("F", &["A", "B", "C", "D", "E"], &regions(), 5),
            Ok(())
        );
    }

    #[test]
    fn test_wrong_count() {
        assert_eq!(
            validate_selection("F", &["A", "B"], &regions(), 5),
            Err(SelectionError::WrongCount {
                expected: 5,
                actual: 2
            })
        );
    }

    #[test]
    fn test_native_in_targets() {
        assert_eq!(
            validate_selection("G", &["A", "B", "C", "D", "G"], &regions(), 5),
            Err(SelectionError::NativeInTargets)
        );
    }

    #[test]
    fn test_unknown_regions_listed() {
        assert_eq!(
            validate_selection("F", &["A", "B", "C", "X", "Y"], &regions(), 5),
            Err(SelectionError::UnknownRegions(vec![
                "X".to_string(),
                "Y".to_string()
            ]))
        );
    }

    #[test]
    fn test_duplicates_rejected() {
        assert_eq!(
            validate_selection("F", &["A", "A", "B", "C", "D"], &regions(), 5),
            Err(SelectionError::DuplicateRegions(vec!["A".to_string()]))
        );
    }

    #[test]
    fn test_entry_form_valid() {
        let (participant, selected) =
            Participant::from_entry_form(&entry(&["A", "B", "C", "D", "E"]), &regions(), 5)
                .unwrap();
        assert_eq!(participant.name, "Asha");
        assert_eq!(participant.native_region, "F");
        assert_eq!(participant.age, 29);
        assert_eq!(selected, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_entry_form_collects_identity_errors() {
        let form = EntryForm {
            name: Some("   ".to_string()),
            native_region: Some("Atlantis".to_string()),
            age: Some("abc".to_string()),
            sex: None,
            selected_regions: vec![],
        };
        let errors = Participant::from_entry_form(&form, &regions(), 5).unwrap_err();
        assert_eq!(
            errors,
            vec![
                IdentityError::MissingName,
                IdentityError::InvalidNativeRegion,
                IdentityError::MissingSex,
                IdentityError::AgeNotANumber,
            ]
        );
    }

    #[test]
    fn test_age_bounds() {
        let mut form = entry(&["A", "B", "C", "D", "E"]);
        form.age = Some("0".to_string());
        assert_eq!(
            Participant::from_entry_form(&form, &regions(), 5).unwrap_err(),
            vec![IdentityError::AgeOutOfRange(0)]
        );
        form.age = Some("120".to_string());
        assert!(Participant::from_entry_form(&form, &regions(), 5).is_ok());
        form.age = Some("121".to_string());
        assert!(Participant::from_entry_form(&form, &regions(), 5).is_err());
    }

    #[test]
    fn test_selection_checked_after_identity() {
        let errors =
            Participant::from_entry_form(&entry(&["A", "B", "C", "D", "F"]), &regions(), 5)
                .unwrap_err();
        assert_eq!(
            errors,
            vec![IdentityError::Selection(SelectionError::NativeInTargets)]
        );
    }

    #[test]
    fn test_no_regions_loaded() {
        let errors = Participant::from_entry_form(&entry(&["A"]), &[], 5).unwrap_err();
        assert!(errors.contains(&IdentityError::DefinitionsUnavailable));
    }
}
