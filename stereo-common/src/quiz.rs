//! Quiz state machine
//!
//! A participant walks through their K target regions one page at a time.
//! Progress is an explicit tagged state; the only ways forward are
//! [`QuizState::start`] and a committed [`submit_region`]. Failed attempts
//! hand back an error and leave the caller's state untouched.

use crate::db::results::save_region;
use crate::selection::Participant;
use crate::submission::{FormFields, RegionSubmission, SubmissionError, REGION_FIELD};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

/// Where a participant is in the survey
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuizState {
    #[default]
    NotStarted,
    InProgress {
        participant: Participant,
        /// Shuffled once at start, fixed afterwards
        targets: Vec<String>,
        index: usize,
    },
    Complete {
        participant: Participant,
        targets: Vec<String>,
    },
}

/// Rejected region page
#[derive(Debug, Error)]
pub enum QuizError {
    /// Validation failed; nothing was written
    #[error("{0}")]
    Invalid(#[from] SubmissionError),

    /// Storage failed; the transaction was rolled back
    #[error("A database error occurred while saving. Please try submitting this region again.")]
    Storage(#[source] crate::Error),

    /// The page was rendered for a region that is no longer current
    #[error("This page for '{submitted}' was already submitted; the survey has moved on to '{current}'.")]
    StaleRegion { submitted: String, current: String },

    /// No region is awaiting a submission
    #[error("Your session has expired or is invalid. Please start again.")]
    NoActiveRegion,
}

impl QuizState {
    /// Begin the quiz with an already validated selection
    pub fn start<R: Rng + ?Sized>(
        participant: Participant,
        mut targets: Vec<String>,
        rng: &mut R,
    ) -> Self {
        targets.shuffle(rng);
        info!(
            participant = %participant.name,
            native_region = %participant.native_region,
            regions = targets.len(),
            "Quiz started"
        );
        if targets.is_empty() {
            return QuizState::Complete {
                participant,
                targets,
            };
        }
        QuizState::InProgress {
            participant,
            targets,
            index: 0,
        }
    }

    /// Number of committed regions
    pub fn progress(&self) -> usize {
        match self {
            QuizState::NotStarted => 0,
            QuizState::InProgress { index, .. } => *index,
            QuizState::Complete { targets, .. } => targets.len(),
        }
    }

    /// Number of regions in this participant's quiz
    pub fn total(&self) -> usize {
        match self {
            QuizState::NotStarted => 0,
            QuizState::InProgress { targets, .. } | QuizState::Complete { targets, .. } => {
                targets.len()
            }
        }
    }

    /// Region awaiting a submission, if any
    pub fn current_target(&self) -> Option<&str> {
        match self {
            QuizState::InProgress { targets, index, .. } => targets.get(*index).map(String::as_str),
            _ => None,
        }
    }

    pub fn participant(&self) -> Option<&Participant> {
        match self {
            QuizState::NotStarted => None,
            QuizState::InProgress { participant, .. } | QuizState::Complete { participant, .. } => {
                Some(participant)
            }
        }
    }

    /// Presentation order of the target regions
    pub fn targets(&self) -> &[String] {
        match self {
            QuizState::NotStarted => &[],
            QuizState::InProgress { targets, .. } | QuizState::Complete { targets, .. } => targets,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, QuizState::Complete { .. })
    }

    /// Move past the current region after it committed
    ///
    /// Only `InProgress` can advance; other states are returned unchanged.
    pub fn advance(self) -> Self {
        match self {
            QuizState::InProgress {
                participant,
                targets,
                index,
            } => {
                let next = index + 1;
                if next >= targets.len() {
                    info!(participant = %participant.name, "Quiz complete");
                    QuizState::Complete {
                        participant,
                        targets,
                    }
                } else {
                    QuizState::InProgress {
                        participant,
                        targets,
                        index: next,
                    }
                }
            }
            other => other,
        }
    }
}

/// Validate and persist the current region page
///
/// On success returns the advanced state. On any error nothing was
/// committed and the caller keeps `state` as it was, so the same region is
/// shown again. A page naming another region in `target_region` (a replay
/// of an earlier page) is refused before anything is parsed.
pub async fn submit_region(
    pool: &SqlitePool,
    state: &QuizState,
    fields: &FormFields,
) -> Result<QuizState, QuizError> {
    let (participant, target) = match (state.participant(), state.current_target()) {
        (Some(participant), Some(target)) => (participant, target),
        _ => return Err(QuizError::NoActiveRegion),
    };

    if let Some(submitted) = fields.get(REGION_FIELD) {
        if submitted != target {
            warn!(
                participant = %participant.name,
                submitted_region = submitted,
                target_region = target,
                "Stale region page refused"
            );
            return Err(QuizError::StaleRegion {
                submitted: submitted.to_string(),
                current: target.to_string(),
            });
        }
    }

    let submission = RegionSubmission::parse(fields).map_err(|e| {
        warn!(
            participant = %participant.name,
            target_region = target,
            "Region submission rejected: {}",
            e
        );
        e
    })?;

    save_region(pool, participant, target, &submission)
        .await
        .map_err(|e| {
            tracing::error!(
                participant = %participant.name,
                target_region = target,
                "Region save rolled back: {}",
                e
            );
            QuizError::Storage(e)
        })?;

    Ok(state.clone().advance())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn participant() -> Participant {
        Participant {
            name: "Ravi".to_string(),
            native_region: "F".to_string(),
            age: 41,
            sex: "Male".to_string(),
        }
    }

    fn selection() -> Vec<String> {
        ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_start_shuffles_a_permutation() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let state = QuizState::start(participant(), selection(), &mut rng);
            let mut presented = state.targets().to_vec();
            presented.sort();
            assert_eq!(presented, selection());
            assert_eq!(state.progress(), 0);
            assert_eq!(state.total(), 5);
        }
    }

    #[test]
    fn test_advance_is_monotonic_until_complete() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = QuizState::start(participant(), selection(), &mut rng);
        let order = state.targets().to_vec();

        for step in 0..5 {
            assert_eq!(state.progress(), step);
            assert_eq!(state.current_target(), Some(order[step].as_str()));
            state = state.advance();
        }

        assert!(state.is_complete());
        assert_eq!(state.progress(), 5);
        assert_eq!(state.current_target(), None);
        assert_eq!(state.targets(), order.as_slice());

        // Advancing a finished quiz changes nothing
        assert_eq!(state.clone().advance(), state);
    }

    #[test]
    fn test_not_started_has_no_region() {
        let state = QuizState::default();
        assert_eq!(state, QuizState::NotStarted);
        assert_eq!(state.current_target(), None);
        assert_eq!(state.participant(), None);
        assert_eq!(state.clone().advance(), QuizState::NotStarted);
    }

    #[test]
    fn test_empty_selection_completes_immediately() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = QuizState::start(participant(), Vec::new(), &mut rng);
        assert!(state.is_complete());
    }

    #[tokio::test]
    async fn test_submit_without_active_region() {
        let pool = crate::db::init_memory_database().await.unwrap();
        let result = submit_region(&pool, &QuizState::NotStarted, &FormFields::default()).await;
        assert!(matches!(result, Err(QuizError::NoActiveRegion)));
    }
}
