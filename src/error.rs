//! Typed failures surfaced by scheduler, ledger and sampler operations.

use thiserror::Error;

use crate::{
    persist::PersistError,
    types::{DifficultyTier, FlashcardId, UserId},
};

/// Result alias used by scheduler-facing operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Failure taxonomy shared by every scheduler operation.
///
/// Storage rejections that mirror a domain rule (duplicate enrollment,
/// missing record, stale version) map onto the matching variant; every
/// other storage failure passes through as [`SchedulerError::Storage`].
/// Nothing in the crate retries on the caller's behalf.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No enrollment record exists for the pair.
    #[error("user {user} has not enrolled flashcard {flashcard}")]
    EnrollmentNotFound {
        /// Learner.
        user: UserId,
        /// Flashcard.
        flashcard: FlashcardId,
    },
    /// The flashcard id is not in the catalog.
    #[error("unknown flashcard {0}")]
    UnknownFlashcard(FlashcardId),
    /// The pair is already enrolled.
    #[error("user {user} already enrolled flashcard {flashcard}")]
    AlreadyEnrolled {
        /// Learner.
        user: UserId,
        /// Flashcard.
        flashcard: FlashcardId,
    },
    /// The tier has no quiz items at all.
    #[error("no quiz items at tier {0}")]
    NoContent(DifficultyTier),
    /// The tier cannot supply enough distinct distractors.
    #[error("tier {tier} has {available} distractor candidates, {required} required")]
    InsufficientContent {
        /// Tier that was sampled.
        tier: DifficultyTier,
        /// Items other than the question at this tier.
        available: usize,
        /// Distractors needed.
        required: usize,
    },
    /// A review was computed against a record version that no longer holds.
    #[error(
        "conflicting update for user {user} flashcard {flashcard}: expected version {expected}, found {found}"
    )]
    Conflict {
        /// Learner.
        user: UserId,
        /// Flashcard.
        flashcard: FlashcardId,
        /// Version the update was computed against.
        expected: u64,
        /// Version actually present.
        found: u64,
    },
    /// The runtime or its persistence queue cannot take the request.
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),
    /// The request did not complete within the configured deadline.
    #[error("scheduler request timed out")]
    Timeout,
    /// Storage layer failure.
    #[error(transparent)]
    Storage(PersistError),
}

impl From<PersistError> for SchedulerError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::DuplicateEnrollment { user, flashcard } => {
                Self::AlreadyEnrolled { user, flashcard }
            }
            PersistError::MissingEnrollment { user, flashcard } => {
                Self::EnrollmentNotFound { user, flashcard }
            }
            PersistError::VersionMismatch {
                user,
                flashcard,
                expected,
                found,
            } => Self::Conflict {
                user,
                flashcard,
                expected,
                found,
            },
            other => Self::Storage(other),
        }
    }
}
