//! Per-(user, flashcard) review state and recall outcomes.

use serde::{Deserialize, Serialize};

use crate::types::{FlashcardId, Seconds, Timestamp, UserId};

/// Review state for one enrolled flashcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    /// Learner that enrolled the card.
    pub user: UserId,
    /// Enrolled flashcard.
    pub flashcard: FlashcardId,
    /// Consecutive correct recalls since the last miss.
    pub correct_streak: u32,
    /// Base interval for the next growth step.
    pub previous_interval: Seconds,
    /// Earliest time the card is due again.
    pub next_review_at: Timestamp,
    /// Bumped on every applied outcome.
    pub version: u64,
}

impl EnrollmentRecord {
    /// Fresh record, due immediately at `now`.
    pub fn new(user: UserId, flashcard: FlashcardId, baseline: Seconds, now: Timestamp) -> Self {
        Self {
            user,
            flashcard,
            correct_streak: 0,
            previous_interval: baseline,
            next_review_at: now,
            version: 0,
        }
    }

    /// The `(user, flashcard)` pair identifying this record.
    pub fn key(&self) -> (UserId, FlashcardId) {
        (self.user, self.flashcard)
    }

    /// True when `next_review_at` has elapsed at `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.next_review_at <= now
    }
}

/// What the learner reported for one review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recall {
    /// Recalled correctly.
    Correct,
    /// Missed.
    Incorrect,
}

/// Result of applying one recall outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallOutcome {
    /// Record after the transition.
    pub record: EnrollmentRecord,
    /// Outcome that was applied.
    pub recall: Recall,
    /// Experience granted by this review.
    pub experience_granted: u64,
    /// Learner's experience total after the grant.
    pub experience_total: u64,
}
