//! Runtime event stream payloads.

use crate::{
    enrollment::Recall,
    types::{FlashcardId, OpSeq, Timestamp, UserId},
};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A flashcard was added to a deck.
    Enrolled {
        /// Learner.
        user: UserId,
        /// Enrolled flashcard.
        flashcard: FlashcardId,
    },
    /// A recall outcome was applied.
    Reviewed {
        /// Learner.
        user: UserId,
        /// Reviewed flashcard.
        flashcard: FlashcardId,
        /// Applied outcome.
        recall: Recall,
        /// New due time.
        next_review_at: Timestamp,
    },
    /// Experience was granted as part of a review.
    ExperienceGranted {
        /// Learner.
        user: UserId,
        /// Amount granted.
        amount: u64,
        /// Total after the grant.
        total: u64,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
