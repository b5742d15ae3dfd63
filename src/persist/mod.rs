/// SQLite journal, enrollment table and catalog storage.
pub mod sqlite;

use thiserror::Error;

use crate::{
    op::StoredOp,
    types::{FlashcardId, OpSeq, UserId},
};

/// Failures raised while writing or reading durable state.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Driver or constraint failure from SQLite.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Op payload could not be encoded or decoded.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// An enroll op targeted a pair that already has a stored row.
    #[error("stored enrollment already exists for user {user} flashcard {flashcard}")]
    DuplicateEnrollment {
        /// Learner.
        user: UserId,
        /// Flashcard.
        flashcard: FlashcardId,
    },
    /// A review op targeted a pair with no stored row.
    #[error("no stored enrollment for user {user} flashcard {flashcard}")]
    MissingEnrollment {
        /// Learner.
        user: UserId,
        /// Flashcard.
        flashcard: FlashcardId,
    },
    /// A review op was computed against a version the stored row no longer has.
    #[error("stored version {found} for user {user} flashcard {flashcard}, op expected {expected}")]
    VersionMismatch {
        /// Learner.
        user: UserId,
        /// Flashcard.
        flashcard: FlashcardId,
        /// Version the op was computed against.
        expected: u64,
        /// Version in storage.
        found: u64,
    },
    /// Anything else, already formatted.
    #[error("{0}")]
    Message(String),
}

/// Result alias for storage calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Destination for journaled ledger operations.
///
/// `append_ops` must apply the whole slice atomically and in order, and
/// return the sequence of its last op.
pub trait OpSink: Send {
    /// Durably records `ops`, which is never empty.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;

    /// Pushes buffered writes down to stable storage.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}
