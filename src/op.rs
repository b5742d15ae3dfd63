//! Mutation operation model and persistence wrappers.

use serde::{Deserialize, Serialize};

use crate::{
    enrollment::{EnrollmentRecord, Recall},
    types::{OpSeq, Timestamp},
};

/// Version number for serialized [`StoredOpEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Immutable operation appended to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// A flashcard was added to a learner's deck.
    Enroll {
        /// Record as created.
        record: EnrollmentRecord,
    },
    /// A recall outcome was applied.
    Review {
        /// Record after the transition.
        record: EnrollmentRecord,
        /// Outcome that produced it.
        recall: Recall,
        /// Version of the record the transition was computed from.
        expected_version: u64,
        /// Experience granted alongside the transition.
        experience: u64,
    },
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Monotonic operation sequence.
    pub seq: OpSeq,
    /// Caller-supplied time the operation was applied at.
    pub ts: Timestamp,
    /// Operation body.
    pub op: Op,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped operation.
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}
