//! Shared primitive IDs, time units and the difficulty tier enum.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, already-authenticated learner identifier.
pub type UserId = u64;
/// Catalog flashcard identifier.
pub type FlashcardId = u64;
/// Catalog quiz item identifier.
pub type QuizItemId = u64;
/// Monotonic operation sequence number.
pub type OpSeq = u64;
/// Point in time as whole seconds since the unix epoch.
pub type Timestamp = u64;
/// Duration in whole seconds.
pub type Seconds = u64;

/// Catalog partition used to match quiz difficulty to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DifficultyTier {
    /// Single letters and short words.
    Beginner,
    /// Longer words and phrases.
    Advanced,
}

impl DifficultyTier {
    /// Stable storage code for this tier.
    pub fn as_code(self) -> i64 {
        match self {
            Self::Beginner => 0,
            Self::Advanced => 1,
        }
    }

    /// Inverse of [`DifficultyTier::as_code`].
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Beginner),
            1 => Some(Self::Advanced),
            _ => None,
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beginner => f.write_str("beginner"),
            Self::Advanced => f.write_str("advanced"),
        }
    }
}
