use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    catalog::{Catalog, Flashcard},
    config::{ConfigError, SchedulePolicy},
    core::{
        ledger::EnrollmentLedger,
        progress::{LevelProgress, level_progress},
    },
    enrollment::{EnrollmentRecord, Recall, RecallOutcome},
    error::SchedulerResult,
    op::StoredOp,
    types::{FlashcardId, Timestamp, UserId},
};

/// Applies recall outcomes to the ledger and answers due/learnable queries.
///
/// Every card is in exactly one of three states for a user: learnable (no
/// record), enrolled and due, or enrolled and not yet due. Both outcomes move
/// `next_review_at` strictly past `now`; elapsed wall-clock time is the only
/// way back to due.
#[derive(Debug)]
pub struct Scheduler {
    ledger: EnrollmentLedger,
    catalog: Arc<Catalog>,
    policy: SchedulePolicy,
}

impl Scheduler {
    /// Wraps `ledger` and `catalog`; fails if `policy` is degenerate.
    pub fn new(
        ledger: EnrollmentLedger,
        catalog: Arc<Catalog>,
        policy: SchedulePolicy,
    ) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            ledger,
            catalog,
            policy,
        })
    }

    /// Adds `flashcard` to the user's deck, due immediately.
    pub fn enroll(
        &mut self,
        user: UserId,
        flashcard: FlashcardId,
        now: Timestamp,
    ) -> SchedulerResult<EnrollmentRecord> {
        self.catalog.flashcard(flashcard)?;
        let record = self
            .ledger
            .create(user, flashcard, self.policy.baseline_interval, now)?;
        info!(user, flashcard, "flashcard enrolled");
        Ok(record)
    }

    /// Records a correct recall: the interval grows and experience is granted.
    pub fn mark_correct(
        &mut self,
        user: UserId,
        flashcard: FlashcardId,
        now: Timestamp,
    ) -> SchedulerResult<RecallOutcome> {
        self.apply_recall(user, flashcard, Recall::Correct, now)
    }

    /// Records a miss: the card comes back after the penalty interval.
    pub fn mark_incorrect(
        &mut self,
        user: UserId,
        flashcard: FlashcardId,
        now: Timestamp,
    ) -> SchedulerResult<RecallOutcome> {
        self.apply_recall(user, flashcard, Recall::Incorrect, now)
    }

    /// Applies one outcome and its experience grant as a single ledger step.
    ///
    /// Not idempotent: applying the same outcome twice grows the interval
    /// (or re-arms the penalty) twice.
    pub fn apply_recall(
        &mut self,
        user: UserId,
        flashcard: FlashcardId,
        recall: Recall,
        now: Timestamp,
    ) -> SchedulerResult<RecallOutcome> {
        let policy = &self.policy;
        let experience = match recall {
            Recall::Correct => policy.correct_experience,
            Recall::Incorrect => 0,
        };
        let outcome = self
            .ledger
            .update(user, flashcard, now, recall, experience, |rec| {
                transition(rec, recall, policy, now)
            })?;
        info!(
            user,
            flashcard,
            ?recall,
            interval = outcome.record.previous_interval,
            next_review_at = outcome.record.next_review_at,
            "recall applied"
        );
        Ok(outcome)
    }

    /// Enrolled cards with `next_review_at <= now`, in catalog order.
    pub fn due_for_review(&self, user: UserId, now: Timestamp) -> Vec<Flashcard> {
        let due = self.ledger.list_due(&self.catalog, user, now);
        debug!(user, now, count = due.len(), "due query");
        due
    }

    /// Catalog cards the user has not enrolled yet.
    pub fn learnable(&self, user: UserId) -> Vec<Flashcard> {
        let learnable = self.ledger.list_learnable(&self.catalog, user);
        debug!(user, count = learnable.len(), "learnable query");
        learnable
    }

    /// Copy of the current record for the pair.
    pub fn record(&self, user: UserId, flashcard: FlashcardId) -> SchedulerResult<EnrollmentRecord> {
        self.ledger.get(user, flashcard).cloned()
    }

    /// Experience total and the level it reaches.
    pub fn progress(&self, user: UserId) -> LevelProgress {
        level_progress(self.ledger.experience(user))
    }

    /// Shared catalog the scheduler validates against.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Read access to the underlying ledger.
    pub fn ledger(&self) -> &EnrollmentLedger {
        &self.ledger
    }

    /// Ops for mutations applied since the last drain, oldest first.
    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        self.ledger.drain_pending_ops()
    }
}

/// The two-transition review policy.
///
/// A correct recall grows the interval geometrically from the previous one;
/// a miss collapses it to the fixed penalty regardless of history.
pub fn transition(
    record: &mut EnrollmentRecord,
    recall: Recall,
    policy: &SchedulePolicy,
    now: Timestamp,
) {
    match recall {
        Recall::Correct => {
            let interval = policy.grow(record.previous_interval);
            record.previous_interval = interval;
            record.correct_streak = record.correct_streak.saturating_add(1);
            record.next_review_at = now.saturating_add(interval);
        }
        Recall::Incorrect => {
            record.correct_streak = 0;
            record.previous_interval = policy.penalty_interval;
            record.next_review_at = now.saturating_add(policy.penalty_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(previous_interval: u64, streak: u32) -> EnrollmentRecord {
        EnrollmentRecord {
            user: 1,
            flashcard: 1,
            correct_streak: streak,
            previous_interval,
            next_review_at: 0,
            version: 3,
        }
    }

    #[test]
    fn correct_grows_interval_and_streak() {
        let policy = SchedulePolicy::default();
        let mut rec = record(30, 0);
        transition(&mut rec, Recall::Correct, &policy, 1_000);
        assert_eq!(rec.previous_interval, 75);
        assert_eq!(rec.correct_streak, 1);
        assert_eq!(rec.next_review_at, 1_075);
    }

    #[test]
    fn incorrect_ignores_history() {
        let policy = SchedulePolicy::default();
        let mut rec = record(86_400 * 30, 12);
        transition(&mut rec, Recall::Incorrect, &policy, 500);
        assert_eq!(rec.correct_streak, 0);
        assert_eq!(rec.previous_interval, 60);
        assert_eq!(rec.next_review_at, 560);
    }
}
