use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{Catalog, Flashcard},
    enrollment::{EnrollmentRecord, Recall, RecallOutcome},
    error::{SchedulerError, SchedulerResult},
    op::{Op, StoredOp},
    types::{FlashcardId, OpSeq, Seconds, Timestamp, UserId},
};

type Key = (UserId, FlashcardId);

/// Plain-data view of a ledger, in enrollment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Sequence the next mutation will be journaled under.
    pub next_op_seq: OpSeq,
    /// Records in the order they were enrolled.
    pub records: Vec<EnrollmentRecord>,
    /// Experience totals sorted by user.
    pub experience: Vec<(UserId, u64)>,
}

/// Sole owner of enrollment records and per-user experience totals.
///
/// Every successful mutation queues exactly one [`StoredOp`]; callers drain
/// them with [`EnrollmentLedger::drain_pending_ops`] and hand them to a sink.
#[derive(Debug, Default)]
pub struct EnrollmentLedger {
    records: HashMap<Key, EnrollmentRecord>,
    order: Vec<Key>,
    experience: HashMap<UserId, u64>,
    pending_ops: Vec<StoredOp>,
    next_op_seq: OpSeq,
}

impl EnrollmentLedger {
    /// Empty ledger journaling from sequence 1.
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a ledger from persisted state; duplicate keys are rejected.
    pub fn from_state(state: LedgerState) -> SchedulerResult<Self> {
        let mut ledger = Self {
            next_op_seq: state.next_op_seq.max(1),
            experience: state.experience.into_iter().collect(),
            ..Self::default()
        };

        for rec in state.records {
            let (user, flashcard) = rec.key();
            if ledger.records.contains_key(&(user, flashcard)) {
                return Err(SchedulerError::AlreadyEnrolled { user, flashcard });
            }
            ledger.order.push((user, flashcard));
            ledger.records.insert((user, flashcard), rec);
        }

        Ok(ledger)
    }

    /// Copies the ledger out as [`LedgerState`].
    pub fn export_state(&self) -> LedgerState {
        let records = self
            .order
            .iter()
            .filter_map(|key| self.records.get(key).cloned())
            .collect();
        let mut experience: Vec<(UserId, u64)> =
            self.experience.iter().map(|(u, e)| (*u, *e)).collect();
        experience.sort_unstable();

        LedgerState {
            next_op_seq: self.next_op_seq,
            records,
            experience,
        }
    }

    /// Record for the pair, or [`SchedulerError::EnrollmentNotFound`].
    pub fn get(&self, user: UserId, flashcard: FlashcardId) -> SchedulerResult<&EnrollmentRecord> {
        self.records
            .get(&(user, flashcard))
            .ok_or(SchedulerError::EnrollmentNotFound { user, flashcard })
    }

    /// True once the pair has a record.
    pub fn is_enrolled(&self, user: UserId, flashcard: FlashcardId) -> bool {
        self.records.contains_key(&(user, flashcard))
    }

    /// Creates a record due at `now`; fails if the pair is already enrolled.
    pub fn create(
        &mut self,
        user: UserId,
        flashcard: FlashcardId,
        baseline: Seconds,
        now: Timestamp,
    ) -> SchedulerResult<EnrollmentRecord> {
        if self.is_enrolled(user, flashcard) {
            return Err(SchedulerError::AlreadyEnrolled { user, flashcard });
        }
        let record = EnrollmentRecord::new(user, flashcard, baseline, now);
        self.order.push(record.key());
        self.records.insert(record.key(), record.clone());

        let seq = self.take_next_op_seq();
        self.pending_ops.push(StoredOp {
            seq,
            ts: now,
            op: Op::Enroll {
                record: record.clone(),
            },
        });
        Ok(record)
    }

    /// Read-modify-write of one record plus the learner's experience total.
    ///
    /// `mutator` sees a copy of the current record; the key is restored and
    /// the version bumped afterwards so it cannot move or forge the record.
    pub fn update<F>(
        &mut self,
        user: UserId,
        flashcard: FlashcardId,
        now: Timestamp,
        recall: Recall,
        experience: u64,
        mutator: F,
    ) -> SchedulerResult<RecallOutcome>
    where
        F: FnOnce(&mut EnrollmentRecord),
    {
        let slot = self
            .records
            .get_mut(&(user, flashcard))
            .ok_or(SchedulerError::EnrollmentNotFound { user, flashcard })?;
        let expected_version = slot.version;
        let mut next = slot.clone();
        mutator(&mut next);
        next.user = user;
        next.flashcard = flashcard;
        next.version = expected_version + 1;
        *slot = next.clone();

        let total = self.experience.entry(user).or_insert(0);
        *total = total.saturating_add(experience);
        let experience_total = *total;

        let seq = self.take_next_op_seq();
        self.pending_ops.push(StoredOp {
            seq,
            ts: now,
            op: Op::Review {
                record: next.clone(),
                recall,
                expected_version,
                experience,
            },
        });

        Ok(RecallOutcome {
            record: next,
            recall,
            experience_granted: experience,
            experience_total,
        })
    }

    /// Catalog flashcards the user has not enrolled, in catalog order.
    pub fn list_learnable(&self, catalog: &Catalog, user: UserId) -> Vec<Flashcard> {
        catalog
            .flashcards()
            .iter()
            .filter(|card| !self.is_enrolled(user, card.id))
            .cloned()
            .collect()
    }

    /// Enrolled flashcards due at `now`, in catalog order.
    pub fn list_due(&self, catalog: &Catalog, user: UserId, now: Timestamp) -> Vec<Flashcard> {
        catalog
            .flashcards()
            .iter()
            .filter(|card| {
                self.records
                    .get(&(user, card.id))
                    .is_some_and(|rec| rec.is_due(now))
            })
            .cloned()
            .collect()
    }

    /// Experience accumulated by `user`.
    pub fn experience(&self, user: UserId) -> u64 {
        self.experience.get(&user).copied().unwrap_or(0)
    }

    /// Number of records across all users.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nobody has enrolled anything.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Takes the ops queued since the last drain, oldest first.
    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    /// Sequence of the most recent mutation, 0 if none.
    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn take_next_op_seq(&mut self) -> OpSeq {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_state_rejects_duplicate_pairs() {
        let rec = EnrollmentRecord::new(1, 2, 30, 0);
        let state = LedgerState {
            next_op_seq: 3,
            records: vec![rec.clone(), rec],
            experience: Vec::new(),
        };
        assert!(matches!(
            EnrollmentLedger::from_state(state),
            Err(SchedulerError::AlreadyEnrolled { user: 1, flashcard: 2 })
        ));
    }

    #[test]
    fn update_restores_key_and_bumps_version() {
        let mut ledger = EnrollmentLedger::new();
        ledger.create(1, 2, 30, 0).expect("create");
        let outcome = ledger
            .update(1, 2, 10, Recall::Correct, 10, |rec| {
                rec.flashcard = 99;
                rec.version = 42;
                rec.correct_streak = 1;
            })
            .expect("update");

        assert_eq!(outcome.record.key(), (1, 2));
        assert_eq!(outcome.record.version, 1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.experience(1), 10);

        let ops = ledger.drain_pending_ops();
        assert_eq!(ops.iter().map(|o| o.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert!(matches!(
            ops[1].op,
            Op::Review { expected_version: 0, .. }
        ));
    }
}
