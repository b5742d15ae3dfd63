use std::sync::Arc;

use alefbet::{
    catalog::{Catalog, Flashcard},
    config::SchedulePolicy,
    core::{ledger::EnrollmentLedger, scheduler::Scheduler},
    error::SchedulerError,
};

const U1: u64 = 1;
const F1: u64 = 10;
const T0: u64 = 1_700_000_000;

fn card(id: u64, front: &str, back: &str) -> Flashcard {
    Flashcard {
        id,
        front: front.to_string(),
        back: back.to_string(),
    }
}

fn scheduler() -> Scheduler {
    let mut catalog = Catalog::new();
    for c in [card(F1, "א", "alef"), card(11, "ב", "bet"), card(12, "ג", "gimel")] {
        catalog.insert_flashcard(c).expect("card");
    }
    Scheduler::new(EnrollmentLedger::new(), Arc::new(catalog), SchedulePolicy::default())
        .expect("scheduler")
}

fn ids(cards: &[Flashcard]) -> Vec<u64> {
    cards.iter().map(|c| c.id).collect()
}

#[test]
fn enroll_review_and_penalty_walkthrough() {
    let mut s = scheduler();

    let rec = s.enroll(U1, F1, T0).expect("enroll");
    assert_eq!(rec.next_review_at, T0);
    assert_eq!(rec.previous_interval, 30);
    assert_eq!(rec.correct_streak, 0);
    assert_eq!(ids(&s.due_for_review(U1, T0)), vec![F1]);

    let outcome = s.mark_correct(U1, F1, T0).expect("correct");
    assert_eq!(outcome.record.previous_interval, 75);
    assert_eq!(outcome.record.next_review_at, T0 + 75);
    assert_eq!(outcome.record.correct_streak, 1);
    assert!(s.due_for_review(U1, T0 + 10).is_empty());

    let outcome = s.mark_incorrect(U1, F1, T0 + 75).expect("incorrect");
    assert_eq!(outcome.record.correct_streak, 0);
    assert_eq!(outcome.record.previous_interval, 60);
    assert_eq!(outcome.record.next_review_at, T0 + 135);
    assert_eq!(ids(&s.due_for_review(U1, T0 + 135)), vec![F1]);
}

#[test]
fn learnable_excludes_enrolled_and_keeps_catalog_order() {
    let mut s = scheduler();
    assert_eq!(ids(&s.learnable(U1)), vec![10, 11, 12]);

    s.enroll(U1, 11, T0).expect("enroll");
    assert_eq!(ids(&s.learnable(U1)), vec![10, 12]);
    assert_eq!(ids(&s.learnable(U1)), vec![10, 12]);
    // Other users are unaffected.
    assert_eq!(ids(&s.learnable(2)), vec![10, 11, 12]);
}

#[test]
fn second_enroll_fails_without_touching_record() {
    let mut s = scheduler();
    s.enroll(U1, F1, T0).expect("enroll");
    s.mark_correct(U1, F1, T0).expect("correct");
    let before = s.record(U1, F1).expect("record");

    let err = s.enroll(U1, F1, T0 + 500).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::AlreadyEnrolled { user: U1, flashcard: F1 }
    ));
    assert_eq!(s.record(U1, F1).expect("record"), before);
}

#[test]
fn unknown_and_unenrolled_cards_are_rejected() {
    let mut s = scheduler();
    assert!(matches!(
        s.enroll(U1, 999, T0),
        Err(SchedulerError::UnknownFlashcard(999))
    ));
    assert!(matches!(
        s.mark_correct(U1, F1, T0),
        Err(SchedulerError::EnrollmentNotFound { .. })
    ));
    assert!(matches!(
        s.mark_incorrect(U1, F1, T0),
        Err(SchedulerError::EnrollmentNotFound { .. })
    ));
    assert!(s.ledger().is_empty());
    assert!(s.drain_pending_ops().is_empty());
}

#[test]
fn correct_recalls_grant_experience_in_the_same_step() {
    let mut s = scheduler();
    s.enroll(U1, F1, T0).expect("enroll");
    s.enroll(U1, 11, T0).expect("enroll");

    let first = s.mark_correct(U1, F1, T0).expect("correct");
    assert_eq!(first.experience_granted, 10);
    assert_eq!(first.experience_total, 10);

    let miss = s.mark_incorrect(U1, 11, T0).expect("incorrect");
    assert_eq!(miss.experience_granted, 0);
    assert_eq!(miss.experience_total, 10);

    for (i, now) in [T0 + 100, T0 + 400, T0 + 900, T0 + 2_000].into_iter().enumerate() {
        let out = s.mark_correct(U1, F1, now).expect("correct");
        assert_eq!(out.experience_total, 20 + 10 * i as u64);
    }

    let progress = s.progress(U1);
    assert_eq!(progress.experience, 50);
    assert_eq!(progress.level, 2);
    assert_eq!(s.progress(2).level, 1);
}

#[test]
fn journal_records_every_successful_mutation_in_order() {
    let mut s = scheduler();
    s.enroll(U1, F1, T0).expect("enroll");
    s.mark_correct(U1, F1, T0).expect("correct");
    let _ = s.enroll(U1, F1, T0);

    let ops = s.drain_pending_ops();
    let seqs: Vec<u64> = ops.iter().map(|o| o.seq).collect();
    assert_eq!(seqs, vec![1, 2]);
    assert_eq!(s.ledger().latest_op_seq(), 2);
}
