use std::sync::Arc;

use proptest::prelude::*;
use rand::{SeedableRng, rngs::StdRng};

use alefbet::{
    catalog::{Catalog, Flashcard, QuizItem},
    config::SchedulePolicy,
    core::{
        ledger::EnrollmentLedger,
        scheduler::{Scheduler, transition},
    },
    enrollment::{EnrollmentRecord, Recall},
    error::SchedulerError,
    quiz::QuizSampler,
    types::DifficultyTier,
};

const CARDS: u64 = 12;
const USERS: u64 = 3;

#[derive(Debug, Clone)]
enum Action {
    Enroll { user: u64, card: u64 },
    Correct { user: u64, card: u64 },
    Incorrect { user: u64, card: u64 },
    Wait { secs: u16 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0..USERS, 0..CARDS + 2).prop_map(|(user, card)| Action::Enroll { user, card }),
        (0..USERS, 0..CARDS).prop_map(|(user, card)| Action::Correct { user, card }),
        (0..USERS, 0..CARDS).prop_map(|(user, card)| Action::Incorrect { user, card }),
        (0u16..600).prop_map(|secs| Action::Wait { secs }),
    ]
}

fn catalog() -> Arc<Catalog> {
    let mut catalog = Catalog::new();
    for id in 0..CARDS {
        catalog
            .insert_flashcard(Flashcard {
                id,
                front: format!("front-{id}"),
                back: format!("back-{id}"),
            })
            .expect("card");
    }
    Arc::new(catalog)
}

proptest! {
    #[test]
    fn repeated_correct_recalls_push_due_dates_strictly_later(
        baseline in 1u64..10_000,
        steps in prop::collection::vec(0u64..100_000, 1..12),
    ) {
        let policy = SchedulePolicy { baseline_interval: baseline, ..SchedulePolicy::default() };
        let mut rec = EnrollmentRecord::new(1, 1, baseline, 0);
        let mut now = 0u64;
        let mut last_due = rec.next_review_at;
        for step in steps {
            now += step;
            let prev_interval = rec.previous_interval;
            transition(&mut rec, Recall::Correct, &policy, now);
            prop_assert!(rec.previous_interval > prev_interval);
            prop_assert!(rec.next_review_at > last_due);
            prop_assert!(rec.next_review_at > now);
            last_due = rec.next_review_at;
        }
    }

    #[test]
    fn a_miss_always_resets_to_the_penalty(
        streak in 0u32..1_000,
        interval in 1u64..u64::MAX / 4,
        now in 0u64..u64::MAX / 4,
    ) {
        let policy = SchedulePolicy::default();
        let mut rec = EnrollmentRecord {
            user: 1,
            flashcard: 1,
            correct_streak: streak,
            previous_interval: interval,
            next_review_at: now,
            version: 0,
        };
        transition(&mut rec, Recall::Incorrect, &policy, now);
        prop_assert_eq!(rec.correct_streak, 0);
        prop_assert_eq!(rec.previous_interval, 60);
        prop_assert_eq!(rec.next_review_at, now + 60);
    }

    #[test]
    fn every_card_sits_in_exactly_one_partition(actions in prop::collection::vec(action_strategy(), 1..150)) {
        let catalog = catalog();
        let mut s = Scheduler::new(EnrollmentLedger::new(), Arc::clone(&catalog), SchedulePolicy::default())
            .expect("scheduler");
        let mut now = 1_000u64;

        for action in actions {
            match action {
                Action::Enroll { user, card } => {
                    let before = s.record(user, card).ok();
                    match s.enroll(user, card, now) {
                        Ok(_) => prop_assert!(before.is_none()),
                        Err(SchedulerError::AlreadyEnrolled { .. }) => {
                            prop_assert_eq!(s.record(user, card).ok(), before);
                        }
                        Err(SchedulerError::UnknownFlashcard(id)) => prop_assert!(id >= CARDS),
                        Err(other) => prop_assert!(false, "unexpected enroll error: {other:?}"),
                    }
                }
                Action::Correct { user, card } => {
                    let _ = s.mark_correct(user, card, now);
                }
                Action::Incorrect { user, card } => {
                    let _ = s.mark_incorrect(user, card, now);
                }
                Action::Wait { secs } => now += u64::from(secs),
            }

            for user in 0..USERS {
                let learnable = s.learnable(user);
                let due = s.due_for_review(user, now);
                for c in catalog.flashcards() {
                    let in_learnable = learnable.iter().any(|l| l.id == c.id);
                    let in_due = due.iter().any(|d| d.id == c.id);
                    let in_waiting = s.record(user, c.id).is_ok_and(|r| r.next_review_at > now);
                    let memberships = [in_learnable, in_due, in_waiting].iter().filter(|m| **m).count();
                    prop_assert_eq!(memberships, 1);
                }
            }
        }
    }

    #[test]
    fn quiz_options_are_distinct_and_indexed(seed in any::<u64>(), extra in 0usize..8) {
        let mut catalog = Catalog::new();
        for id in 0..(4 + extra as u64) {
            catalog
                .insert_quiz_item(QuizItem {
                    id,
                    tier: DifficultyTier::Beginner,
                    script: format!("script-{id}"),
                    gloss: format!("gloss-{id}"),
                })
                .expect("item");
        }
        let mut sampler = QuizSampler::new(Arc::new(catalog), StdRng::seed_from_u64(seed));

        for _ in 0..8 {
            let q = sampler.next_question(DifficultyTier::Beginner).expect("question");
            prop_assert!(q.answer_index < 4);
            prop_assert_eq!(&q.options[q.answer_index], &q.question.gloss);
            let mut sorted = q.options.to_vec();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), 4);
        }
    }
}
