//! Multiple-choice quiz sampling by difficulty tier.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    catalog::{Catalog, QuizItem},
    error::{SchedulerError, SchedulerResult},
    types::DifficultyTier,
};

/// Number of answer options shown per question.
pub const OPTION_COUNT: usize = 4;
/// Wrong answers mixed in with the correct one.
pub const DISTRACTOR_COUNT: usize = OPTION_COUNT - 1;

/// One sampled question with its shuffled options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Item whose script is asked about.
    pub question: QuizItem,
    /// Glosses in display order.
    pub options: [String; OPTION_COUNT],
    /// Position of `question.gloss` in `options`.
    pub answer_index: usize,
}

impl QuizQuestion {
    /// True when `choice` is the slot holding the right gloss.
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.answer_index
    }
}

/// Draws questions from the catalog with an injected random source.
#[derive(Debug)]
pub struct QuizSampler<R> {
    catalog: Arc<Catalog>,
    rng: R,
}

impl<R: Rng> QuizSampler<R> {
    /// Sampler over `catalog` drawing from `rng`.
    pub fn new(catalog: Arc<Catalog>, rng: R) -> Self {
        Self { catalog, rng }
    }

    /// Samples a question, three distinct distractors and an answer slot.
    pub fn next_question(&mut self, tier: DifficultyTier) -> SchedulerResult<QuizQuestion> {
        let question = self
            .catalog
            .sample_quiz_items(tier, None, 1, &mut self.rng)
            .pop()
            .ok_or(SchedulerError::NoContent(tier))?;

        let distractors =
            self.catalog
                .sample_quiz_items(tier, Some(question.id), DISTRACTOR_COUNT, &mut self.rng);
        if distractors.len() < DISTRACTOR_COUNT {
            return Err(SchedulerError::InsufficientContent {
                tier,
                available: distractors.len(),
                required: DISTRACTOR_COUNT,
            });
        }

        let answer_index = self.rng.random_range(0..OPTION_COUNT);
        let options = build_options(&question.gloss, &distractors, answer_index);
        debug!(%tier, question = question.id, answer_index, "quiz question sampled");

        Ok(QuizQuestion {
            question,
            options,
            answer_index,
        })
    }
}

/// Places `answer` at `answer_index` and the distractors, in order, around it.
fn build_options(
    answer: &str,
    distractors: &[QuizItem],
    answer_index: usize,
) -> [String; OPTION_COUNT] {
    let mut rest = distractors.iter().map(|d| d.gloss.clone());
    std::array::from_fn(|slot| {
        if slot == answer_index {
            answer.to_string()
        } else {
            rest.next().unwrap_or_default()
        }
    })
}
