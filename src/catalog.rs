//! Read-mostly catalog of flashcards and quiz items.

use hashbrown::{HashMap, HashSet};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    error::{SchedulerError, SchedulerResult},
    types::{DifficultyTier, FlashcardId, QuizItemId},
};

/// Immutable deck entry: a target-script glyph or word and its gloss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    /// Unique catalog id.
    pub id: FlashcardId,
    /// Hebrew-script glyph or word.
    pub front: String,
    /// Phonetic gloss.
    pub back: String,
}

/// Quiz entry, partitioned by tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    /// Unique catalog id.
    pub id: QuizItemId,
    /// Tier this item is drawn at.
    pub tier: DifficultyTier,
    /// Hebrew-script text shown as the question.
    pub script: String,
    /// Phonetic or English answer text.
    pub gloss: String,
}

/// Rejected catalog mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// A flashcard with this id already exists.
    #[error("duplicate flashcard id {0}")]
    DuplicateFlashcard(FlashcardId),
    /// A quiz item with this id already exists.
    #[error("duplicate quiz item id {0}")]
    DuplicateQuizItem(QuizItemId),
    /// Another item at the same tier already answers with this gloss.
    #[error("gloss {gloss:?} already used at tier {tier}")]
    DuplicateGloss {
        /// Tier of the rejected item.
        tier: DifficultyTier,
        /// Offending gloss.
        gloss: String,
    },
}

/// In-memory catalog keeping insertion order for deterministic listings.
///
/// Glosses are unique per tier so that any sampled set of distinct quiz
/// items also has distinct answer options.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    flashcards: Vec<Flashcard>,
    flashcard_pos: HashMap<FlashcardId, usize>,
    quiz_items: Vec<QuizItem>,
    quiz_pos: HashMap<QuizItemId, usize>,
    by_tier: HashMap<DifficultyTier, Vec<QuizItemId>>,
    glosses: HashSet<(DifficultyTier, String)>,
}

impl Catalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from flashcards and quiz items in the given order.
    pub fn from_parts(
        flashcards: impl IntoIterator<Item = Flashcard>,
        quiz_items: impl IntoIterator<Item = QuizItem>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for card in flashcards {
            catalog.insert_flashcard(card)?;
        }
        for item in quiz_items {
            catalog.insert_quiz_item(item)?;
        }
        Ok(catalog)
    }

    /// Appends a flashcard; ids must be unique.
    pub fn insert_flashcard(&mut self, card: Flashcard) -> Result<(), CatalogError> {
        if self.flashcard_pos.contains_key(&card.id) {
            return Err(CatalogError::DuplicateFlashcard(card.id));
        }
        self.flashcard_pos.insert(card.id, self.flashcards.len());
        self.flashcards.push(card);
        Ok(())
    }

    /// Appends a quiz item; ids must be unique and glosses unique per tier.
    pub fn insert_quiz_item(&mut self, item: QuizItem) -> Result<(), CatalogError> {
        if self.quiz_pos.contains_key(&item.id) {
            return Err(CatalogError::DuplicateQuizItem(item.id));
        }
        if !self.glosses.insert((item.tier, item.gloss.clone())) {
            return Err(CatalogError::DuplicateGloss {
                tier: item.tier,
                gloss: item.gloss,
            });
        }
        self.by_tier.entry(item.tier).or_default().push(item.id);
        self.quiz_pos.insert(item.id, self.quiz_items.len());
        self.quiz_items.push(item);
        Ok(())
    }

    /// Looks up a flashcard by id.
    pub fn get_flashcard(&self, id: FlashcardId) -> Option<&Flashcard> {
        self.flashcard_pos.get(&id).map(|pos| &self.flashcards[*pos])
    }

    /// Like [`Catalog::get_flashcard`] but fails with
    /// [`SchedulerError::UnknownFlashcard`].
    pub fn flashcard(&self, id: FlashcardId) -> SchedulerResult<&Flashcard> {
        self.get_flashcard(id)
            .ok_or(SchedulerError::UnknownFlashcard(id))
    }

    /// All flashcards in insertion order.
    pub fn flashcards(&self) -> &[Flashcard] {
        &self.flashcards
    }

    /// All quiz items in insertion order.
    pub fn quiz_items(&self) -> &[QuizItem] {
        &self.quiz_items
    }

    /// Looks up a quiz item by id.
    pub fn get_quiz_item(&self, id: QuizItemId) -> Option<&QuizItem> {
        self.quiz_pos.get(&id).map(|pos| &self.quiz_items[*pos])
    }

    /// Number of quiz items at `tier`.
    pub fn tier_len(&self, tier: DifficultyTier) -> usize {
        self.by_tier.get(&tier).map_or(0, Vec::len)
    }

    /// Uniformly samples up to `count` distinct items at `tier`, without
    /// replacement, skipping `exclude`.
    ///
    /// Returns fewer than `count` items when the tier is too small; the
    /// returned order is itself uniformly random.
    pub fn sample_quiz_items<R: Rng + ?Sized>(
        &self,
        tier: DifficultyTier,
        exclude: Option<QuizItemId>,
        count: usize,
        rng: &mut R,
    ) -> Vec<QuizItem> {
        let candidates: Vec<QuizItemId> = self
            .by_tier
            .get(&tier)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
            .filter(|id| Some(*id) != exclude)
            .collect();

        let amount = count.min(candidates.len());
        rand::seq::index::sample(rng, candidates.len(), amount)
            .into_iter()
            .filter_map(|idx| self.get_quiz_item(candidates[idx]).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn item(id: QuizItemId, tier: DifficultyTier, gloss: &str) -> QuizItem {
        QuizItem {
            id,
            tier,
            script: format!("script-{id}"),
            gloss: gloss.to_string(),
        }
    }

    #[test]
    fn duplicate_gloss_in_same_tier_is_rejected() {
        let mut catalog = Catalog::new();
        catalog
            .insert_quiz_item(item(1, DifficultyTier::Beginner, "alef"))
            .expect("first");
        catalog
            .insert_quiz_item(item(2, DifficultyTier::Advanced, "alef"))
            .expect("other tier");
        let err = catalog
            .insert_quiz_item(item(3, DifficultyTier::Beginner, "alef"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateGloss { .. }));
        assert_eq!(catalog.tier_len(DifficultyTier::Beginner), 1);
    }

    #[test]
    fn sampling_excludes_and_clamps() {
        let catalog = Catalog::from_parts(
            Vec::<Flashcard>::new(),
            [
                item(1, DifficultyTier::Beginner, "alef"),
                item(2, DifficultyTier::Beginner, "bet"),
                item(3, DifficultyTier::Beginner, "gimel"),
                item(4, DifficultyTier::Advanced, "shalom"),
            ],
        )
        .expect("catalog");
        let mut rng = StdRng::seed_from_u64(7);

        let picked = catalog.sample_quiz_items(DifficultyTier::Beginner, Some(2), 5, &mut rng);
        let mut ids: Vec<_> = picked.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }
}
