//! Game sessions: seeded draw orders over a pack
//!
//! A game fixes, at start, the order in which every quiz of its pack is
//! revealed. The order is a ChaCha20 shuffle of all quiz indices seeded by
//! the caller's seed, so the same `(pack, card type, seed)` always replays
//! the same session.

use crate::bingo::{self, CardStatus};
use crate::card::{Card, CardType};
use crate::error::{LotooError, Result};
use crate::pack::{Pack, PackId, Quiz};
use ahash::AHashMap;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Seed of a game's draw order
pub type Seed = u32;

/// A play session over one pack
///
/// The game holds a weak reference to its pack; the pack must outlive it.
#[derive(Debug)]
pub struct Game {
    pack: Weak<Pack>,
    pack_id: PackId,
    card_type: CardType,
    seed: Seed,
    /// Pack quiz index revealed at each position
    draw_order: Vec<u32>,
    /// Quiz name revealed at each position
    drawn_names: Vec<Arc<str>>,
    /// Earliest position at which each name is revealed
    reveal_rank: AHashMap<Arc<str>, u32>,
}

impl Game {
    /// Start a game over `pack`
    pub fn start(pack: &Arc<Pack>, card_type: CardType, seed: Seed) -> Self {
        let mut draw_order: Vec<u32> = (0..pack.quiz_count()).collect();
        let mut rng = ChaCha20Rng::seed_from_u64(seed as u64);
        draw_order.shuffle(&mut rng);

        let names: Vec<&Arc<str>> = pack.names().collect();
        let drawn_names: Vec<Arc<str>> = draw_order
            .iter()
            .map(|&index| Arc::clone(names[index as usize]))
            .collect();

        let mut reveal_rank = AHashMap::with_capacity(drawn_names.len());
        for (position, name) in drawn_names.iter().enumerate() {
            reveal_rank
                .entry(Arc::clone(name))
                .or_insert(position as u32);
        }

        debug!(
            "Started {:?} game over pack {:016x} with seed {} ({} quizzes)",
            card_type,
            pack.id(),
            seed,
            draw_order.len()
        );

        Game {
            pack: Arc::downgrade(pack),
            pack_id: pack.id(),
            card_type,
            seed,
            draw_order,
            drawn_names,
            reveal_rank,
        }
    }

    pub fn card_type(&self) -> CardType {
        self.card_type
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    pub fn pack_id(&self) -> PackId {
        self.pack_id
    }

    /// Number of quizzes in the draw order
    pub fn quiz_count(&self) -> u32 {
        self.draw_order.len() as u32
    }

    /// Pack quiz indices in reveal order
    pub fn draw_order(&self) -> &[u32] {
        &self.draw_order
    }

    /// Pack quiz index revealed at `position`
    pub fn draw_index(&self, position: u32) -> Result<u32> {
        self.draw_order
            .get(position as usize)
            .copied()
            .ok_or(LotooError::IndexOutOfRange {
                index: position,
                count: self.quiz_count(),
            })
    }

    /// Name revealed at `position`
    pub fn drawn_name(&self, position: u32) -> Result<&Arc<str>> {
        self.drawn_names
            .get(position as usize)
            .ok_or(LotooError::IndexOutOfRange {
                index: position,
                count: self.quiz_count(),
            })
    }

    /// Quiz revealed at `position`
    pub fn quiz(&self, position: u32) -> Result<Quiz> {
        let index = self.draw_index(position)?;
        self.pack()?.quiz(index)
    }

    /// Earliest position at which a square named `name` becomes marked
    pub fn reveal_position(&self, name: &str) -> Option<u32> {
        self.reveal_rank.get(name).copied()
    }

    /// Card `card_index` of this game's card type
    pub fn card(&self, card_index: u32) -> Result<Card> {
        self.pack()?.card(self.card_type, card_index)
    }

    /// Win status of card `card_index` once positions `0..=revealed_up_to`
    /// have been revealed
    pub fn check_card_status(&self, revealed_up_to: u32, card_index: u32) -> Result<CardStatus> {
        if revealed_up_to >= self.quiz_count() {
            return Err(LotooError::IndexOutOfRange {
                index: revealed_up_to,
                count: self.quiz_count(),
            });
        }

        let card = self.card(card_index)?;
        let marked = card.marked_mask(|name| {
            self.reveal_position(name)
                .is_some_and(|position| position <= revealed_up_to)
        });

        Ok(bingo::evaluate(card.layout(), marked))
    }

    pub(crate) fn pack(&self) -> Result<Arc<Pack>> {
        self.pack.upgrade().ok_or(LotooError::PackReleased)
    }
}
