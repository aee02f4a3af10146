//! Bingo cards and their deterministic generation
//!
//! Every card has 27 slots. The card type decides which slots are played and
//! how they are grouped into rows and columns:
//!
//! ```text
//! OneLine1x5       USStyle5x5        EUStyle3x9
//! N N N N N        N N N N N         N . N . N . N . N
//!                  N N N N N         . N . N . N . N N
//!                  N N F N N         N N . . N N . N .
//!                  N N N N N
//!                  N N N N N
//! N = named square, F = free square, . = blank
//! ```
//!
//! A card is a pure function of the pack id, the card type and the card
//! index: the generator is seeded from those three values alone, so card 42
//! of a pack is the same card for every game and every player.

use crate::error::{LotooError, Result};
use crate::pack::PackId;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

/// Number of slots on every card
pub const CARD_SLOTS: usize = 27;

/// Supported card geometries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    /// 5×5 grid with a free center square
    USStyle5x5,
    /// 3×9 grid, five numbered cells and four blanks per row
    EUStyle3x9,
    /// A single row of five squares
    OneLine1x5,
}

impl CardType {
    pub const ALL: [CardType; 3] = [
        CardType::USStyle5x5,
        CardType::EUStyle3x9,
        CardType::OneLine1x5,
    ];

    /// Stable tag mixed into card seeds
    pub fn tag(self) -> u8 {
        match self {
            CardType::USStyle5x5 => 0,
            CardType::EUStyle3x9 => 1,
            CardType::OneLine1x5 => 2,
        }
    }

    /// Slot layout of this geometry
    pub fn layout(self) -> &'static CardLayout {
        match self {
            CardType::USStyle5x5 => &US_STYLE_LAYOUT,
            CardType::EUStyle3x9 => &EU_STYLE_LAYOUT,
            CardType::OneLine1x5 => &ONE_LINE_LAYOUT,
        }
    }
}

/// Slot layout of a card geometry
///
/// Slots are numbered row-major. Masks have bit `i` set for slot `i`.
#[derive(Debug)]
pub struct CardLayout {
    /// Slots used by the geometry (the rest of the 27 are blank)
    pub slots: usize,
    pub rows: usize,
    pub columns: usize,
    /// Slots that take part in evaluation (named and free)
    pub playable_mask: u32,
    /// Slots that are always marked
    pub free_mask: u32,
    /// Playable slots of each winning row
    pub row_masks: &'static [u32],
    /// Playable slots of each winning column
    pub column_masks: &'static [u32],
}

impl CardLayout {
    /// Number of slots that receive a quiz name
    pub fn named_slots(&self) -> usize {
        (self.playable_mask & !self.free_mask).count_ones() as usize
    }

    /// Slot indices that receive a quiz name, in row-major order
    pub fn named_slot_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let named = self.playable_mask & !self.free_mask;
        (0..self.slots).filter(move |&slot| named & (1 << slot) != 0)
    }
}

const fn row_mask(row: usize, columns: usize) -> u32 {
    ((1u32 << columns) - 1) << (row * columns)
}

const fn column_mask(column: usize, rows: usize, columns: usize) -> u32 {
    let mut mask = 0;
    let mut row = 0;
    while row < rows {
        mask |= 1 << (row * columns + column);
        row += 1;
    }
    mask
}

const fn pattern_mask(pattern: &[[u8; 9]; 3]) -> u32 {
    let mut mask = 0;
    let mut row = 0;
    while row < 3 {
        let mut column = 0;
        while column < 9 {
            if pattern[row][column] != 0 {
                mask |= 1 << (row * 9 + column);
            }
            column += 1;
        }
        row += 1;
    }
    mask
}

static ONE_LINE_ROWS: [u32; 1] = [row_mask(0, 5)];

static ONE_LINE_LAYOUT: CardLayout = CardLayout {
    slots: 5,
    rows: 1,
    columns: 5,
    playable_mask: row_mask(0, 5),
    free_mask: 0,
    row_masks: &ONE_LINE_ROWS,
    // One row only: the card has no column partition
    column_masks: &[],
};

const US_CENTER: u32 = 1 << 12;

static US_STYLE_ROWS: [u32; 5] = [
    row_mask(0, 5),
    row_mask(1, 5),
    row_mask(2, 5),
    row_mask(3, 5),
    row_mask(4, 5),
];

static US_STYLE_COLUMNS: [u32; 5] = [
    column_mask(0, 5, 5),
    column_mask(1, 5, 5),
    column_mask(2, 5, 5),
    column_mask(3, 5, 5),
    column_mask(4, 5, 5),
];

static US_STYLE_LAYOUT: CardLayout = CardLayout {
    slots: 25,
    rows: 5,
    columns: 5,
    playable_mask: (1 << 25) - 1,
    free_mask: US_CENTER,
    row_masks: &US_STYLE_ROWS,
    column_masks: &US_STYLE_COLUMNS,
};

/// Numbered cells of the European ticket; every column holds at least one
const EU_PATTERN: [[u8; 9]; 3] = [
    [1, 0, 1, 0, 1, 0, 1, 0, 1],
    [0, 1, 0, 1, 0, 1, 0, 1, 1],
    [1, 1, 0, 0, 1, 1, 0, 1, 0],
];

const EU_PLAYABLE: u32 = pattern_mask(&EU_PATTERN);

static EU_STYLE_ROWS: [u32; 3] = [
    row_mask(0, 9) & EU_PLAYABLE,
    row_mask(1, 9) & EU_PLAYABLE,
    row_mask(2, 9) & EU_PLAYABLE,
];

/// Columns keep only their numbered cells, so a column of one cell is
/// complete as soon as that cell is marked
static EU_STYLE_COLUMNS: [u32; 9] = [
    column_mask(0, 3, 9) & EU_PLAYABLE,
    column_mask(1, 3, 9) & EU_PLAYABLE,
    column_mask(2, 3, 9) & EU_PLAYABLE,
    column_mask(3, 3, 9) & EU_PLAYABLE,
    column_mask(4, 3, 9) & EU_PLAYABLE,
    column_mask(5, 3, 9) & EU_PLAYABLE,
    column_mask(6, 3, 9) & EU_PLAYABLE,
    column_mask(7, 3, 9) & EU_PLAYABLE,
    column_mask(8, 3, 9) & EU_PLAYABLE,
];

static EU_STYLE_LAYOUT: CardLayout = CardLayout {
    slots: 27,
    rows: 3,
    columns: 9,
    playable_mask: EU_PLAYABLE,
    free_mask: 0,
    row_masks: &EU_STYLE_ROWS,
    column_masks: &EU_STYLE_COLUMNS,
};

/// One card slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Square {
    /// Square showing a quiz answer
    Named(Arc<str>),
    /// Always marked
    Free,
    /// Not played
    Blank,
}

impl Square {
    pub fn name(&self) -> Option<&str> {
        match self {
            Square::Named(name) => Some(name),
            _ => None,
        }
    }
}

/// A generated bingo card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub card_type: CardType,
    pub index: u32,
    pub squares: [Square; CARD_SLOTS],
}

impl Card {
    /// Derive card `index` of the given type
    ///
    /// `names` is the pack's list of distinct quiz names in pack order; the
    /// card draws its named squares from it without replacement.
    pub fn generate(
        pack_id: PackId,
        names: &[Arc<str>],
        card_type: CardType,
        index: u32,
    ) -> Result<Self> {
        let layout = card_type.layout();
        let required = layout.named_slots();
        if names.len() < required {
            return Err(LotooError::InsufficientQuizzes {
                card_type,
                required,
                available: names.len(),
            });
        }

        let mut rng = ChaCha20Rng::seed_from_u64(card_seed(pack_id, card_type, index));
        let mut pool: Vec<usize> = (0..names.len()).collect();
        let (picked, _) = pool.partial_shuffle(&mut rng, required);

        let mut squares: [Square; CARD_SLOTS] = std::array::from_fn(|_| Square::Blank);
        for slot in 0..layout.slots {
            if layout.free_mask & (1 << slot) != 0 {
                squares[slot] = Square::Free;
            }
        }
        for (slot, &name_index) in layout.named_slot_indices().zip(picked.iter()) {
            squares[slot] = Square::Named(Arc::clone(&names[name_index]));
        }

        Ok(Card {
            card_type,
            index,
            squares,
        })
    }

    pub fn layout(&self) -> &'static CardLayout {
        self.card_type.layout()
    }

    /// Squares of the geometry, one slice per row
    pub fn rows(&self) -> impl Iterator<Item = &[Square]> {
        let layout = self.layout();
        self.squares[..layout.slots].chunks(layout.columns)
    }

    /// Names on the card in slot order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.squares.iter().filter_map(Square::name)
    }

    /// Mask of marked slots given a predicate on names
    ///
    /// Free squares are always marked; blanks never are.
    pub fn marked_mask<F>(&self, mut is_marked: F) -> u32
    where
        F: FnMut(&str) -> bool,
    {
        let mut mask = 0;
        for (slot, square) in self.squares.iter().enumerate() {
            let marked = match square {
                Square::Free => true,
                Square::Named(name) => is_marked(name),
                Square::Blank => false,
            };
            if marked {
                mask |= 1 << slot;
            }
        }
        mask
    }
}

/// Seed for card `index`: xxh3 of pack id, type tag and index (little-endian)
pub fn card_seed(pack_id: PackId, card_type: CardType, index: u32) -> u64 {
    let mut bytes = [0u8; 13];
    bytes[..8].copy_from_slice(&pack_id.to_le_bytes());
    bytes[8] = card_type.tag();
    bytes[9..].copy_from_slice(&index.to_le_bytes());
    xxh3_64(&bytes)
}
