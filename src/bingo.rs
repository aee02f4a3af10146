//! Bingo status evaluation
//!
//! A card is evaluated as a bitmask of marked slots against the masks of its
//! layout. Free squares are always in the marked set and blanks never take
//! part, so they neither block nor complete a line. Diagonals are not lines.
//!
//! Precedence, highest first: `FullCard`, `OneLine`, `OneColumn`, `Nothing`.
//! Because the marked set only grows as more quizzes are revealed, the
//! status of a card never drops during a game.

use crate::card::{Card, CardLayout, Square};
use crate::error::{LotooError, Result};
use crate::game::Game;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Best win condition currently reached by a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardStatus {
    Nothing,
    OneLine,
    OneColumn,
    FullCard,
}

impl CardStatus {
    /// Rank of the status in win precedence (0 = nothing)
    pub fn severity(self) -> u8 {
        match self {
            CardStatus::Nothing => 0,
            CardStatus::OneColumn => 1,
            CardStatus::OneLine => 2,
            CardStatus::FullCard => 3,
        }
    }

    pub fn is_win(self) -> bool {
        self != CardStatus::Nothing
    }

    pub fn label(self) -> &'static str {
        match self {
            CardStatus::Nothing => "NOTHING",
            CardStatus::OneLine => "ONE LINE",
            CardStatus::OneColumn => "ONE COLUMN",
            CardStatus::FullCard => "FULL CARD",
        }
    }
}

/// Status of a layout given the mask of marked slots
pub fn evaluate(layout: &CardLayout, marked: u32) -> CardStatus {
    let covers = |mask: u32| marked & mask == mask;

    if covers(layout.playable_mask) {
        CardStatus::FullCard
    } else if layout.row_masks.iter().any(|&row| covers(row)) {
        CardStatus::OneLine
    } else if layout.column_masks.iter().any(|&column| covers(column)) {
        CardStatus::OneColumn
    } else {
        CardStatus::Nothing
    }
}

/// Incremental status tracker for one card in one game
///
/// Each call to [`advance_to`](CardTracker::advance_to) only visits the
/// positions revealed since the previous call. Moving backwards rescans from
/// the start of the draw order.
#[derive(Debug, Clone)]
pub struct CardTracker {
    card: Card,
    /// Slots carrying each name on the card
    slots_by_name: AHashMap<Arc<str>, u32>,
    marked: u32,
    /// First draw position not yet applied
    next_position: u32,
    status: CardStatus,
}

impl CardTracker {
    /// Track card `card_index` of the game's card type
    pub fn new(game: &Game, card_index: u32) -> Result<Self> {
        let card = game.card(card_index)?;

        let mut slots_by_name = AHashMap::new();
        for (slot, square) in card.squares.iter().enumerate() {
            if let Square::Named(name) = square {
                *slots_by_name.entry(Arc::clone(name)).or_insert(0) |= 1u32 << slot;
            }
        }

        let marked = card.layout().free_mask;
        let status = evaluate(card.layout(), marked);

        Ok(CardTracker {
            card,
            slots_by_name,
            marked,
            next_position: 0,
            status,
        })
    }

    /// Apply reveals up to and including `revealed_up_to`
    pub fn advance_to(&mut self, game: &Game, revealed_up_to: u32) -> Result<CardStatus> {
        if revealed_up_to >= game.quiz_count() {
            return Err(LotooError::IndexOutOfRange {
                index: revealed_up_to,
                count: game.quiz_count(),
            });
        }

        if revealed_up_to < self.next_position.saturating_sub(1) {
            self.marked = self.card.layout().free_mask;
            self.next_position = 0;
        }

        for position in self.next_position..=revealed_up_to {
            let name = game.drawn_name(position)?;
            if let Some(&slots) = self.slots_by_name.get(name) {
                self.marked |= slots;
            }
        }
        self.next_position = self.next_position.max(revealed_up_to + 1);
        self.status = evaluate(self.card.layout(), self.marked);

        Ok(self.status)
    }

    pub fn card(&self) -> &Card {
        &self.card
    }

    /// Status after the last [`advance_to`](CardTracker::advance_to)
    pub fn status(&self) -> CardStatus {
        self.status
    }

    /// Marked playable slots, free squares included
    pub fn marked_count(&self) -> u32 {
        (self.marked & self.card.layout().playable_mask).count_ones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardType;

    fn all_rows(layout: &CardLayout) -> u32 {
        layout.row_masks.iter().fold(0, |acc, row| acc | row)
    }

    #[test]
    fn test_nothing_with_only_free_center() {
        let layout = CardType::USStyle5x5.layout();
        assert_eq!(evaluate(layout, layout.free_mask), CardStatus::Nothing);
    }

    #[test]
    fn test_us_row_and_column() {
        let layout = CardType::USStyle5x5.layout();

        // Middle row: the free center completes it
        let middle_row = layout.row_masks[2] & !layout.free_mask;
        assert_eq!(
            evaluate(layout, middle_row | layout.free_mask),
            CardStatus::OneLine
        );

        let first_column = layout.column_masks[0];
        assert_eq!(evaluate(layout, first_column), CardStatus::OneColumn);

        // Row beats column when both hold
        assert_eq!(
            evaluate(layout, first_column | layout.row_masks[4]),
            CardStatus::OneLine
        );
    }

    #[test]
    fn test_diagonal_is_not_a_line() {
        let layout = CardType::USStyle5x5.layout();
        let diagonal = (0..5).fold(0u32, |acc, i| acc | 1 << (i * 5 + i));
        assert_eq!(evaluate(layout, diagonal), CardStatus::Nothing);
    }

    #[test]
    fn test_full_card() {
        for card_type in CardType::ALL {
            let layout = card_type.layout();
            assert_eq!(evaluate(layout, layout.playable_mask), CardStatus::FullCard);
            assert_eq!(evaluate(layout, u32::MAX), CardStatus::FullCard);
        }
    }

    #[test]
    fn test_one_line_card_is_full_or_nothing() {
        let layout = CardType::OneLine1x5.layout();
        assert_eq!(evaluate(layout, 0b01111), CardStatus::Nothing);
        assert_eq!(evaluate(layout, 0b00001), CardStatus::Nothing);
        assert_eq!(evaluate(layout, 0b11111), CardStatus::FullCard);
    }

    #[test]
    fn test_eu_blanks_do_not_block_lines() {
        let layout = CardType::EUStyle3x9.layout();
        assert_eq!(evaluate(layout, layout.row_masks[1]), CardStatus::OneLine);

        // Marking blanks alone never wins anything
        let blanks = ((1u32 << 27) - 1) & !layout.playable_mask;
        assert_eq!(evaluate(layout, blanks), CardStatus::Nothing);

        // Two complete rows are still one line; all three is the full card
        assert_eq!(
            evaluate(layout, layout.row_masks[0] | layout.row_masks[2]),
            CardStatus::OneLine
        );
        assert_eq!(evaluate(layout, all_rows(layout)), CardStatus::FullCard);
    }

    #[test]
    fn test_eu_columns_count_numbered_cells_only() {
        let layout = CardType::EUStyle3x9.layout();

        // Column 0 is numbered in the top and bottom rows
        assert_eq!(evaluate(layout, 1 << 0), CardStatus::Nothing);
        assert_eq!(evaluate(layout, (1 << 0) | (1 << 18)), CardStatus::OneColumn);

        // Column 2 holds a single number
        assert_eq!(evaluate(layout, 1 << 2), CardStatus::OneColumn);

        // A blank cell never completes a column
        assert_eq!(evaluate(layout, 1 << 9), CardStatus::Nothing);

        assert_eq!(
            evaluate(layout, (1 << 2) | layout.row_masks[1]),
            CardStatus::OneLine
        );
    }

    #[test]
    fn test_severity_order() {
        assert!(CardStatus::FullCard.severity() > CardStatus::OneLine.severity());
        assert!(CardStatus::OneLine.severity() > CardStatus::OneColumn.severity());
        assert!(CardStatus::OneColumn.severity() > CardStatus::Nothing.severity());
        assert!(!CardStatus::Nothing.is_win());
        assert_eq!(CardStatus::FullCard.label(), "FULL CARD");
    }
}
