//! # Lotoo - Quiz Bingo Engine
//!
//! `lotoo` loads quiz packs (stored ZIP archives whose members are named after
//! the answers and hold the questions) and plays bingo games over them:
//!
//! - **Lazy pack access** through a bounded, page-granular cache
//! - **Deterministic cards**: the same pack, card type and index always yield
//!   the same card
//! - **Reproducible games**: a seed fixes the whole reveal order
//! - **Bitmask evaluation** of lines, columns and full cards
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lotoo::{CardType, Context, Result};
//!
//! # fn main() -> Result<()> {
//! let mut ctx = Context::new();
//! let pack = ctx.load_pack_file("default.zip")?;
//!
//! // Print card 0 of the 5x5 layout
//! let card = ctx.pack(pack)?.card(CardType::USStyle5x5, 0)?;
//! for row in card.rows() {
//!     println!("{:?}", row);
//! }
//!
//! // Reveal quizzes in seeded order and watch the card
//! let game = ctx.start_game(pack, CardType::USStyle5x5, 1234)?;
//! let game = ctx.game(game)?;
//! for position in 0..game.quiz_count() {
//!     let quiz = game.quiz(position)?;
//!     let status = game.check_card_status(position, 0)?;
//!     println!("{} -> {}", quiz.name, status.label());
//! }
//!
//! ctx.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Context ──owns──> Pack ──> PageCache ──> ByteSource (memory / file / mmap)
//!    │                │          │
//!    │                │          └──> PageAllocator (pages)
//!    │                └──> Card (derived from pack id, type, index)
//!    └──owns──> Game ──weak──> Pack
//!                 └──> CardStatus (bingo evaluation)
//! ```

pub mod bingo;
pub mod buffer_pool;
pub mod card;
pub mod config;
pub mod context;
pub mod error;
pub mod game;
pub mod header;
pub mod io;
pub mod pack;
pub mod page;
pub mod writer;

pub use crate::bingo::{evaluate, CardStatus, CardTracker};
pub use crate::buffer_pool::{CacheView, PageCache, PageCacheStats};
pub use crate::card::{Card, CardLayout, CardType, Square, CARD_SLOTS};
pub use crate::config::ContextConfig;
pub use crate::context::{Context, ContextStats, GameHandle, PackHandle};
pub use crate::error::{LotooError, Result};
pub use crate::game::{Game, Seed};
pub use crate::io::{ByteSource, FileSource, MemorySource, MmapSource};
pub use crate::pack::{Pack, PackId, Quiz};
pub use crate::page::{HeapPageAllocator, Page, PageAllocator, DEFAULT_PAGE_SIZE};
pub use crate::writer::PackWriter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_end_to_end_in_memory() {
        let mut writer = PackWriter::new().with_title("Capitals");
        for i in 0..30 {
            writer
                .add_quiz(&format!("answer{:03}.txt", i), format!("question{:03}", i))
                .unwrap();
        }
        let bytes = writer.finish().unwrap();

        let mut ctx = Context::new();
        let pack = ctx.load_pack(MemorySource::new(bytes)).unwrap();
        assert_eq!(ctx.pack(pack).unwrap().title(), "Capitals");

        let game = ctx.start_game(pack, CardType::USStyle5x5, 1234).unwrap();
        let last = ctx.game(game).unwrap().quiz_count() - 1;
        let status = ctx.game(game).unwrap().check_card_status(last, 0).unwrap();
        assert_eq!(status, CardStatus::FullCard);

        ctx.close();
    }
}
