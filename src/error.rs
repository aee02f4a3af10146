//! Error types for lotoo operations

use crate::card::CardType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LotooError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Byte source returned no data at offset {offset} (total size {total_size})")]
    SourceRead { offset: u64, total_size: u64 },

    #[error("Unrecognized pack format: end of central directory record not found")]
    InvalidMagic,

    #[error("Pack truncated: {what} needs bytes {offset}..{end} but source holds {total_size}")]
    Truncated {
        what: &'static str,
        offset: u64,
        end: u64,
        total_size: u64,
    },

    #[error("Unsupported compression method {method} for entry '{entry}' (only stored entries are allowed)")]
    UnsupportedCompression { entry: String, method: u16 },

    #[error("Invalid pack entry: {0}")]
    InvalidEntry(String),

    #[error("CRC-32 mismatch for quiz '{name}'")]
    ChecksumMismatch { name: String },

    #[error("Pack has {available} distinct quizzes, {card_type:?} cards need {required}")]
    InsufficientQuizzes {
        card_type: CardType,
        required: usize,
        available: usize,
    },

    #[error("Index {index} out of range (count {count})")]
    IndexOutOfRange { index: u32, count: u32 },

    #[error("Page allocation failed: {0}")]
    Allocation(String),

    #[error("Handle {0} does not refer to a live object")]
    StaleHandle(u64),

    #[error("Pack {0} still has live games")]
    PackInUse(u64),

    #[error("Pack backing this game has been released")]
    PackReleased,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LotooError {
    /// Whether the pack or game that produced this error is still usable.
    ///
    /// Capacity and range failures are per-call; everything else means the
    /// load or lookup cannot make progress.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LotooError::InsufficientQuizzes { .. } | LotooError::IndexOutOfRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LotooError>;
