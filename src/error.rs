//! Error types for the record store.
//!
//! Input problems (`NegativeId`, `StringTooLong`, `ContainsNul`) and business-rule
//! violations (`DuplicateKey`, `TableFull`) reject a single statement. `NodeFull` stays
//! inside the table. Everything else means the file or the pager is in a state the
//! session cannot recover from.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Row id is zero or negative.
    #[error("id must be positive, got {id}")]
    NegativeId { id: i64 },

    /// Text payload does not fit its column slot.
    #[error("{column} is {len} bytes long, max is {max}")]
    StringTooLong {
        column: &'static str,
        len: usize,
        max: usize,
    },

    /// Text payload holds a zero byte, which the on-disk slot uses as its terminator.
    #[error("{column} contains a NUL byte")]
    ContainsNul { column: &'static str },

    #[error("duplicate key: {key}")]
    DuplicateKey { key: u32 },

    #[error("table full: capacity of {capacity} rows reached")]
    TableFull { capacity: usize },

    /// A single leaf page has no room for another cell.
    #[error("leaf node is full")]
    NodeFull,

    #[error("corrupt database file: {reason}")]
    CorruptFile { reason: String },

    #[error("tried to fetch page number out of bounds: {page_num} >= {max_pages}")]
    PageOutOfRange { page_num: u32, max_pages: usize },

    #[error("tried to flush page {page_num} which is not cached")]
    FlushUncached { page_num: u32 },

    #[error("invalid table configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl Error {
    pub fn corrupt<S: Into<String>>(reason: S) -> Self {
        Self::CorruptFile {
            reason: reason.into(),
        }
    }

    /// Caller input was rejected before any mutation was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NegativeId { .. } | Self::StringTooLong { .. } | Self::ContainsNul { .. }
        )
    }

    /// The session should not keep using the table after this.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CorruptFile { .. }
                | Self::PageOutOfRange { .. }
                | Self::FlushUncached { .. }
                | Self::Io { .. }
        )
    }
}
