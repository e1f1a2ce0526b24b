//! cz-board: a compact reference implementation of the rules interface.
//!
//! 8x8 mailbox board with FEN parsing, full legal move generation, terminal
//! detection, and the Zobrist feature accessors the search core hashes from.
//! Built for correctness and clarity; embedders with a serious rules engine
//! plug theirs in through `cz_core::Position` instead.

pub mod board;
pub mod movegen;
pub mod types;

pub use board::{Board, FenError};
pub use types::{file_of, rank_of, square, Move, MoveParseError, Piece};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}

#[cfg(test)]
mod movegen_tests;
