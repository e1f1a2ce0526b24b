//! Rules-engine and game-history boundary.
//!
//! The search core never generates moves or applies rules itself; it consumes
//! a `Position` value through this trait and asks a `History` for the game it
//! should be searching.

use std::fmt::{Debug, Display};

/// Side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn flip(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// Game-over verdict for a position, stated for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The side to move is checkmated.
    Checkmate,
    /// Stalemate, insufficient material, or a rule draw.
    Draw,
}

impl Outcome {
    /// Exact game-theoretic value from the side-to-move's point of view.
    pub fn value(self) -> f32 {
        match self {
            Outcome::Checkmate => -1.0,
            Outcome::Draw => 0.0,
        }
    }
}

/// An immutable chess position as the search core sees it.
///
/// Equality must be position identity (placement, side to move, castling
/// rights, en-passant availability); it decides transposition sharing
/// together with the Zobrist hash.
pub trait Position: Clone + PartialEq {
    type Move: Copy + Eq + Debug + Display;

    fn legal_moves(&self) -> Vec<Self::Move>;
    fn make_move(&self, mv: Self::Move) -> Self;
    /// `None` while the game is ongoing.
    fn outcome(&self) -> Option<Outcome>;
    fn side_to_move(&self) -> Color;
    /// Total non-pawn material on the board, both sides (N=B=3, R=5, Q=9).
    fn material_score(&self) -> i32;

    /// Visit every occupied square as `(square 0..64, piece 0..12)`.
    ///
    /// Piece indices: white P N B R Q K = 0..6, black P N B R Q K = 6..12.
    /// Square 0 = a1, 63 = h8.
    fn for_each_piece(&self, f: impl FnMut(u8, u8));
    /// Castling rights mask: WK=1, WQ=2, BK=4, BQ=8.
    fn castling_rights(&self) -> u8;
    /// File (0..8) of the en-passant target, only when a capture onto it is
    /// actually legal for the side to move.
    fn en_passant_file(&self) -> Option<u8>;
}

/// What the game-history store reports at the start of a search.
#[derive(Debug, Clone)]
pub struct GameSnapshot<P: Position> {
    pub position: P,
    pub half_move_number: u32,
    pub material_score: i32,
}

impl<P: Position> GameSnapshot<P> {
    pub fn new(position: P, half_move_number: u32) -> Self {
        let material_score = position.material_score();
        Self {
            position,
            half_move_number,
            material_score,
        }
    }
}

/// Game-history boundary: where the current game state comes from.
pub trait History<P: Position> {
    fn current_game(&self) -> GameSnapshot<P>;
}
