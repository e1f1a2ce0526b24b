//! Pieces, squares, and moves.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Square 0 = a1, 7 = h1, 56 = a8, 63 = h8.
pub fn square(file: u8, rank: u8) -> u8 {
    rank * 8 + file
}

pub fn file_of(sq: u8) -> u8 {
    sq & 7
}

pub fn rank_of(sq: u8) -> u8 {
    sq >> 3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl Piece {
    /// Index within one color's piece block: P N B R Q K = 0..6.
    pub fn index(self) -> u8 {
        match self {
            Piece::Pawn => 0,
            Piece::Knight => 1,
            Piece::Bishop => 2,
            Piece::Rook => 3,
            Piece::Queen => 4,
            Piece::King => 5,
        }
    }

    fn promotion_char(self) -> Option<char> {
        match self {
            Piece::Knight => Some('n'),
            Piece::Bishop => Some('b'),
            Piece::Rook => Some('r'),
            Piece::Queen => Some('q'),
            _ => None,
        }
    }
}

/// Castling rights bits, matching the search core's convention.
pub const WHITE_KINGSIDE: u8 = 1;
pub const WHITE_QUEENSIDE: u8 = 2;
pub const BLACK_KINGSIDE: u8 = 4;
pub const BLACK_QUEENSIDE: u8 = 8;

/// A move in coordinate form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: u8,
    pub to: u8,
    pub promotion: Option<Piece>,
}

impl Move {
    pub fn new(from: u8, to: u8) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn promotion(from: u8, to: u8, piece: Piece) -> Self {
        Self {
            from,
            to,
            promotion: Some(piece),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            (b'a' + file_of(self.from)) as char,
            (b'1' + rank_of(self.from)) as char,
            (b'a' + file_of(self.to)) as char,
            (b'1' + rank_of(self.to)) as char,
        )?;
        if let Some(p) = self.promotion.and_then(Piece::promotion_char) {
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid move string {0:?}")]
pub struct MoveParseError(pub String);

impl FromStr for Move {
    type Err = MoveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MoveParseError(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() < 4 || bytes.len() > 5 {
            return Err(err());
        }
        let sq = |f: u8, r: u8| -> Result<u8, MoveParseError> {
            if !(b'a'..=b'h').contains(&f) || !(b'1'..=b'8').contains(&r) {
                return Err(err());
            }
            Ok(square(f - b'a', r - b'1'))
        };
        let from = sq(bytes[0], bytes[1])?;
        let to = sq(bytes[2], bytes[3])?;
        let promotion = match bytes.get(4) {
            None => None,
            Some(b'n') => Some(Piece::Knight),
            Some(b'b') => Some(Piece::Bishop),
            Some(b'r') => Some(Piece::Rook),
            Some(b'q') => Some(Piece::Queen),
            Some(_) => return Err(err()),
        };
        Ok(Move {
            from,
            to,
            promotion,
        })
    }
}
