//! Board state, FEN, move application, and the `Position` implementation.

use cz_core::{Color, Outcome, Position};
use thiserror::Error;

use crate::types::{
    file_of, rank_of, square, Move, Piece, BLACK_KINGSIDE, BLACK_QUEENSIDE, WHITE_KINGSIDE,
    WHITE_QUEENSIDE,
};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Error)]
pub enum FenError {
    #[error("malformed FEN {0:?}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct Board {
    pub(crate) squares: [Option<(Color, Piece)>; 64],
    pub(crate) side: Color,
    pub(crate) castling: u8,
    /// Target square of a possible en-passant capture (FEN convention),
    /// regardless of whether a capture is actually available.
    pub(crate) ep_square: Option<u8>,
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,
}

impl Board {
    pub fn start_position() -> Board {
        // START_FEN is a constant; parsing it cannot fail.
        Board::from_fen(START_FEN).unwrap_or_else(|_| unreachable!())
    }

    pub fn from_fen(fen: &str) -> Result<Board, FenError> {
        let err = || FenError::Malformed(fen.to_string());
        let mut fields = fen.split_whitespace();
        let placement = fields.next().ok_or_else(err)?;
        let side = fields.next().ok_or_else(err)?;
        let castling = fields.next().ok_or_else(err)?;
        let ep = fields.next().ok_or_else(err)?;
        let halfmove = fields.next().unwrap_or("0");
        let fullmove = fields.next().unwrap_or("1");

        let mut squares = [None; 64];
        let mut rank = 7u8;
        let mut file = 0u8;
        for c in placement.chars() {
            match c {
                '/' => {
                    if file != 8 || rank == 0 {
                        return Err(err());
                    }
                    rank -= 1;
                    file = 0;
                }
                '1'..='8' => {
                    file += c as u8 - b'0';
                    if file > 8 {
                        return Err(err());
                    }
                }
                _ => {
                    if file > 7 {
                        return Err(err());
                    }
                    let color = if c.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    let piece = match c.to_ascii_lowercase() {
                        'p' => Piece::Pawn,
                        'n' => Piece::Knight,
                        'b' => Piece::Bishop,
                        'r' => Piece::Rook,
                        'q' => Piece::Queen,
                        'k' => Piece::King,
                        _ => return Err(err()),
                    };
                    squares[square(file, rank) as usize] = Some((color, piece));
                    file += 1;
                }
            }
        }
        if rank != 0 || file != 8 {
            return Err(err());
        }

        let side = match side {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(err()),
        };

        let mut rights = 0u8;
        if castling != "-" {
            for c in castling.chars() {
                rights |= match c {
                    'K' => WHITE_KINGSIDE,
                    'Q' => WHITE_QUEENSIDE,
                    'k' => BLACK_KINGSIDE,
                    'q' => BLACK_QUEENSIDE,
                    _ => return Err(err()),
                };
            }
        }

        let ep_square = match ep {
            "-" => None,
            s => {
                let bytes = s.as_bytes();
                if bytes.len() != 2
                    || !(b'a'..=b'h').contains(&bytes[0])
                    || !(b'1'..=b'8').contains(&bytes[1])
                {
                    return Err(err());
                }
                Some(square(bytes[0] - b'a', bytes[1] - b'1'))
            }
        };

        let halfmove_clock = halfmove.parse().map_err(|_| err())?;
        let fullmove_number = fullmove.parse().map_err(|_| err())?;

        Ok(Board {
            squares,
            side,
            castling: rights,
            ep_square,
            halfmove_clock,
            fullmove_number,
        })
    }

    pub fn side_to_move(&self) -> Color {
        self.side
    }

    pub fn piece_at(&self, sq: u8) -> Option<(Color, Piece)> {
        self.squares[sq as usize]
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Apply a move assumed to come from `legal_moves`.
    pub fn make_move(&self, mv: Move) -> Board {
        let mut b = self.clone();
        let Some((color, piece)) = b.squares[mv.from as usize] else {
            debug_assert!(false, "make_move from an empty square");
            return b;
        };
        let captured = b.squares[mv.to as usize];

        // En-passant capture: diagonal pawn move onto the empty target.
        if piece == Piece::Pawn
            && Some(mv.to) == self.ep_square
            && captured.is_none()
            && file_of(mv.from) != file_of(mv.to)
        {
            let captured_sq = match color {
                Color::White => mv.to - 8,
                Color::Black => mv.to + 8,
            };
            b.squares[captured_sq as usize] = None;
        }

        b.squares[mv.from as usize] = None;
        let placed = match mv.promotion {
            Some(p) => (color, p),
            None => (color, piece),
        };
        b.squares[mv.to as usize] = Some(placed);

        // Castling: the king hops two files, the rook follows.
        if piece == Piece::King && file_of(mv.from).abs_diff(file_of(mv.to)) == 2 {
            let (rook_from, rook_to) = match mv.to {
                6 => (7u8, 5u8),
                2 => (0, 3),
                62 => (63, 61),
                58 => (56, 59),
                _ => (mv.to, mv.to),
            };
            if rook_from != rook_to {
                b.squares[rook_to as usize] = b.squares[rook_from as usize].take();
            }
        }

        if piece == Piece::King {
            b.castling &= match color {
                Color::White => !(WHITE_KINGSIDE | WHITE_QUEENSIDE),
                Color::Black => !(BLACK_KINGSIDE | BLACK_QUEENSIDE),
            };
        }
        for sq in [mv.from, mv.to] {
            b.castling &= match sq {
                0 => !WHITE_QUEENSIDE,
                7 => !WHITE_KINGSIDE,
                56 => !BLACK_QUEENSIDE,
                63 => !BLACK_KINGSIDE,
                _ => !0,
            };
        }

        b.ep_square = if piece == Piece::Pawn && rank_of(mv.from).abs_diff(rank_of(mv.to)) == 2 {
            Some((mv.from + mv.to) / 2)
        } else {
            None
        };

        if piece == Piece::Pawn || captured.is_some() {
            b.halfmove_clock = 0;
        } else {
            b.halfmove_clock += 1;
        }
        if color == Color::Black {
            b.fullmove_number += 1;
        }
        b.side = color.flip();
        b
    }

    pub fn outcome(&self) -> Option<Outcome> {
        if self.legal_moves().is_empty() {
            return Some(if self.in_check(self.side) {
                Outcome::Checkmate
            } else {
                Outcome::Draw
            });
        }
        if self.halfmove_clock >= 100 {
            return Some(Outcome::Draw);
        }
        if self.insufficient_material() {
            return Some(Outcome::Draw);
        }
        None
    }

    /// Total non-pawn material, both sides: N=B=3, R=5, Q=9.
    pub fn material_score(&self) -> i32 {
        self.squares
            .iter()
            .flatten()
            .map(|(_, piece)| match piece {
                Piece::Knight | Piece::Bishop => 3,
                Piece::Rook => 5,
                Piece::Queen => 9,
                Piece::Pawn | Piece::King => 0,
            })
            .sum()
    }

    /// File of the en-passant target, only when a capture onto it is legal.
    pub fn en_passant_file(&self) -> Option<u8> {
        let ep = self.ep_square?;
        let capturable = self.legal_moves().iter().any(|m| {
            m.to == ep
                && file_of(m.from) != file_of(ep)
                && matches!(self.squares[m.from as usize], Some((_, Piece::Pawn)))
        });
        if capturable {
            Some(file_of(ep))
        } else {
            None
        }
    }

    fn insufficient_material(&self) -> bool {
        let mut minors = 0;
        for (_, piece) in self.squares.iter().flatten() {
            match piece {
                Piece::King => {}
                Piece::Knight | Piece::Bishop => minors += 1,
                _ => return false,
            }
        }
        minors <= 1
    }
}

/// Position identity: placement, side to move, castling rights, and actual
/// en-passant availability. Move counters are bookkeeping, not identity.
impl PartialEq for Board {
    fn eq(&self, other: &Board) -> bool {
        self.squares == other.squares
            && self.side == other.side
            && self.castling == other.castling
            && self.en_passant_file() == other.en_passant_file()
    }
}

impl Position for Board {
    type Move = Move;

    fn legal_moves(&self) -> Vec<Move> {
        Board::legal_moves(self)
    }

    fn make_move(&self, mv: Move) -> Board {
        Board::make_move(self, mv)
    }

    fn outcome(&self) -> Option<Outcome> {
        Board::outcome(self)
    }

    fn side_to_move(&self) -> Color {
        self.side
    }

    fn material_score(&self) -> i32 {
        Board::material_score(self)
    }

    fn for_each_piece(&self, mut f: impl FnMut(u8, u8)) {
        for (sq, occupant) in self.squares.iter().enumerate() {
            if let Some((color, piece)) = occupant {
                let offset = match color {
                    Color::White => 0,
                    Color::Black => 6,
                };
                f(sq as u8, offset + piece.index());
            }
        }
    }

    fn castling_rights(&self) -> u8 {
        self.castling
    }

    fn en_passant_file(&self) -> Option<u8> {
        Board::en_passant_file(self)
    }
}
