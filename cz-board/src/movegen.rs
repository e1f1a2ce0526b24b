//! Move generation: pseudo-legal generation plus a make-and-test legality
//! filter. Built for clarity over speed.

use cz_core::Color;

use crate::board::Board;
use crate::types::{
    file_of, rank_of, square, Move, Piece, BLACK_KINGSIDE, BLACK_QUEENSIDE, WHITE_KINGSIDE,
    WHITE_QUEENSIDE,
};

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

const BISHOP_DIRS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
const ROOK_DIRS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

const PROMOTIONS: [Piece; 4] = [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight];

fn shift(sq: u8, df: i8, dr: i8) -> Option<u8> {
    let file = file_of(sq) as i8 + df;
    let rank = rank_of(sq) as i8 + dr;
    if (0..8).contains(&file) && (0..8).contains(&rank) {
        Some(square(file as u8, rank as u8))
    } else {
        None
    }
}

impl Board {
    pub fn legal_moves(&self) -> Vec<Move> {
        self.pseudo_moves()
            .into_iter()
            .filter(|&mv| !self.make_move(mv).in_check(self.side))
            .collect()
    }

    pub(crate) fn in_check(&self, color: Color) -> bool {
        let king = self.squares.iter().position(|occ| {
            matches!(occ, Some((c, Piece::King)) if *c == color)
        });
        match king {
            Some(sq) => self.attacked(sq as u8, color.flip()),
            None => false,
        }
    }

    /// Is `sq` attacked by any piece of `by`?
    pub(crate) fn attacked(&self, sq: u8, by: Color) -> bool {
        // Pawns attack from one rank behind their direction of travel.
        let pawn_rank = match by {
            Color::White => -1,
            Color::Black => 1,
        };
        for df in [-1, 1] {
            if let Some(from) = shift(sq, df, pawn_rank) {
                if self.squares[from as usize] == Some((by, Piece::Pawn)) {
                    return true;
                }
            }
        }

        for (df, dr) in KNIGHT_OFFSETS {
            if let Some(from) = shift(sq, df, dr) {
                if self.squares[from as usize] == Some((by, Piece::Knight)) {
                    return true;
                }
            }
        }

        for (df, dr) in KING_OFFSETS {
            if let Some(from) = shift(sq, df, dr) {
                if self.squares[from as usize] == Some((by, Piece::King)) {
                    return true;
                }
            }
        }

        for (dirs, slider) in [(ROOK_DIRS, Piece::Rook), (BISHOP_DIRS, Piece::Bishop)] {
            for (df, dr) in dirs {
                let mut cur = sq;
                while let Some(next) = shift(cur, df, dr) {
                    match self.squares[next as usize] {
                        None => cur = next,
                        Some((c, p)) => {
                            if c == by && (p == slider || p == Piece::Queen) {
                                return true;
                            }
                            break;
                        }
                    }
                }
            }
        }
        false
    }

    pub(crate) fn pseudo_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(48);
        for from in 0..64u8 {
            let Some((color, piece)) = self.squares[from as usize] else {
                continue;
            };
            if color != self.side {
                continue;
            }
            match piece {
                Piece::Pawn => self.pawn_moves(from, color, &mut moves),
                Piece::Knight => self.offset_moves(from, color, &KNIGHT_OFFSETS, &mut moves),
                Piece::King => {
                    self.offset_moves(from, color, &KING_OFFSETS, &mut moves);
                    self.castling_moves(from, color, &mut moves);
                }
                Piece::Bishop => self.slider_moves(from, color, &BISHOP_DIRS, &mut moves),
                Piece::Rook => self.slider_moves(from, color, &ROOK_DIRS, &mut moves),
                Piece::Queen => {
                    self.slider_moves(from, color, &BISHOP_DIRS, &mut moves);
                    self.slider_moves(from, color, &ROOK_DIRS, &mut moves);
                }
            }
        }
        moves
    }

    fn offset_moves(&self, from: u8, color: Color, offsets: &[(i8, i8)], out: &mut Vec<Move>) {
        for &(df, dr) in offsets {
            if let Some(to) = shift(from, df, dr) {
                match self.squares[to as usize] {
                    Some((c, _)) if c == color => {}
                    _ => out.push(Move::new(from, to)),
                }
            }
        }
    }

    fn slider_moves(&self, from: u8, color: Color, dirs: &[(i8, i8)], out: &mut Vec<Move>) {
        for &(df, dr) in dirs {
            let mut cur = from;
            while let Some(to) = shift(cur, df, dr) {
                match self.squares[to as usize] {
                    None => {
                        out.push(Move::new(from, to));
                        cur = to;
                    }
                    Some((c, _)) => {
                        if c != color {
                            out.push(Move::new(from, to));
                        }
                        break;
                    }
                }
            }
        }
    }

    fn pawn_moves(&self, from: u8, color: Color, out: &mut Vec<Move>) {
        let (dir, start_rank, promo_rank) = match color {
            Color::White => (1i8, 1u8, 7u8),
            Color::Black => (-1, 6, 0),
        };

        let push_pawn = |out: &mut Vec<Move>, from: u8, to: u8| {
            if rank_of(to) == promo_rank {
                for p in PROMOTIONS {
                    out.push(Move::promotion(from, to, p));
                }
            } else {
                out.push(Move::new(from, to));
            }
        };

        if let Some(to) = shift(from, 0, dir) {
            if self.squares[to as usize].is_none() {
                push_pawn(out, from, to);
                if rank_of(from) == start_rank {
                    if let Some(two) = shift(to, 0, dir) {
                        if self.squares[two as usize].is_none() {
                            out.push(Move::new(from, two));
                        }
                    }
                }
            }
        }

        for df in [-1, 1] {
            if let Some(to) = shift(from, df, dir) {
                match self.squares[to as usize] {
                    Some((c, _)) if c != color => push_pawn(out, from, to),
                    None if Some(to) == self.ep_square => out.push(Move::new(from, to)),
                    _ => {}
                }
            }
        }
    }

    fn castling_moves(&self, from: u8, color: Color, out: &mut Vec<Move>) {
        let (home, kingside, queenside) = match color {
            Color::White => (4u8, WHITE_KINGSIDE, WHITE_QUEENSIDE),
            Color::Black => (60, BLACK_KINGSIDE, BLACK_QUEENSIDE),
        };
        if from != home || self.in_check(color) {
            return;
        }
        let rook = Some((color, Piece::Rook));
        let enemy = color.flip();

        // Kingside: e-f-g empty of pieces, e and f not attacked; the landing
        // square is covered by the legality filter.
        if self.castling & kingside != 0
            && self.squares[from as usize + 1].is_none()
            && self.squares[from as usize + 2].is_none()
            && self.squares[from as usize + 3] == rook
            && !self.attacked(from + 1, enemy)
        {
            out.push(Move::new(from, from + 2));
        }
        if self.castling & queenside != 0
            && self.squares[from as usize - 1].is_none()
            && self.squares[from as usize - 2].is_none()
            && self.squares[from as usize - 3].is_none()
            && self.squares[from as usize - 4] == rook
            && !self.attacked(from - 1, enemy)
        {
            out.push(Move::new(from, from - 2));
        }
    }
}
