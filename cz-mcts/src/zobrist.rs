//! Zobrist position hashing.
//!
//! One process-wide table of random 64-bit keys, generated from a fixed seed
//! so hashes are reproducible across processes (debugging, test fixtures).

use cz_core::{Color, Position};
use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Fixed key-stream seed; changing it invalidates every stored hash.
const KEY_STREAM_SEED: u64 = 0x00C5_1A55_1CA1_0E55;

static TABLE: Lazy<ZobristTable> = Lazy::new(ZobristTable::new);

pub struct ZobristTable {
    piece_keys: [[u64; 12]; 64],
    side_key: u64,
    castling_keys: [u64; 16],
    ep_keys: [u64; 8],
}

impl ZobristTable {
    /// Build the key table. Deterministic: two tables are always identical.
    pub fn new() -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(KEY_STREAM_SEED);
        let mut piece_keys = [[0u64; 12]; 64];
        for square in piece_keys.iter_mut() {
            for key in square.iter_mut() {
                *key = rng.gen();
            }
        }
        let side_key = rng.gen();
        let mut castling_keys = [0u64; 16];
        for key in castling_keys.iter_mut() {
            *key = rng.gen();
        }
        let mut ep_keys = [0u64; 8];
        for key in ep_keys.iter_mut() {
            *key = rng.gen();
        }
        Self {
            piece_keys,
            side_key,
            castling_keys,
            ep_keys,
        }
    }

    /// The process-wide table, initialised on first access.
    pub fn global() -> &'static ZobristTable {
        &TABLE
    }

    /// Hash a position: XOR of every occupied (square, piece) key, the side
    /// key when black is to move, the active castling key, and the ep-file
    /// key when an en-passant capture is currently legal.
    pub fn hash<P: Position>(&self, position: &P) -> u64 {
        let mut h = 0u64;
        position.for_each_piece(|square, piece| {
            h ^= self.piece_keys[square as usize & 63][piece as usize % 12];
        });
        if position.side_to_move() == Color::Black {
            h ^= self.side_key;
        }
        h ^= self.castling_keys[(position.castling_rights() & 0xF) as usize];
        if let Some(file) = position.en_passant_file() {
            h ^= self.ep_keys[(file & 7) as usize];
        }
        h
    }
}

impl Default for ZobristTable {
    fn default() -> Self {
        Self::new()
    }
}
