use crate::board::Board;
use crate::types::Move;

fn perft(board: &Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    board
        .legal_moves()
        .iter()
        .map(|&m| perft(&board.make_move(m), depth - 1))
        .sum()
}

#[test]
fn perft_start_position() {
    let b = Board::start_position();
    assert_eq!(perft(&b, 1), 20);
    assert_eq!(perft(&b, 2), 400);
    assert_eq!(perft(&b, 3), 8_902);
}

#[test]
fn perft_kiwipete() {
    let b = Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
        .unwrap();
    assert_eq!(perft(&b, 1), 48);
    assert_eq!(perft(&b, 2), 2_039);
}

#[test]
fn perft_en_passant_pins() {
    let b = Board::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
    assert_eq!(perft(&b, 1), 14);
    assert_eq!(perft(&b, 2), 191);
    assert_eq!(perft(&b, 3), 2_812);
}

#[test]
fn moves_are_generated_deterministically() {
    let b = Board::start_position();
    assert_eq!(b.legal_moves(), b.legal_moves());
}

#[test]
fn pinned_piece_cannot_move() {
    // The e-file knight is pinned against the king by the rook.
    let b = Board::from_fen("4r1k1/8/8/8/8/8/4N3/4K3 w - - 0 1").unwrap();
    let e2 = 12u8;
    assert!(b.legal_moves().iter().all(|m| m.from != e2));
}

#[test]
fn castling_is_blocked_through_check() {
    // Black rook on f8 covers f1: no kingside castling, queenside fine.
    let b = Board::from_fen("4kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
    let moves = b.legal_moves();
    let has = |s: &str| moves.contains(&s.parse::<Move>().unwrap());
    assert!(!has("e1g1"));
    assert!(has("e1c1"));
}

#[test]
fn king_cannot_step_into_attack() {
    let b = Board::from_fen("4k3/8/8/8/8/8/r7/4K3 w - - 0 1").unwrap();
    let moves = b.legal_moves();
    let has = |s: &str| moves.contains(&s.parse::<Move>().unwrap());
    assert!(!has("e1d2"));
    assert!(!has("e1e2"));
    assert!(has("e1d1"));
}

#[test]
fn promotions_generate_all_four_pieces() {
    let b = Board::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
    let promos: Vec<_> = b
        .legal_moves()
        .into_iter()
        .filter(|m| m.promotion.is_some())
        .collect();
    assert_eq!(promos.len(), 4);
}
