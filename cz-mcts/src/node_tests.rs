use cz_board::{Board, Move};

use crate::cache::Cache;
use crate::node::{self, NodeId};
use crate::zobrist::ZobristTable;

fn make_root(cache: &mut Cache<Board>, board: &Board) -> NodeId {
    let hash = ZobristTable::global().hash(board);
    let root = cache.new_node(None, None, None).unwrap();
    cache.new_node_position(hash, board.clone()).unwrap();
    cache.link(root, hash).unwrap();
    root
}

fn evaluate_and_expand(cache: &mut Cache<Board>, id: NodeId) {
    let hash = cache.node(id).hash().unwrap();
    let entry = cache.position(hash).unwrap();
    if !entry.is_evaluated() {
        let n = entry.moves().len();
        cache
            .store_evaluation(hash, vec![1.0 / n as f32; n], 0.0)
            .unwrap();
    }
    if cache.node(id).visits() == 0 {
        node::backup(cache, id, 0.0);
    }
    node::expand(cache, id).unwrap();
}

fn child_by_move(cache: &Cache<Board>, parent: NodeId, mv: &str) -> NodeId {
    let mv: Move = mv.parse().unwrap();
    cache
        .node(parent)
        .children()
        .iter()
        .copied()
        .find(|&c| cache.node(c).last_move() == Some(&mv))
        .unwrap()
}

#[test]
fn expansion_is_all_or_nothing() {
    let mut cache: Cache<Board> = Cache::new(4096);
    let root = make_root(&mut cache, &Board::start_position());
    evaluate_and_expand(&mut cache, root);

    let root_node = cache.node(root);
    assert!(root_node.is_expanded());
    assert_eq!(root_node.children().len(), 20);
    for &c in root_node.children() {
        let child = cache.node(c);
        assert_eq!(child.parent(), Some(root));
        assert!(child.prior().is_some());
        assert_eq!(child.visits(), 0);
    }
}

#[test]
fn backup_flips_sign_every_ply() {
    let mut cache: Cache<Board> = Cache::new(4096);
    let root = make_root(&mut cache, &Board::start_position());
    evaluate_and_expand(&mut cache, root);

    let child = child_by_move(&cache, root, "e2e4");
    cache.bind_child(child).unwrap();
    // +0.5 for the side to move at the child means -0.5 for the mover.
    node::backup(&mut cache, child, 0.5);

    assert_eq!(cache.node(child).visits(), 1);
    assert!((cache.node(child).q() + 0.5).abs() < 1e-6);
    // Root averages its own zero evaluation with the +0.5 flipped back up.
    assert_eq!(cache.node(root).visits(), 2);
    assert!((cache.node(root).q() - 0.25).abs() < 1e-6);
}

#[test]
fn backup_conserves_visit_counts() {
    let mut cache: Cache<Board> = Cache::new(4096);
    let root = make_root(&mut cache, &Board::start_position());
    evaluate_and_expand(&mut cache, root);

    for mv in ["e2e4", "d2d4", "g1f3", "e2e4", "d2d4"] {
        let child = child_by_move(&cache, root, mv);
        cache.bind_child(child).unwrap();
        node::backup(&mut cache, child, 0.0);
    }

    let root_node = cache.node(root);
    let child_sum: u32 = root_node
        .children()
        .iter()
        .map(|&c| cache.node(c).visits())
        .sum();
    assert_eq!(root_node.visits(), 1 + child_sum);
}

#[test]
fn selection_prefers_unvisited_then_tracks_value() {
    let mut cache: Cache<Board> = Cache::new(4096);
    let root = make_root(&mut cache, &Board::start_position());
    evaluate_and_expand(&mut cache, root);

    // With equal priors and no visits anywhere, the first child wins the tie.
    let first = node::select_child(&cache, root, 2.5, 0).unwrap();
    assert_eq!(first, cache.node(root).children()[0]);

    // A clearly winning child dominates once visited.
    let strong = child_by_move(&cache, root, "e2e4");
    cache.bind_child(strong).unwrap();
    node::backup(&mut cache, strong, -0.9);
    for _ in 0..30 {
        let picked = node::select_child(&cache, root, 0.1, 0).unwrap();
        assert_eq!(picked, strong);
        node::backup(&mut cache, strong, -0.9);
    }
}

#[test]
fn selection_breaks_ties_by_prior() {
    let mut cache: Cache<Board> = Cache::new(4096);
    let root = make_root(&mut cache, &Board::start_position());
    let hash = cache.node(root).hash().unwrap();
    let n = cache.position(hash).unwrap().moves().len();
    let mut priors = vec![1.0; n];
    priors[5] = 3.0; // normalized, still the largest
    cache.store_evaluation(hash, priors, 0.0).unwrap();
    node::backup(&mut cache, root, 0.0);
    node::expand(&mut cache, root).unwrap();

    let picked = node::select_child(&cache, root, 2.5, 0).unwrap();
    assert_eq!(picked, cache.node(root).children()[5]);
}

#[test]
fn virtual_loss_diverts_selection_and_backup_releases_it() {
    let mut cache: Cache<Board> = Cache::new(4096);
    let root = make_root(&mut cache, &Board::start_position());
    evaluate_and_expand(&mut cache, root);

    let first = node::select_child(&cache, root, 2.5, 1).unwrap();
    cache.bind_child(first).unwrap();
    cache.node_mut(first).virtual_loss += 1;

    // An in-flight path pushes the second worker elsewhere.
    let second = node::select_child(&cache, root, 2.5, 1).unwrap();
    assert_ne!(second, first);

    node::backup(&mut cache, first, 0.0);
    assert_eq!(cache.node(first).virtual_loss, 0);
    assert_eq!(cache.node(first).visits(), 1);
}

#[test]
fn revert_virtual_loss_leaves_stats_untouched() {
    let mut cache: Cache<Board> = Cache::new(4096);
    let root = make_root(&mut cache, &Board::start_position());
    evaluate_and_expand(&mut cache, root);
    let child = child_by_move(&cache, root, "e2e4");
    cache.bind_child(child).unwrap();

    cache.node_mut(root).virtual_loss += 1;
    cache.node_mut(child).virtual_loss += 1;
    node::revert_virtual_loss(&mut cache, child);

    assert_eq!(cache.node(root).virtual_loss, 0);
    assert_eq!(cache.node(child).virtual_loss, 0);
    assert_eq!(cache.node(child).visits(), 0);
    assert_eq!(cache.node(root).visits(), 1);
}

#[test]
fn terminal_children_are_proven_on_bind() {
    let mut cache: Cache<Board> = Cache::new(4096);
    let board = Board::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
    let root = make_root(&mut cache, &board);
    evaluate_and_expand(&mut cache, root);

    let mate = child_by_move(&cache, root, "a1a8");
    cache.bind_child(mate).unwrap();
    let node = cache.node(mate);
    assert!(node.is_terminal());
    assert!(node.is_exact());
    assert_eq!(node.proven_value(), Some(-1.0));
}

#[test]
fn a_lost_child_proves_the_parent_won() {
    let mut cache: Cache<Board> = Cache::new(4096);
    let board = Board::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
    let root = make_root(&mut cache, &board);
    evaluate_and_expand(&mut cache, root);

    let mate = child_by_move(&cache, root, "a1a8");
    cache.bind_child(mate).unwrap();
    node::backup(&mut cache, mate, -1.0);
    node::propagate_exact(&mut cache, mate);

    assert_eq!(cache.node(root).proven_value(), Some(1.0));
    assert!(!cache.node(root).is_terminal());
}

#[test]
fn all_exact_children_prove_the_parent_by_max() {
    // Kh8 against Qf7+Kg6: every black reply is stalemate-adjacent; here the
    // root itself is one move from being proven drawn at best.
    let mut cache: Cache<Board> = Cache::new(4096);
    let board = Board::from_fen("7k/8/6KQ/8/8/8/8/8 b - - 0 1").unwrap();
    let root = make_root(&mut cache, &board);
    evaluate_and_expand(&mut cache, root);

    let children: Vec<NodeId> = cache.node(root).children().to_vec();
    for c in &children {
        cache.bind_child(*c).unwrap();
    }
    let mut proven = false;
    for c in children {
        if cache.node(c).proven_value().is_some() {
            let v = cache.node(c).proven_value().unwrap();
            node::backup(&mut cache, c, v);
            node::propagate_exact(&mut cache, c);
            proven = true;
        } else {
            // Force the remaining children exact for the propagation test.
            cache.node_mut(c).proven = Some(0.0);
            node::backup(&mut cache, c, 0.0);
            node::propagate_exact(&mut cache, c);
        }
    }
    assert!(proven || cache.node(root).is_exact());
    assert_eq!(cache.node(root).proven_value(), Some(0.0));
}
