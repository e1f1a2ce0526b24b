//! Root lifecycle: creation, reuse across successive searches, validation.

use cz_core::{GameSnapshot, Position};

use crate::cache::{Cache, SearchError};
use crate::node::NodeId;
use crate::zobrist::ZobristTable;

pub struct Tree {
    root: Option<NodeId>,
    resume_previous_position: bool,
}

impl Tree {
    pub fn new(resume_previous_position: bool) -> Self {
        Self {
            root: None,
            resume_previous_position,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Drop the root reference without touching the cache.
    pub fn reset(&mut self) {
        self.root = None;
    }

    /// Return the root node, allocating and binding one for the current game
    /// position if none exists. Always returns a fully initialised node.
    pub fn embodied_root<P: Position>(
        &mut self,
        cache: &mut Cache<P>,
        game: &GameSnapshot<P>,
    ) -> Result<NodeId, SearchError> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        debug_assert_eq!(cache.used(), 0);

        let hash = ZobristTable::global().hash(&game.position);
        let root = cache.new_node(None, None, None)?;
        if !cache.has_position(hash) {
            cache.new_node_position(hash, game.position.clone())?;
        }
        cache.link(root, hash)?;
        if let Some(outcome) = game.position.outcome() {
            let node = cache.node_mut(root);
            node.terminal = true;
            node.proven = Some(outcome.value());
        }
        self.root = Some(root);
        Ok(root)
    }

    /// Re-root for a new search: either resume onto the subtree that reached
    /// the current game position, or drop everything. Compacts the arena
    /// either way.
    pub fn clear_root<P: Position>(&mut self, cache: &mut Cache<P>, game: &GameSnapshot<P>) {
        let Some(old_root) = self.root else {
            cache.reset_nodes(None);
            return;
        };

        let resumed = if self.resume_previous_position {
            let hash = ZobristTable::global().hash(&game.position);
            find_resume(cache, old_root, hash, &game.position)
        } else {
            None
        };

        match resumed {
            Some(new_root) => {
                detach(cache, new_root);
                cache.unlink_node(old_root);
                self.root = cache.reset_nodes(Some(new_root));
                log::debug!(
                    "resumed previous position: {} nodes kept",
                    cache.used()
                );
            }
            None => {
                cache.unlink_node(old_root);
                cache.reset_nodes(None);
                self.root = None;
                log::debug!("previous tree discarded");
            }
        }
    }

    /// Diagnostic descent: checks per-node invariants and returns the number
    /// of reachable nodes. The caller compares it against `cache.used()`.
    pub fn validate<P: Position>(&self, cache: &Cache<P>) -> Result<usize, SearchError> {
        let Some(root) = self.root else {
            return Ok(0);
        };
        let mut count = 0usize;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            count += 1;
            let node = cache.node(id);
            if id != root && node.prior().is_none() {
                return Err(SearchError::InvalidState {
                    msg: "non-root node without a prior",
                });
            }
            if node.is_expanded() {
                if node.visits() == 0 {
                    return Err(SearchError::InvalidState {
                        msg: "expanded node with zero visits",
                    });
                }
                if node.children().is_empty() {
                    return Err(SearchError::InvalidState {
                        msg: "expanded node with no children",
                    });
                }
            }
            if node.visits() > 0 {
                let Some(hash) = node.hash() else {
                    return Err(SearchError::InvalidState {
                        msg: "visited node without a bound position",
                    });
                };
                let Some(entry) = cache.position(hash) else {
                    return Err(SearchError::InvalidState {
                        msg: "node bound to a missing position entry",
                    });
                };
                if !entry.transpositions().contains(&id) {
                    return Err(SearchError::InvalidState {
                        msg: "node missing from its transposition set",
                    });
                }
                if node.is_expanded() && node.children().len() != entry.moves().len() {
                    return Err(SearchError::InvalidState {
                        msg: "expansion is not all-or-nothing",
                    });
                }
            }
            stack.extend_from_slice(node.children());
        }
        Ok(count)
    }
}

/// Locate a node in the old tree that sits on the current game position. The
/// engine searched on its own move, so the played move is a child of the old
/// root and the opponent reply a grandchild; check that layer first, then the
/// child layer for differing play orders. Proven terminals are never resumed.
fn find_resume<P: Position>(
    cache: &Cache<P>,
    old_root: NodeId,
    hash: u64,
    target: &P,
) -> Option<NodeId> {
    let matches = |id: NodeId| -> bool {
        let node = cache.node(id);
        if node.is_terminal() || node.hash() != Some(hash) {
            return false;
        }
        cache.position(hash).is_some_and(|e| e.position() == target)
    };

    for &child in cache.node(old_root).children() {
        for &grandchild in cache.node(child).children() {
            if matches(grandchild) {
                return Some(grandchild);
            }
        }
    }
    for &child in cache.node(old_root).children() {
        if matches(child) {
            return Some(child);
        }
    }
    None
}

/// Cut a node out of its parent so it can become a root: the unlink pass
/// must not descend into the surviving subtree.
fn detach<P: Position>(cache: &mut Cache<P>, id: NodeId) {
    if let Some(parent) = cache.node(id).parent() {
        cache.node_mut(parent).children.retain(|&c| c != id);
    }
    let node = cache.node_mut(id);
    node.parent = None;
    node.mv = None;
    node.prior = None;
}
