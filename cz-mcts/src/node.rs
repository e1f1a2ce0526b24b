//! Search-tree vertices and the primitives that drive them: PUCT selection,
//! expansion, backup, and exactness proofs.
//!
//! Sign convention: a node's `value_sum` accumulates values from the
//! perspective of the player who moved into it, so `q()` is directly the
//! parent's view of the edge.

use cz_core::Position;

use crate::cache::{Cache, SearchError};

pub type NodeId = u32;

#[derive(Clone)]
pub struct Node<M> {
    pub(crate) parent: Option<NodeId>,
    pub(crate) mv: Option<M>,
    /// Key into the cache's position table; `None` until first reached.
    pub(crate) hash: Option<u64>,
    /// Prior probability from the parent's policy. Roots have none.
    pub(crate) prior: Option<f32>,
    pub(crate) visits: u32,
    pub(crate) value_sum: f64,
    pub(crate) virtual_loss: u32,
    pub(crate) children: Vec<NodeId>,
    pub(crate) expanded: bool,
    /// True game end (checkmate/draw), as opposed to a proven interior node.
    pub(crate) terminal: bool,
    /// Proven game-theoretic value from this node's side-to-move view.
    pub(crate) proven: Option<f32>,
}

impl<M> Node<M> {
    pub(crate) fn new(parent: Option<NodeId>, mv: Option<M>, prior: Option<f32>) -> Self {
        Self {
            parent,
            mv,
            hash: None,
            prior,
            visits: 0,
            value_sum: 0.0,
            virtual_loss: 0,
            children: Vec::new(),
            expanded: false,
            terminal: false,
            proven: None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The move that led from the parent to this node.
    pub fn last_move(&self) -> Option<&M> {
        self.mv.as_ref()
    }

    pub fn hash(&self) -> Option<u64> {
        self.hash
    }

    pub fn prior(&self) -> Option<f32> {
        self.prior
    }

    pub fn visits(&self) -> u32 {
        self.visits
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn is_exact(&self) -> bool {
        self.proven.is_some()
    }

    pub fn proven_value(&self) -> Option<f32> {
        self.proven
    }

    /// Mean action value from the parent's perspective.
    pub fn q(&self) -> f32 {
        (self.value_sum / f64::from(self.visits.max(1))) as f32
    }

    /// Q with in-flight virtual losses folded in.
    pub fn q_effective(&self, virtual_loss: u32) -> f32 {
        let penalty = self.virtual_loss * virtual_loss;
        let n = self.visits + penalty;
        if n == 0 {
            return 0.0;
        }
        ((self.value_sum - f64::from(penalty)) / f64::from(n)) as f32
    }
}

/// Pick the child maximising `Q + c_puct * P * sqrt(N_parent) / (1 + N)`.
/// Ties break toward the higher prior, then the lower child index.
pub fn select_child<P: Position>(
    cache: &Cache<P>,
    parent: NodeId,
    c_puct: f32,
    virtual_loss: u32,
) -> Option<NodeId> {
    let p = cache.node(parent);
    let parent_n = p.visits + p.virtual_loss * virtual_loss;
    let sqrt_sum = (parent_n as f32).sqrt();

    let mut best: Option<(NodeId, f32, f32)> = None;
    for &cid in &p.children {
        let child = cache.node(cid);
        let n_eff = child.visits + child.virtual_loss * virtual_loss;
        let q = child.q_effective(virtual_loss);
        let prior = child.prior.unwrap_or(0.0);
        let score = q + c_puct * prior * sqrt_sum / (1.0 + n_eff as f32);
        match best {
            None => best = Some((cid, score, prior)),
            Some((_, best_score, best_prior)) => {
                if score > best_score || (score == best_score && prior > best_prior) {
                    best = Some((cid, score, prior));
                }
            }
        }
    }
    best.map(|(id, _, _)| id)
}

/// Attach one child per legal move, priors taken from the node's position
/// entry. All-or-nothing: fails with `ArenaExhausted` before allocating
/// anything if the arena cannot hold the whole batch.
pub fn expand<P: Position>(cache: &mut Cache<P>, id: NodeId) -> Result<(), SearchError> {
    let node = cache.node(id);
    if node.expanded {
        return Ok(());
    }
    if node.terminal {
        return Err(SearchError::InvalidState {
            msg: "expansion of a terminal node",
        });
    }
    if node.visits == 0 {
        return Err(SearchError::InvalidState {
            msg: "expansion before first visit",
        });
    }
    let hash = node.hash.ok_or(SearchError::InvalidState {
        msg: "expansion of an unbound node",
    })?;
    let entry = cache.position(hash).ok_or(SearchError::InvalidState {
        msg: "expansion with a missing position entry",
    })?;
    let priors = entry
        .priors()
        .ok_or(SearchError::InvalidState {
            msg: "expansion before evaluation",
        })?
        .to_vec();
    let moves = entry.moves().to_vec();
    if moves.is_empty() {
        return Err(SearchError::InvalidState {
            msg: "non-terminal position with no legal moves",
        });
    }
    if cache.remaining() < moves.len() {
        return Err(SearchError::ArenaExhausted);
    }

    let mut children = Vec::with_capacity(moves.len());
    for (mv, prior) in moves.into_iter().zip(priors) {
        children.push(cache.new_node(Some(id), Some(mv), Some(prior))?);
    }
    let node = cache.node_mut(id);
    node.children = children;
    node.expanded = true;
    Ok(())
}

/// Walk the parent chain from `leaf`, incrementing visits, adding the signed
/// value, and releasing one virtual loss per node. `leaf_value` is from the
/// leaf side-to-move's point of view.
pub fn backup<P: Position>(cache: &mut Cache<P>, leaf: NodeId, leaf_value: f32) {
    let mut value = -f64::from(leaf_value);
    let mut cursor = Some(leaf);
    while let Some(id) = cursor {
        let node = cache.node_mut(id);
        node.visits += 1;
        node.value_sum += value;
        node.virtual_loss = node.virtual_loss.saturating_sub(1);
        value = -value;
        cursor = node.parent;
    }
}

/// Undo the virtual losses applied on the descent to `leaf` without touching
/// visit statistics (aborted iteration).
pub fn revert_virtual_loss<P: Position>(cache: &mut Cache<P>, leaf: NodeId) {
    let mut cursor = Some(leaf);
    while let Some(id) = cursor {
        let node = cache.node_mut(id);
        node.virtual_loss = node.virtual_loss.saturating_sub(1);
        cursor = node.parent;
    }
}

/// Propagate exactness upward from a freshly proven node: a child that is a
/// proven loss for its own side proves the parent a win outright; otherwise
/// the parent becomes exact once all children are, with value = max over
/// children from the parent's view.
pub fn propagate_exact<P: Position>(cache: &mut Cache<P>, from: NodeId) {
    let mut cursor = cache.node(from).parent;
    while let Some(id) = cursor {
        let node = cache.node(id);
        if node.proven.is_some() || !node.expanded {
            break;
        }
        let mut all_exact = true;
        let mut best = f32::NEG_INFINITY;
        for &cid in &node.children {
            match cache.node(cid).proven {
                Some(v) => best = best.max(-v),
                None => all_exact = false,
            }
        }
        let verdict = if best == 1.0 {
            Some(1.0)
        } else if all_exact {
            Some(best)
        } else {
            None
        };
        match verdict {
            Some(v) => {
                let node = cache.node_mut(id);
                node.proven = Some(v);
                cursor = node.parent;
            }
            None => break,
        }
    }
}
