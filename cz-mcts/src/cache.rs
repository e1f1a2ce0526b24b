//! Node arena and transposition cache.
//!
//! The cache owns every `Node` and every `NodePosition`. Nodes reference
//! their shared position entry by hash; entries hold a back-set of node ids.
//! Neither side owns the other, and both indices resolve through the cache.

use cz_core::Position;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::node::{Node, NodeId};
use crate::zobrist::ZobristTable;

/// Errors raised inside the search core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The node arena is full; the search must wind down.
    #[error("node arena exhausted")]
    ArenaExhausted,
    /// A structural invariant does not hold.
    #[error("invalid search state: {msg}")]
    InvalidState { msg: &'static str },
}

/// Shared state for every node that reaches the same chess position.
pub struct NodePosition<P: Position> {
    hash: u64,
    position: P,
    moves: Vec<P::Move>,
    priors: Option<Vec<f32>>,
    static_value: Option<f32>,
    transpositions: Vec<NodeId>,
}

impl<P: Position> NodePosition<P> {
    fn new(hash: u64, position: P) -> Self {
        let moves = position.legal_moves();
        Self {
            hash,
            position,
            moves,
            priors: None,
            static_value: None,
            transpositions: Vec::new(),
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn position(&self) -> &P {
        &self.position
    }

    /// Legal moves, computed once when the entry was created.
    pub fn moves(&self) -> &[P::Move] {
        &self.moves
    }

    /// Policy priors aligned with `moves()`, set on first evaluation.
    pub fn priors(&self) -> Option<&[f32]> {
        self.priors.as_deref()
    }

    pub fn static_value(&self) -> Option<f32> {
        self.static_value
    }

    pub fn is_evaluated(&self) -> bool {
        self.static_value.is_some()
    }

    /// Every live node currently bound to this entry.
    pub fn transpositions(&self) -> &[NodeId] {
        &self.transpositions
    }
}

/// Fixed-capacity arena of search nodes plus the hash-keyed position table.
pub struct Cache<P: Position> {
    nodes: Vec<Node<P::Move>>,
    capacity: usize,
    positions: FxHashMap<u64, NodePosition<P>>,
    hits: u64,
    misses: u64,
}

impl<P: Position> Cache<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: Vec::new(),
            capacity,
            positions: FxHashMap::default(),
            hits: 0,
            misses: 0,
        }
    }

    /// Nodes currently allocated.
    pub fn used(&self) -> usize {
        self.nodes.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.nodes.len()
    }

    /// Transposition probe counters: (hits, misses).
    pub fn probe_stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn node(&self, id: NodeId) -> &Node<P::Move> {
        &self.nodes[id as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<P::Move> {
        &mut self.nodes[id as usize]
    }

    /// Allocate the next node slot.
    pub fn new_node(
        &mut self,
        parent: Option<NodeId>,
        mv: Option<P::Move>,
        prior: Option<f32>,
    ) -> Result<NodeId, SearchError> {
        if self.nodes.len() >= self.capacity {
            return Err(SearchError::ArenaExhausted);
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node::new(parent, mv, prior));
        Ok(id)
    }

    pub fn has_position(&self, hash: u64) -> bool {
        self.positions.contains_key(&hash)
    }

    pub fn position(&self, hash: u64) -> Option<&NodePosition<P>> {
        self.positions.get(&hash)
    }

    /// Insert a fresh entry for `hash`. The caller links nodes afterwards.
    pub fn new_node_position(
        &mut self,
        hash: u64,
        position: P,
    ) -> Result<&mut NodePosition<P>, SearchError> {
        if self.positions.len() >= self.capacity {
            return Err(SearchError::ArenaExhausted);
        }
        Ok(self
            .positions
            .entry(hash)
            .or_insert_with(|| NodePosition::new(hash, position)))
    }

    /// Bind a node to the entry for `hash`, joining its transposition set.
    pub fn link(&mut self, id: NodeId, hash: u64) -> Result<(), SearchError> {
        let entry = self
            .positions
            .get_mut(&hash)
            .ok_or(SearchError::InvalidState {
                msg: "link to a missing position entry",
            })?;
        entry.transpositions.push(id);
        self.nodes[id as usize].hash = Some(hash);
        Ok(())
    }

    /// Materialise an unbound child: derive its position from the parent's
    /// entry, hash it, and bind it to the (possibly shared) entry. Marks the
    /// node proven when the position is terminal.
    pub fn bind_child(&mut self, id: NodeId) -> Result<u64, SearchError> {
        let node = &self.nodes[id as usize];
        if let Some(hash) = node.hash {
            return Ok(hash);
        }
        let parent = node.parent.ok_or(SearchError::InvalidState {
            msg: "unbound node without a parent",
        })?;
        let mv = node.mv.ok_or(SearchError::InvalidState {
            msg: "unbound node without a move",
        })?;
        let parent_hash = self.nodes[parent as usize]
            .hash
            .ok_or(SearchError::InvalidState {
                msg: "child bound before its parent",
            })?;
        let parent_entry = self
            .positions
            .get(&parent_hash)
            .ok_or(SearchError::InvalidState {
                msg: "parent bound to a missing position entry",
            })?;
        let position = parent_entry.position.make_move(mv);
        let hash = ZobristTable::global().hash(&position);

        if let Some(entry) = self.positions.get(&hash) {
            debug_assert!(entry.position == position);
            self.hits += 1;
        } else {
            self.misses += 1;
            self.new_node_position(hash, position.clone())?;
        }
        self.link(id, hash)?;

        if let Some(outcome) = position.outcome() {
            let node = &mut self.nodes[id as usize];
            node.terminal = true;
            node.proven = Some(outcome.value());
        }
        Ok(hash)
    }

    /// Record the first evaluation of a position. First writer wins; returns
    /// the static value now stored on the entry.
    pub fn store_evaluation(
        &mut self,
        hash: u64,
        priors: Vec<f32>,
        value: f32,
    ) -> Result<f32, SearchError> {
        let entry = self
            .positions
            .get_mut(&hash)
            .ok_or(SearchError::InvalidState {
                msg: "evaluation for a missing position entry",
            })?;
        if let Some(existing) = entry.static_value {
            return Ok(existing);
        }
        if priors.len() != entry.moves.len() {
            return Err(SearchError::InvalidState {
                msg: "prior count does not match legal move count",
            });
        }
        entry.priors = Some(normalize(priors));
        let value = value.clamp(-1.0, 1.0);
        entry.static_value = Some(value);
        Ok(value)
    }

    /// Unlink `id` and all descendants from their transposition sets. Entries
    /// whose set drains become collectable at the next `reset_nodes`.
    pub fn unlink_node(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let node = &self.nodes[cur as usize];
            let hash = node.hash;
            stack.extend_from_slice(&node.children);
            if let Some(hash) = hash {
                if let Some(entry) = self.positions.get_mut(&hash) {
                    entry.transpositions.retain(|&n| n != cur);
                }
            }
        }
    }

    /// Compact the arena down to the nodes reachable from `retained`, remap
    /// every id, rebuild transposition sets, and drop orphaned entries.
    /// Returns the retained root's new id.
    pub fn reset_nodes(&mut self, retained: Option<NodeId>) -> Option<NodeId> {
        let root = match retained {
            Some(root) => root,
            None => {
                self.nodes.clear();
                self.positions.clear();
                return None;
            }
        };

        let mut remap = vec![NodeId::MAX; self.nodes.len()];
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::from([root]);
        while let Some(old) = queue.pop_front() {
            if remap[old as usize] != NodeId::MAX {
                continue;
            }
            remap[old as usize] = order.len() as NodeId;
            order.push(old);
            queue.extend(self.nodes[old as usize].children.iter().copied());
        }

        let mut compacted = Vec::with_capacity(order.len());
        for &old in &order {
            let mut node = self.nodes[old as usize].clone();
            node.parent = node
                .parent
                .map(|p| remap[p as usize])
                .filter(|&p| p != NodeId::MAX);
            for child in &mut node.children {
                *child = remap[*child as usize];
            }
            compacted.push(node);
        }
        self.nodes = compacted;

        for entry in self.positions.values_mut() {
            entry.transpositions.clear();
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Some(hash) = node.hash {
                if let Some(entry) = self.positions.get_mut(&hash) {
                    entry.transpositions.push(idx as NodeId);
                }
            }
        }
        self.positions.retain(|_, e| !e.transpositions.is_empty());

        Some(remap[root as usize])
    }
}

fn normalize(mut priors: Vec<f32>) -> Vec<f32> {
    let sum: f32 = priors.iter().copied().filter(|p| p.is_finite()).sum();
    if sum.is_finite() && sum > 0.0 {
        for p in &mut priors {
            *p = if p.is_finite() { *p / sum } else { 0.0 };
        }
        priors
    } else {
        // Degenerate policy: fall back to uniform over legal moves.
        let n = priors.len().max(1) as f32;
        vec![1.0 / n; priors.len()]
    }
}
