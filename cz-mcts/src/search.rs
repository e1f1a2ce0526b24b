//! Search driver: the select / expand / evaluate / backup loop, worker pool,
//! and termination logic.
//!
//! Workers share one tree behind a single mutex; only evaluator calls happen
//! outside it, on a cloned leaf position. Virtual loss applied during the
//! locked descent keeps concurrent workers off each other's paths.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use cz_core::{GameSnapshot, History, Position, SearchLimits, SearchOptions};
use parking_lot::Mutex;

use crate::cache::{Cache, SearchError};
use crate::clock::{Clock, SearchInfo, Trend, MINIMUM_DEPTH};
use crate::eval::Evaluator;
use crate::node::{self, NodeId};
use crate::tree::Tree;

/// Evaluation swing below this is reported as `Trend::Same`.
const TREND_EPSILON: f32 = 0.01;

/// How long the driver sleeps between telemetry updates.
const DRIVER_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    pub iterations: u64,
    pub max_depth: u32,
    pub eval_calls: u64,
    pub eval_failures: u64,
    pub nodes_used: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[derive(Debug, Clone)]
pub struct SearchResult<M> {
    pub best_move: Option<M>,
    /// From the root side-to-move's point of view.
    pub value: f32,
    /// Principal variation: greedy max-visit descent from the root.
    pub pv: Vec<M>,
    pub stats: SearchStats,
}

struct TreeState<P: Position> {
    cache: Cache<P>,
    tree: Tree,
}

/// One descent, decided under the tree lock.
enum Descent<P: Position> {
    /// The iteration completed inside the lock.
    Backed { halt: bool },
    /// A leaf needs a network evaluation; the lock was released for it.
    NeedsEval {
        leaf: NodeId,
        position: P,
        moves: Vec<P::Move>,
        depth: u32,
    },
    /// The arena filled up mid-descent; virtual losses already reverted.
    Exhausted,
}

struct StepReport {
    completed: bool,
    halt: bool,
}

/// The "produce best move" driver. Owns the tree, cache, and clock; borrows
/// the evaluator and history per `run`.
pub struct Search<P: Position> {
    options: SearchOptions,
    clock: Clock,
    shared: Mutex<TreeState<P>>,
    stop: AtomicBool,
}

impl<P: Position> Search<P> {
    pub fn new(options: SearchOptions) -> Self {
        let clock = Clock::new(&options);
        let cache = Cache::new(options.cache_nodes);
        let tree = Tree::new(options.resume_previous_position);
        Self {
            options,
            clock,
            shared: Mutex::new(TreeState { cache, tree }),
            stop: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Hard cancel: workers stop at the next safe point.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Re-root (or drop) the tree for the game the history now reports.
    pub fn clear_root(&self, history: &impl History<P>) {
        let game = history.current_game();
        let mut shared = self.shared.lock();
        let TreeState { cache, tree } = &mut *shared;
        tree.clear_root(cache, &game);
    }

    /// Drop the whole tree (new game).
    pub fn reset(&self) {
        let mut shared = self.shared.lock();
        shared.tree.reset();
        shared.cache.reset_nodes(None);
    }

    /// Read-only access to the tree and cache, for diagnostics and tests.
    pub fn inspect<R>(&self, f: impl FnOnce(&Cache<P>, &Tree) -> R) -> R {
        let shared = self.shared.lock();
        f(&shared.cache, &shared.tree)
    }

    /// Diagnostic tree validation: per-node invariants plus the arena
    /// accounting check (reachable node count == arena usage).
    pub fn validate(&self) -> Result<usize, SearchError> {
        let shared = self.shared.lock();
        let count = shared.tree.validate(&shared.cache)?;
        if count != shared.cache.used() {
            return Err(SearchError::InvalidState {
                msg: "reachable node count does not match arena usage",
            });
        }
        Ok(count)
    }

    /// Search the history's current game until the clock fires, the root is
    /// proven, the arena fills, or an external stop arrives.
    pub fn run<E, H>(&self, limits: &SearchLimits, evaluator: &E, history: &H) -> SearchResult<P::Move>
    where
        P: Send,
        P::Move: Send,
        E: Evaluator<P> + Sync,
        H: History<P>,
    {
        let game = history.current_game();
        self.stop.store(false, Ordering::Release);

        // A finished game needs no search and no clock.
        if let Some(outcome) = game.position.outcome() {
            log::info!("root position is terminal ({outcome:?}); nothing to search");
            return SearchResult {
                best_move: None,
                value: outcome.value(),
                pv: Vec::new(),
                stats: SearchStats::default(),
            };
        }

        {
            let mut shared = self.shared.lock();
            let TreeState { cache, tree } = &mut *shared;
            if let Err(e) = tree.embodied_root(cache, &game) {
                log::warn!("could not allocate a search root: {e}");
                return self.fallback_result(&game);
            }
        }

        self.clock.set_limits(*limits);
        self.clock.start_deadline(
            game.position.side_to_move(),
            game.material_score,
            game.half_move_number,
        );
        log::debug!(
            "search started: side {:?}, material {}, deadline {:?}ms",
            game.position.side_to_move(),
            game.material_score,
            self.clock.time_to_deadline()
        );

        let iterations = AtomicU64::new(0);
        let max_depth = AtomicU32::new(0);
        let eval_calls = AtomicU64::new(0);
        let eval_failures = AtomicU64::new(0);

        let threads = self.options.search_threads.max(1);
        std::thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| {
                    self.worker(
                        limits,
                        evaluator,
                        &iterations,
                        &max_depth,
                        &eval_calls,
                        &eval_failures,
                    )
                });
            }

            // Driver loop: supervise the deadline and feed progress back.
            let mut last_q: Option<f32> = None;
            while !self.stop.load(Ordering::Acquire) {
                let expired = self.clock.wait_deadline(DRIVER_TICK);
                if self.stop.load(Ordering::Acquire) {
                    break;
                }
                if expired && iterations.load(Ordering::Relaxed) >= u64::from(MINIMUM_DEPTH) {
                    self.stop.store(true, Ordering::Release);
                    break;
                }
                let info = self.progress_info(&max_depth, &mut last_q);
                self.clock.update_deadline(info, true);
            }
        });
        self.clock.deactivate();

        let result = self.extract_result(&game, &iterations, &max_depth, &eval_calls, &eval_failures);
        log::info!(
            "search finished: best {:?}, value {:.3}, {} iterations, depth {}",
            result.best_move.as_ref().map(|m| m.to_string()),
            result.value,
            result.stats.iterations,
            result.stats.max_depth
        );
        result
    }

    fn worker<E>(
        &self,
        limits: &SearchLimits,
        evaluator: &E,
        iterations: &AtomicU64,
        max_depth: &AtomicU32,
        eval_calls: &AtomicU64,
        eval_failures: &AtomicU64,
    ) where
        E: Evaluator<P>,
    {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return;
            }
            let done = iterations.load(Ordering::Relaxed);
            if let Some(limit) = limits.max_iterations {
                if done >= limit {
                    self.stop.store(true, Ordering::Release);
                    return;
                }
            }
            if self.clock.has_expired() && done >= u64::from(MINIMUM_DEPTH) {
                self.stop.store(true, Ordering::Release);
                return;
            }

            let report = self.step(evaluator, max_depth, eval_calls, eval_failures);
            if report.completed {
                iterations.fetch_add(1, Ordering::Relaxed);
            }
            if report.halt {
                self.stop.store(true, Ordering::Release);
                return;
            }
        }
    }

    /// One search iteration: locked descent, optional evaluation outside the
    /// lock, locked apply.
    fn step<E>(
        &self,
        evaluator: &E,
        max_depth: &AtomicU32,
        eval_calls: &AtomicU64,
        eval_failures: &AtomicU64,
    ) -> StepReport
    where
        E: Evaluator<P>,
    {
        let descent = {
            let mut shared = self.shared.lock();
            let TreeState { cache, tree } = &mut *shared;
            let Some(root) = tree.root() else {
                return StepReport {
                    completed: false,
                    halt: true,
                };
            };
            self.descend(cache, root)
        };

        match descent {
            Descent::Backed { halt } => StepReport {
                completed: true,
                halt,
            },
            Descent::Exhausted => {
                log::warn!("node arena exhausted; stopping search");
                StepReport {
                    completed: false,
                    halt: true,
                }
            }
            Descent::NeedsEval {
                leaf,
                position,
                moves,
                depth,
            } => {
                max_depth.fetch_max(depth, Ordering::Relaxed);
                eval_calls.fetch_add(1, Ordering::Relaxed);
                let evaluation = evaluator.evaluate(&position, &moves);

                let mut shared = self.shared.lock();
                let TreeState { cache, tree } = &mut *shared;
                match evaluation {
                    Ok(eval) => {
                        let Some(hash) = cache.node(leaf).hash() else {
                            node::revert_virtual_loss(cache, leaf);
                            return StepReport {
                                completed: false,
                                halt: true,
                            };
                        };
                        match cache.store_evaluation(hash, eval.priors, eval.value) {
                            Ok(value) => {
                                node::backup(cache, leaf, value);
                                let halt = tree
                                    .root()
                                    .is_some_and(|r| cache.node(r).is_exact());
                                StepReport {
                                    completed: true,
                                    halt,
                                }
                            }
                            Err(e) => {
                                log::warn!("rejected evaluation: {e}");
                                eval_failures.fetch_add(1, Ordering::Relaxed);
                                node::revert_virtual_loss(cache, leaf);
                                StepReport {
                                    completed: false,
                                    halt: false,
                                }
                            }
                        }
                    }
                    Err(e) => {
                        // Local failure: abort this iteration, leave the leaf
                        // unexpanded, release the path, keep searching.
                        log::warn!("evaluator failed: {e}");
                        eval_failures.fetch_add(1, Ordering::Relaxed);
                        node::revert_virtual_loss(cache, leaf);
                        StepReport {
                            completed: false,
                            halt: false,
                        }
                    }
                }
            }
        }
    }

    /// Walk from the root to a leaf under the tree lock, applying virtual
    /// loss along the way. Expansion happens in-line from cached priors and
    /// selection continues into a fresh child, so the evaluator is only ever
    /// needed at first-visit leaves.
    fn descend(&self, cache: &mut Cache<P>, root: NodeId) -> Descent<P> {
        let c_puct = self.options.c_puct;
        let virtual_loss = self.options.virtual_loss;

        let mut id = root;
        let mut depth = 0u32;
        cache.node_mut(id).virtual_loss += 1;

        loop {
            if let Some(value) = cache.node(id).proven_value() {
                node::backup(cache, id, value);
                node::propagate_exact(cache, id);
                let halt = cache.node(root).is_exact();
                return Descent::Backed { halt };
            }

            let Some(hash) = cache.node(id).hash() else {
                node::revert_virtual_loss(cache, id);
                log::error!("reached an unbound node during selection");
                return Descent::Backed { halt: true };
            };

            if cache.node(id).visits() == 0 {
                // First visit: static evaluation, reusing the entry's cached
                // result when another path already paid for it.
                let entry = match cache.position(hash) {
                    Some(entry) => entry,
                    None => {
                        node::revert_virtual_loss(cache, id);
                        log::error!("node bound to a missing position entry");
                        return Descent::Backed { halt: true };
                    }
                };
                if let Some(value) = entry.static_value() {
                    node::backup(cache, id, value);
                    return Descent::Backed { halt: false };
                }
                let position = entry.position().clone();
                let moves = entry.moves().to_vec();
                return Descent::NeedsEval {
                    leaf: id,
                    position,
                    moves,
                    depth,
                };
            }

            if !cache.node(id).is_expanded() {
                match node::expand(cache, id) {
                    Ok(()) => {}
                    Err(SearchError::ArenaExhausted) => {
                        // Finish the in-flight iteration on the static value,
                        // then wind the search down.
                        let value = cache
                            .position(hash)
                            .and_then(|e| e.static_value())
                            .unwrap_or(0.0);
                        node::backup(cache, id, value);
                        return Descent::Backed { halt: true };
                    }
                    Err(e) => {
                        log::error!("expansion failed: {e}");
                        node::revert_virtual_loss(cache, id);
                        return Descent::Backed { halt: true };
                    }
                }
            }

            let Some(child) = node::select_child(cache, id, c_puct, virtual_loss) else {
                log::error!("expanded node has no selectable child");
                node::revert_virtual_loss(cache, id);
                return Descent::Backed { halt: true };
            };
            if cache.node(child).hash().is_none() && cache.bind_child(child).is_err() {
                // No room for the child's position entry.
                node::revert_virtual_loss(cache, id);
                return Descent::Exhausted;
            }
            cache.node_mut(child).virtual_loss += 1;
            id = child;
            depth += 1;
        }
    }

    /// Best-child telemetry for the clock: evaluation trend and search depth.
    fn progress_info(&self, max_depth: &AtomicU32, last_q: &mut Option<f32>) -> SearchInfo {
        let depth = max_depth.load(Ordering::Relaxed);
        let shared = self.shared.lock();
        let TreeState { cache, tree } = &*shared;

        let q = tree
            .root()
            .and_then(|root| best_child(cache, root))
            .map(|id| cache.node(id).q());
        drop(shared);

        let Some(q) = q else {
            return SearchInfo {
                depth,
                trend: Trend::Same,
                trend_degree: 0.0,
            };
        };
        let (trend, degree) = match *last_q {
            None => (Trend::Same, 0.0),
            Some(prev) => {
                let delta = q - prev;
                let trend = if delta > TREND_EPSILON {
                    Trend::Better
                } else if delta < -TREND_EPSILON {
                    Trend::Worse
                } else {
                    Trend::Same
                };
                (trend, delta.abs().min(1.0))
            }
        };
        *last_q = Some(q);
        SearchInfo {
            depth,
            trend,
            trend_degree: degree,
        }
    }

    fn extract_result(
        &self,
        game: &GameSnapshot<P>,
        iterations: &AtomicU64,
        max_depth: &AtomicU32,
        eval_calls: &AtomicU64,
        eval_failures: &AtomicU64,
    ) -> SearchResult<P::Move> {
        let shared = self.shared.lock();
        let TreeState { cache, tree } = &*shared;

        let (hits, misses) = cache.probe_stats();
        let stats = SearchStats {
            iterations: iterations.load(Ordering::Relaxed),
            max_depth: max_depth.load(Ordering::Relaxed),
            eval_calls: eval_calls.load(Ordering::Relaxed),
            eval_failures: eval_failures.load(Ordering::Relaxed),
            nodes_used: cache.used(),
            cache_hits: hits,
            cache_misses: misses,
        };

        let Some(root) = tree.root() else {
            let mut result = self.fallback_result(game);
            result.stats = stats;
            return result;
        };
        let root_node = cache.node(root);

        // A proven win must be played out: prefer a proven-winning child.
        let chosen = if root_node.proven_value() == Some(1.0) {
            root_node
                .children()
                .iter()
                .copied()
                .filter(|&c| cache.node(c).proven_value() == Some(-1.0))
                .max_by_key(|&c| cache.node(c).visits())
        } else {
            best_child(cache, root)
        };

        let (best_move, value) = match chosen {
            Some(id) => {
                let chosen_node = cache.node(id);
                let value = root_node.proven_value().unwrap_or_else(|| chosen_node.q());
                (chosen_node.last_move().copied(), value)
            }
            None => {
                // Nothing was visited in time; fall back to the priors, then
                // to the first legal move.
                let fallback = root_node
                    .children()
                    .iter()
                    .copied()
                    .max_by(|&a, &b| {
                        let pa = cache.node(a).prior().unwrap_or(0.0);
                        let pb = cache.node(b).prior().unwrap_or(0.0);
                        pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .and_then(|id| cache.node(id).last_move().copied())
                    .or_else(|| {
                        root_node
                            .hash()
                            .and_then(|h| cache.position(h))
                            .and_then(|e| e.moves().first().copied())
                    });
                (fallback, 0.0)
            }
        };

        let pv = principal_variation(cache, root);
        SearchResult {
            best_move,
            value,
            pv,
            stats,
        }
    }

    /// No tree to speak of: pick any legal move of the game position.
    fn fallback_result(&self, game: &GameSnapshot<P>) -> SearchResult<P::Move> {
        SearchResult {
            best_move: game.position.legal_moves().into_iter().next(),
            value: 0.0,
            pv: Vec::new(),
            stats: SearchStats::default(),
        }
    }
}

/// Highest-visit child; ties go to the higher Q, then the higher prior,
/// then the lower index.
fn best_child<P: Position>(cache: &Cache<P>, parent: NodeId) -> Option<NodeId> {
    let mut best: Option<NodeId> = None;
    for &cid in cache.node(parent).children() {
        let child = cache.node(cid);
        if child.visits() == 0 {
            continue;
        }
        match best {
            None => best = Some(cid),
            Some(bid) => {
                let b = cache.node(bid);
                let better = child.visits() > b.visits()
                    || (child.visits() == b.visits() && child.q() > b.q())
                    || (child.visits() == b.visits()
                        && child.q() == b.q()
                        && child.prior().unwrap_or(0.0) > b.prior().unwrap_or(0.0));
                if better {
                    best = Some(cid);
                }
            }
        }
    }
    best
}

/// Greedy max-visit descent from the root.
fn principal_variation<P: Position>(cache: &Cache<P>, root: NodeId) -> Vec<P::Move> {
    let mut pv = Vec::new();
    let mut id = root;
    while let Some(next) = best_child(cache, id) {
        match cache.node(next).last_move() {
            Some(mv) => pv.push(*mv),
            None => break,
        }
        id = next;
    }
    pv
}
