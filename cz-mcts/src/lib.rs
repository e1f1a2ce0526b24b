//! cz-mcts: neural-guided MCTS search core.
//!
//! The pieces, leaves first:
//! - `zobrist`: 64-bit position hashing for the transposition cache
//! - `cache`: fixed-capacity node arena + shared position entries
//! - `node`: search primitives (PUCT selection, expansion, backup, proofs)
//! - `tree`: root lifecycle and reuse across searches
//! - `clock`: per-move deadline computation
//! - `eval`: neural evaluator boundary
//! - `search`: the driver that ties them together

pub mod cache;
pub mod clock;
pub mod eval;
pub mod node;
pub mod search;
pub mod tree;
pub mod zobrist;

pub use cache::{Cache, NodePosition, SearchError};
pub use clock::{Clock, SearchInfo, Trend, MINIMUM_DEPTH};
pub use eval::{EvalError, Evaluation, Evaluator, UniformEvaluator};
pub use node::{Node, NodeId};
pub use search::{Search, SearchResult, SearchStats};
pub use tree::Tree;
pub use zobrist::ZobristTable;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}

#[cfg(test)]
mod clock_tests;
#[cfg(test)]
mod node_tests;
