//! Neural evaluator boundary.

use cz_core::Position;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("evaluator backend failed: {msg}")]
    Backend { msg: String },
    #[error("evaluator timed out")]
    Timeout,
}

/// Policy priors and static value for one position.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// One prior per legal move, aligned with the slice passed to `evaluate`.
    pub priors: Vec<f32>,
    /// In [-1, 1], from the side-to-move's point of view.
    pub value: f32,
}

/// The network behind the search. Implementations may batch internally and
/// block; evaluator calls are the only suspension points in a worker.
pub trait Evaluator<P: Position> {
    fn evaluate(&self, position: &P, legal: &[P::Move]) -> Result<Evaluation, EvalError>;
}

/// Uniform priors + zero value (baseline stub).
pub struct UniformEvaluator;

impl<P: Position> Evaluator<P> for UniformEvaluator {
    fn evaluate(&self, _position: &P, legal: &[P::Move]) -> Result<Evaluation, EvalError> {
        let n = legal.len().max(1) as f32;
        Ok(Evaluation {
            priors: vec![1.0 / n; legal.len()],
            value: 0.0,
        })
    }
}
