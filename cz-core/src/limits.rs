//! Per-search time controls and budgets.

use crate::position::Color;

/// Time controls and budgets for a single search invocation.
///
/// `None` means the control is not in effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchLimits {
    pub white_time_ms: Option<i64>,
    pub white_increment_ms: Option<i64>,
    pub black_time_ms: Option<i64>,
    pub black_increment_ms: Option<i64>,
    /// Fixed per-move time override.
    pub move_time_ms: Option<i64>,
    /// Search until stopped externally.
    pub infinite: bool,
    /// Cap on completed iterations (useful for tests and tools).
    pub max_iterations: Option<u64>,
}

impl SearchLimits {
    pub fn infinite() -> Self {
        Self {
            infinite: true,
            ..Self::default()
        }
    }

    pub fn move_time(ms: i64) -> Self {
        Self {
            move_time_ms: Some(ms),
            ..Self::default()
        }
    }

    pub fn iterations(n: u64) -> Self {
        Self {
            max_iterations: Some(n),
            ..Self::default()
        }
    }

    pub fn time(&self, side: Color) -> Option<i64> {
        match side {
            Color::White => self.white_time_ms,
            Color::Black => self.black_time_ms,
        }
    }

    pub fn increment(&self, side: Color) -> Option<i64> {
        match side {
            Color::White => self.white_increment_ms,
            Color::Black => self.black_increment_ms,
        }
    }
}
