//! cz-core: interfaces toward the rules engine and game history, plus the
//! configuration layer shared by everything in the workspace.

pub mod config;
pub mod limits;
pub mod position;

pub use config::{ConfigError, EasingCurve, SearchOptions};
pub use limits::SearchLimits;
pub use position::{Color, GameSnapshot, History, Outcome, Position};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
