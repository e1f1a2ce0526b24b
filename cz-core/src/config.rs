//! Search configuration.
//!
//! Two front doors: a typed struct loadable from YAML, and the string-keyed
//! `set` used by text-protocol front-ends (`setoption`-style).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown option {name:?}")]
    UnknownOption { name: String },
    #[error("invalid value {value:?} for option {name:?}")]
    InvalidValue { name: String, value: String },
}

/// Shape of the deadline easing curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingCurve {
    /// Identity: spend time proportionally to the remaining budget.
    #[default]
    Linear,
    /// `0.5*sin(pi*x) + 0.5`, weighting the middle game.
    Sine,
}

impl EasingCurve {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            EasingCurve::Linear => x,
            EasingCurve::Sine => (std::f64::consts::PI * x).sin() * 0.5 + 0.5,
        }
    }
}

/// All options the search core recognizes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchOptions {
    /// Safety margin (ms) subtracted from allotted time.
    #[serde(default = "default_move_overhead")]
    pub move_overhead_ms: i64,
    /// PUCT exploration constant.
    #[serde(default = "default_c_puct")]
    pub c_puct: f32,
    /// Virtual visits applied to an in-flight path.
    #[serde(default = "default_virtual_loss")]
    pub virtual_loss: u32,
    /// Try to re-root onto the previous search tree at the next search.
    #[serde(default = "default_resume")]
    pub resume_previous_position: bool,
    /// Add the accumulated trend factor into the deadline sum.
    #[serde(default)]
    pub enable_trend_factor: bool,
    #[serde(default)]
    pub easing_curve: EasingCurve,
    /// Worker threads sharing the tree.
    #[serde(default = "default_search_threads")]
    pub search_threads: usize,
    /// Node arena capacity.
    #[serde(default = "default_cache_nodes")]
    pub cache_nodes: usize,
}

fn default_move_overhead() -> i64 {
    100
}

fn default_c_puct() -> f32 {
    2.5
}

fn default_virtual_loss() -> u32 {
    1
}

fn default_resume() -> bool {
    true
}

fn default_search_threads() -> usize {
    1
}

fn default_cache_nodes() -> usize {
    2_000_000
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            move_overhead_ms: default_move_overhead(),
            c_puct: default_c_puct(),
            virtual_loss: default_virtual_loss(),
            resume_previous_position: default_resume(),
            enable_trend_factor: false,
            easing_curve: EasingCurve::default(),
            search_threads: default_search_threads(),
            cache_nodes: default_cache_nodes(),
        }
    }
}

impl SearchOptions {
    /// Load options from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Load options from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply one option by its protocol name.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        };
        match name {
            "MoveOverhead" => self.move_overhead_ms = value.parse().map_err(|_| invalid())?,
            "CPuct" => {
                let v: f32 = value.parse().map_err(|_| invalid())?;
                if !(v.is_finite() && v > 0.0) {
                    return Err(invalid());
                }
                self.c_puct = v;
            }
            "VirtualLoss" => self.virtual_loss = value.parse().map_err(|_| invalid())?,
            "ResumePreviousPosition" => {
                self.resume_previous_position = parse_bool(value).ok_or_else(invalid)?
            }
            "EnableTrendFactor" => {
                self.enable_trend_factor = parse_bool(value).ok_or_else(invalid)?
            }
            "EasingCurve" => {
                self.easing_curve = match value {
                    "linear" => EasingCurve::Linear,
                    "sine" => EasingCurve::Sine,
                    _ => return Err(invalid()),
                }
            }
            "SearchThreads" => {
                let v: usize = value.parse().map_err(|_| invalid())?;
                if v == 0 {
                    return Err(invalid());
                }
                self.search_threads = v;
            }
            "CacheNodes" => {
                let v: usize = value.parse().map_err(|_| invalid())?;
                if v == 0 {
                    return Err(invalid());
                }
                self.cache_nodes = v;
            }
            _ => {
                return Err(ConfigError::UnknownOption {
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}
