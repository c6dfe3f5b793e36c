//! # Configuration
//!
//! Settings for graph construction and numerical gradient checking.
//!
//! Both structs deserialize from JSON with every field optional; missing
//! fields take their defaults:
//!
//! ```rust
//! use regrad_core::config::GraphConfig;
//!
//! let config = GraphConfig::from_json(r#"{ "fold_constants": false }"#).unwrap();
//! assert!(!config.fold_constants);
//! assert_eq!(config.node_capacity, GraphConfig::default().node_capacity);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest accepted initial arena reservation, in nodes. Graphs still grow
/// past it on demand.
pub const MAX_NODE_CAPACITY: usize = 1 << 24;

/// Graph construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Collapse operations whose operands are all constants into a plain
    /// constant node instead of recording the operation.
    pub fold_constants: bool,
    /// Initial node capacity of the graph arena.
    pub node_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            fold_constants: true,
            node_capacity: 64,
        }
    }
}

impl GraphConfig {
    /// Parse from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// `node_capacity` must not exceed [`MAX_NODE_CAPACITY`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_capacity > MAX_NODE_CAPACITY {
            return Err(ConfigError::Validation {
                field: "node_capacity",
                reason: format!(
                    "must be at most {MAX_NODE_CAPACITY}, got {}",
                    self.node_capacity
                ),
            });
        }
        Ok(())
    }
}

/// Central-difference settings for comparing analytic and numerical gradients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradCheckConfig {
    /// Half-width `h` of the central difference `(f(x+h) - f(x-h)) / 2h`.
    pub step: f64,
    /// Largest accepted absolute and relative difference.
    pub tolerance: f64,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        Self {
            step: 1e-6,
            tolerance: 1e-6,
        }
    }
}

impl GradCheckConfig {
    /// Parse from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Both `step` and `tolerance` must be finite and strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(ConfigError::Validation {
                field: "step",
                reason: format!("must be finite and positive, got {}", self.step),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::Validation {
                field: "tolerance",
                reason: format!("must be finite and positive, got {}", self.tolerance),
            });
        }
        Ok(())
    }
}
