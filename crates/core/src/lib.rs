//! # Core - Scalar Operation Registry
//!
//! This crate provides the leaf layer of the regrad autodiff engine:
//!
//! - **Operations**: the closed set of scalar operations, each with a paired
//!   forward and backward rule ([`ops`])
//! - **Errors**: domain errors and contract violations ([`error`])
//! - **Configuration**: graph and gradient-check settings ([`config`])
//!
//! The graph engine in `regrad-diff` records one [`Op`] per operator
//! application and replays their backward rules in reverse order.

pub mod config;
pub mod error;
pub mod ops;

// Re-export key types at crate root for convenience
pub use config::{GradCheckConfig, GraphConfig, MAX_NODE_CAPACITY};
pub use error::{ConfigError, OpError};
pub use ops::{Op, OpKind};
