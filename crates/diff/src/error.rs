//! Error types for graph construction and differentiation.

use regrad_core::{ConfigError, OpError};
use thiserror::Error;

/// Errors raised by the graph engine.
///
/// Apart from [`GraphError::Op`] domain errors, every variant is a contract
/// violation by the caller.
#[derive(Debug, Error)]
pub enum GraphError {
    /// An operation rejected its operands, or its backward rule was misused.
    #[error(transparent)]
    Op(#[from] OpError),

    /// Backward was requested from a node that does not track gradients.
    #[error("node {node} does not require gradients")]
    NotTracked { node: usize },

    /// Backward was requested from a node whose gradient is already set.
    #[error("node {node} already holds a gradient; backward cannot run twice")]
    GradientAlreadySet { node: usize },

    /// Backward was requested from a node it already propagated through.
    #[error("node {node} was released by a previous backward pass")]
    Released { node: usize },

    /// A gradient was read before backward reached the node.
    #[error("node {node} has no gradient")]
    GradientUnset { node: usize },

    /// A leaf-only operation was applied to a computed node.
    #[error("node {node} is not a leaf")]
    NotALeaf { node: usize },

    /// Invalid graph configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors from comparing analytic and numerical gradients.
#[derive(Debug, Error)]
pub enum GradCheckError {
    /// Building or differentiating the expression failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Analytic and numerical gradients disagree beyond tolerance.
    #[error(
        "gradient mismatch at input {input}: analytic={analytic}, numerical={numerical}, diff={diff}"
    )]
    Mismatch {
        input: usize,
        analytic: f64,
        numerical: f64,
        diff: f64,
    },
}
