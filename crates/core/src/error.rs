//! # Error Types
//!
//! Errors raised by the operation registry fall into two groups:
//!
//! - **Domain errors**: an operation was applied to values outside its
//!   mathematical domain (`x / 0`, `ln(-1)`). These are reported at the
//!   moment of forward application, never deferred to backward.
//! - **Contract violations**: the registry was driven out of order, e.g.
//!   backward without a matching forward. These are usage bugs.

use thiserror::Error;

use crate::ops::OpKind;

/// Errors produced by forward or backward evaluation of an [`Op`](crate::Op).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OpError {
    /// Operand lies outside the operation's domain.
    #[error("{op}: domain error: {reason}")]
    Domain { op: OpKind, reason: String },

    /// Wrong number of operands for the operation.
    #[error("{op} expects {expected} operand(s), got {got}")]
    Arity {
        op: OpKind,
        expected: usize,
        got: usize,
    },

    /// A required named parameter was never supplied.
    #[error("{op} requires parameter `{name}`")]
    MissingParameter { op: OpKind, name: &'static str },

    /// Backward was called without a preceding forward on the same instance,
    /// or the cached forward state was already consumed.
    #[error("{op}: backward called without cached forward state")]
    MissingForwardState { op: OpKind },
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A field holds a value outside its accepted range.
    #[error("invalid `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },
}
