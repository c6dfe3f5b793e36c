//! # Diff - Scalar Reverse-Mode Autodiff
//!
//! This crate builds computation graphs from ordinary arithmetic on scalar
//! handles and differentiates them in a single reverse pass.
//!
//! ## Core Concepts
//!
//! - **Graphs are arenas** — nodes are addressed by stable handles, shared
//!   operands are shared indices
//! - **Forward is eager** — every operator evaluates immediately and records
//!   one node
//! - **Backward runs once per root** — gradients flow in reverse topological
//!   order and computed nodes are released behind them
//!
//! ## Modules
//!
//! - [`graph`] — the node arena and operation application
//! - [`var`] — copyable handles with operator overloading
//! - [`backward`] — reverse-mode gradient propagation
//! - [`check`] — numerical gradient checking
//! - [`error`] — graph and gradient-check errors
//!
//! ## Example
//!
//! ```rust
//! use regrad_diff::Graph;
//!
//! let graph = Graph::new();
//! let a = graph.var(3.0);
//! let y = a.log()?;
//!
//! y.backward()?;
//! assert_eq!(y.value(), 3.0_f64.ln());
//! assert!((a.grad()? - 1.0 / 3.0).abs() < 1e-12);
//! # Ok::<(), regrad_diff::GraphError>(())
//! ```

pub mod backward;
pub mod check;
pub mod error;
pub mod graph;
pub mod var;

// Re-export key types
pub use error::{GradCheckError, GraphError};
pub use graph::{Graph, NodeState};
pub use regrad_core::{GradCheckConfig, GraphConfig, Op, OpError, OpKind};
pub use var::Var;
