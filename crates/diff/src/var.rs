//! # Scalar Handles
//!
//! [`Var`] is a copyable handle to a node in a [`Graph`]. Arithmetic on
//! handles records new nodes:
//!
//! - `+`, `-`, `*` and unary `-` are total and return a `Var` directly
//! - `/` can divide by zero and returns `Result<Var, GraphError>`
//! - `f64` literals may appear on either side of a binary operator; they are
//!   added to the graph as constants
//!
//! Every application creates a new node. Rebinding a name
//! (`let c = c + 1.0;`) never mutates the node other expressions still use.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use petgraph::graph::NodeIndex;
use regrad_core::{Op, OpKind};

use crate::error::GraphError;
use crate::graph::{Graph, NodeState};

/// Handle to a scalar node.
#[derive(Clone, Copy)]
pub struct Var<'g> {
    graph: &'g Graph,
    index: NodeIndex,
}

impl<'g> Var<'g> {
    pub(crate) fn new(graph: &'g Graph, index: NodeIndex) -> Self {
        Self { graph, index }
    }

    pub(crate) fn belongs_to(&self, graph: &Graph) -> bool {
        std::ptr::eq(self.graph, graph)
    }

    /// The graph this node lives in.
    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Stable handle of this node within its graph.
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Forward value. Always defined.
    pub fn value(&self) -> f64 {
        self.graph.value(self.index)
    }

    /// Accumulated gradient.
    ///
    /// Fails with [`GraphError::GradientUnset`] until backward reaches this
    /// node, after [`Var::zero_grad`], and on computed nodes once backward has
    /// released them.
    pub fn grad(&self) -> Result<f64, GraphError> {
        self.graph.grad(self.index)
    }

    pub fn requires_grad(&self) -> bool {
        self.graph.requires_grad(self.index)
    }

    /// Whether the node has no producing operation (released nodes included).
    pub fn is_leaf(&self) -> bool {
        self.graph.is_leaf(self.index)
    }

    pub fn state(&self) -> NodeState {
        self.graph.state(self.index)
    }

    /// Kind of the producing operation, if the node is computed.
    pub fn op_kind(&self) -> Option<OpKind> {
        self.graph.op_kind(self.index)
    }

    /// Named parameters of the producing operation.
    pub fn op_params(&self) -> Vec<(&'static str, f64)> {
        self.graph.op_params(self.index)
    }

    /// Operand nodes of the producing operation, in call order.
    pub fn operands(&self) -> Vec<Var<'g>> {
        self.graph
            .operands(self.index)
            .into_iter()
            .map(|index| Var::new(self.graph, index))
            .collect()
    }

    /// Replace a leaf's value, e.g. for a parameter update between passes.
    pub fn set_value(&self, value: f64) -> Result<(), GraphError> {
        self.graph.set_value(self.index, value)
    }

    /// Reset a leaf's gradient to unset.
    pub fn zero_grad(&self) -> Result<(), GraphError> {
        self.graph.zero_grad_node(self.index)
    }

    /// Run backward from this node with seed `1.0`.
    pub fn backward(&self) -> Result<(), GraphError> {
        self.backward_with(1.0)
    }

    /// Run backward from this node with an explicit seed gradient.
    pub fn backward_with(&self, seed: f64) -> Result<(), GraphError> {
        self.graph.backward_from(self.index, seed)
    }

    // ------------------------------------------------------------------------
    // Unary operations
    // ------------------------------------------------------------------------

    /// `self^exponent`. Fails for `0^p` with `p < 0` or `0 < p < 1`, and for
    /// a negative base with a non-integer exponent.
    pub fn pow(self, exponent: f64) -> Result<Var<'g>, GraphError> {
        self.graph.apply(Op::pow(exponent), &[self])
    }

    pub fn exp(self) -> Var<'g> {
        self.total(OpKind::Exp, &[self])
    }

    /// Natural logarithm. Fails for non-positive values.
    pub fn log(self) -> Result<Var<'g>, GraphError> {
        self.graph.apply(Op::new(OpKind::Log), &[self])
    }

    /// Square root. Fails for non-positive values.
    pub fn sqrt(self) -> Result<Var<'g>, GraphError> {
        self.graph.apply(Op::new(OpKind::Sqrt), &[self])
    }

    pub fn sin(self) -> Var<'g> {
        self.total(OpKind::Sin, &[self])
    }

    pub fn cos(self) -> Var<'g> {
        self.total(OpKind::Cos, &[self])
    }

    pub fn tanh(self) -> Var<'g> {
        self.total(OpKind::Tanh, &[self])
    }

    pub fn relu(self) -> Var<'g> {
        self.total(OpKind::Relu, &[self])
    }

    /// Apply an operation whose forward rule accepts every input. The only
    /// failure left is the mixed-graph panic inside [`Graph::apply`].
    fn total(self, kind: OpKind, operands: &[Var<'g>]) -> Var<'g> {
        debug_assert!(!kind.is_partial());
        self.graph
            .apply(Op::new(kind), operands)
            .expect("total operation rejected its operands")
    }

    fn lift(self, value: f64) -> Var<'g> {
        self.graph.constant(value)
    }

    /// Apply a fallible binary operation to `self` and a lifted scalar. The
    /// scalar's constant node is discarded again if forward fails.
    fn apply_with_scalar(
        self,
        op: Op,
        scalar: f64,
        scalar_first: bool,
    ) -> Result<Var<'g>, GraphError> {
        let lifted = self.lift(scalar);
        let operands = if scalar_first {
            [lifted, self]
        } else {
            [self, lifted]
        };
        self.graph.apply(op, &operands).map_err(|err| {
            self.graph.discard_last(lifted.index);
            err
        })
    }
}

impl PartialEq for Var<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.graph, other.graph) && self.index == other.index
    }
}

impl Eq for Var<'_> {}

impl fmt::Debug for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("index", &self.index.index())
            .field("value", &self.value())
            .finish()
    }
}

impl fmt::Display for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value(), f)
    }
}

// -----------------------------------------------------------------------------
// std::ops — x + y, x - y, x * y, -x (total) and x / y (fallible)
// -----------------------------------------------------------------------------

macro_rules! impl_total_binary {
    ($trait:ident, $method:ident, $kind:expr) => {
        impl<'g> $trait for Var<'g> {
            type Output = Var<'g>;

            /// # Panics
            ///
            /// Panics if the operands belong to different graphs.
            fn $method(self, rhs: Var<'g>) -> Var<'g> {
                self.total($kind, &[self, rhs])
            }
        }

        impl<'g> $trait<f64> for Var<'g> {
            type Output = Var<'g>;

            fn $method(self, rhs: f64) -> Var<'g> {
                self.total($kind, &[self, self.lift(rhs)])
            }
        }

        impl<'g> $trait<Var<'g>> for f64 {
            type Output = Var<'g>;

            fn $method(self, rhs: Var<'g>) -> Var<'g> {
                rhs.total($kind, &[rhs.lift(self), rhs])
            }
        }
    };
}

impl_total_binary!(Add, add, OpKind::Add);
impl_total_binary!(Sub, sub, OpKind::Sub);
impl_total_binary!(Mul, mul, OpKind::Mul);

impl<'g> Neg for Var<'g> {
    type Output = Var<'g>;

    fn neg(self) -> Var<'g> {
        self.total(OpKind::Neg, &[self])
    }
}

impl<'g> Div for Var<'g> {
    type Output = Result<Var<'g>, GraphError>;

    /// # Panics
    ///
    /// Panics if the operands belong to different graphs.
    fn div(self, rhs: Var<'g>) -> Self::Output {
        self.graph.apply(Op::new(OpKind::Div), &[self, rhs])
    }
}

impl<'g> Div<f64> for Var<'g> {
    type Output = Result<Var<'g>, GraphError>;

    fn div(self, rhs: f64) -> Self::Output {
        self.apply_with_scalar(Op::new(OpKind::Div), rhs, false)
    }
}

impl<'g> Div<Var<'g>> for f64 {
    type Output = Result<Var<'g>, GraphError>;

    fn div(self, rhs: Var<'g>) -> Self::Output {
        rhs.apply_with_scalar(Op::new(OpKind::Div), self, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrad_core::OpError;

    #[test]
    fn test_operators_evaluate_eagerly() {
        let graph = Graph::new();
        let a = graph.var(6.0);
        let b = graph.var(4.0);

        assert_eq!((a + b).value(), 10.0);
        assert_eq!((a - b).value(), 2.0);
        assert_eq!((a * b).value(), 24.0);
        assert_eq!((a / b).unwrap().value(), 1.5);
        assert_eq!((-a).value(), -6.0);
    }

    #[test]
    fn test_scalar_on_either_side() {
        let graph = Graph::new();
        let x = graph.var(4.0);

        assert_eq!((x + 1.0).value(), 5.0);
        assert_eq!((1.0 + x).value(), 5.0);
        assert_eq!((x - 1.0).value(), 3.0);
        assert_eq!((1.0 - x).value(), -3.0);
        assert_eq!((x * 2.0).value(), 8.0);
        assert_eq!((2.0 * x).value(), 8.0);
        assert_eq!((x / 2.0).unwrap().value(), 2.0);
        assert_eq!((2.0 / x).unwrap().value(), 0.5);
    }

    #[test]
    fn test_reflected_operand_order() {
        let graph = Graph::new();
        let x = graph.var(4.0);
        let y = 1.0 - x;

        let operands = y.operands();
        assert_eq!(operands.len(), 2);
        assert_eq!(operands[0].value(), 1.0);
        assert!(!operands[0].requires_grad());
        assert_eq!(operands[1], x);
    }

    #[test]
    fn test_methods() {
        let graph = Graph::new();
        let x = graph.var(0.5);

        assert_eq!(x.exp().value(), 0.5_f64.exp());
        assert_eq!(x.log().unwrap().value(), 0.5_f64.ln());
        assert_eq!(x.sqrt().unwrap().value(), 0.5_f64.sqrt());
        assert_eq!(x.sin().value(), 0.5_f64.sin());
        assert_eq!(x.cos().value(), 0.5_f64.cos());
        assert_eq!(x.tanh().value(), 0.5_f64.tanh());
        assert_eq!(x.pow(2.0).unwrap().value(), 0.25);
        assert_eq!((-x).relu().value(), 0.0);
    }

    #[test]
    fn test_fallible_operations_report_domain_errors() {
        let graph = Graph::new();
        let zero = graph.var(0.0);
        let negative = graph.var(-1.0);

        for result in [
            graph.var(1.0) / zero,
            1.0 / zero,
            zero.log(),
            negative.sqrt(),
            zero.pow(-2.0),
            negative.pow(0.5),
        ] {
            assert!(matches!(result, Err(GraphError::Op(OpError::Domain { .. }))));
        }
    }

    #[test]
    fn test_failed_scalar_division_adds_no_node() {
        let graph = Graph::new();
        let x = graph.var(3.0);
        let zero = graph.var(0.0);
        let before = graph.len();

        assert!((x / 0.0).is_err());
        assert!((1.0 / zero).is_err());
        assert_eq!(graph.len(), before);

        let y = (x / 2.0).unwrap();
        assert_eq!(graph.len(), before + 2);
        assert_eq!(y.operands()[1].value(), 2.0);
    }

    #[test]
    fn test_pow_zero_exponent_at_zero() {
        let graph = Graph::new();
        let x = graph.var(0.0);
        let y = x.pow(0.0).unwrap();
        y.backward().unwrap();

        assert_eq!(y.value(), 1.0);
        assert_eq!(x.grad().unwrap(), 0.0);
        assert!(matches!(
            x.pow(0.5),
            Err(GraphError::Op(OpError::Domain { .. }))
        ));
    }

    #[test]
    #[should_panic(expected = "different graph")]
    fn test_operators_across_graphs_panic() {
        let first = Graph::new();
        let second = Graph::new();
        let _ = first.var(1.0) * second.var(2.0);
    }

    #[test]
    fn test_rebinding_creates_new_nodes() {
        let graph = Graph::new();
        let c = graph.var(1.0);
        let original = c;
        let c = c + (c + 1.0);

        assert_ne!(c, original);
        assert_eq!(original.value(), 1.0);
        assert_eq!(c.value(), 3.0);
    }

    #[test]
    fn test_display_and_debug() {
        let graph = Graph::new();
        let x = graph.var(2.5);
        assert_eq!(x.to_string(), "2.5");
        assert_eq!(format!("{x:.3}"), "2.500");
        assert_eq!(format!("{x:?}"), "Var { index: 0, value: 2.5 }");
    }
}
