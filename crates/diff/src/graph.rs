//! # Computation Graph
//!
//! A [`Graph`] is an arena of scalar nodes. Every operator application
//! evaluates its forward rule immediately and appends the result as a new
//! node, so the graph grows as a side effect of ordinary arithmetic.
//!
//! ## Key Concepts
//!
//! - **Handles, not pointers**: nodes are addressed by [`NodeIndex`]. A shared
//!   operand is simply the same index appearing under several consumers.
//! - **Edges point consumer → operand**, weighted by the operand's slot in the
//!   operation's argument list. Edges only point from newer to older nodes, so
//!   the graph is acyclic by construction.
//! - **Constant folding**: an operation whose operands are all constants is
//!   evaluated but not recorded.
//!
//! ## Example
//!
//! ```rust
//! use regrad_diff::Graph;
//!
//! let graph = Graph::new();
//! let x = graph.var(3.0);
//! let y = x * x + 1.0;
//! assert_eq!(y.value(), 10.0);
//!
//! y.backward().unwrap();
//! assert_eq!(x.grad().unwrap(), 6.0);
//! ```

use std::cell::RefCell;

use log::trace;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use regrad_core::{GraphConfig, Op, OpKind};

use crate::error::GraphError;
use crate::var::Var;

/// Where a node stands with respect to backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// No gradient has reached the node.
    Fresh,
    /// The node holds a gradient. Computed nodes leave this state once they
    /// distribute it; leaves keep it until reset.
    Accumulating,
    /// The node's gradient was distributed and its operation and operand
    /// edges were dropped. It behaves as a leaf from now on.
    Released,
}

/// A scalar node in the arena.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) value: f64,
    pub(crate) grad: Option<f64>,
    pub(crate) requires_grad: bool,
    /// The operation that produced this node; `None` for leaves.
    pub(crate) op: Option<Op>,
    pub(crate) state: NodeState,
}

impl Node {
    fn leaf(value: f64, requires_grad: bool) -> Self {
        Self {
            value,
            grad: None,
            requires_grad,
            op: None,
            state: NodeState::Fresh,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.op.is_none()
    }

    /// Add a gradient contribution. An unset gradient counts as zero.
    pub(crate) fn accumulate(&mut self, grad: f64) {
        self.grad = Some(self.grad.map_or(grad, |acc| acc + grad));
        if self.state == NodeState::Fresh {
            self.state = NodeState::Accumulating;
        }
    }
}

/// Edge weight: position of the target among the source's operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Operand {
    pub(crate) slot: usize,
}

/// The node arena.
pub(crate) type Dag = DiGraph<Node, Operand>;

/// A dynamically built scalar computation graph.
///
/// Handles ([`Var`]) borrow the graph, so every node of an expression lives
/// exactly as long as the graph that owns it. The graph is single-threaded.
#[derive(Debug)]
pub struct Graph {
    pub(crate) dag: RefCell<Dag>,
    config: GraphConfig,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::build(GraphConfig::default())
    }

    /// Create an empty graph with a validated configuration.
    pub fn with_config(config: GraphConfig) -> Result<Self, GraphError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: GraphConfig) -> Self {
        let capacity = config.node_capacity;
        Self {
            dag: RefCell::new(DiGraph::with_capacity(capacity, capacity.saturating_mul(2))),
            config,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Number of nodes ever added, released ones included.
    pub fn len(&self) -> usize {
        self.dag.borrow().node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a leaf that tracks gradients.
    pub fn var(&self, value: f64) -> Var<'_> {
        self.leaf(value, true)
    }

    /// Add a leaf that never receives a gradient.
    pub fn constant(&self, value: f64) -> Var<'_> {
        self.leaf(value, false)
    }

    /// Add a leaf node.
    pub fn leaf(&self, value: f64, requires_grad: bool) -> Var<'_> {
        let index = self.dag.borrow_mut().add_node(Node::leaf(value, requires_grad));
        Var::new(self, index)
    }

    /// Apply an operation to operand nodes, producing a new node.
    ///
    /// The forward rule runs immediately. On a domain error nothing is added
    /// to the graph. The result requires gradients if any operand does;
    /// otherwise it is folded into a constant unless
    /// [`GraphConfig::fold_constants`] is off.
    ///
    /// # Panics
    ///
    /// Panics if an operand belongs to another graph.
    pub fn apply<'g>(&'g self, mut op: Op, operands: &[Var<'g>]) -> Result<Var<'g>, GraphError> {
        assert!(
            operands.iter().all(|v| v.belongs_to(self)),
            "{} operand belongs to a different graph",
            op.kind()
        );

        let (inputs, requires_grad) = {
            let dag = self.dag.borrow();
            let inputs: Vec<f64> = operands.iter().map(|v| dag[v.index()].value).collect();
            let requires_grad = operands.iter().any(|v| dag[v.index()].requires_grad);
            (inputs, requires_grad)
        };

        let value = op.forward(&inputs)?;

        if !requires_grad && self.config.fold_constants {
            trace!("folded {} into constant {}", op, value);
            return Ok(self.constant(value));
        }

        let mut dag = self.dag.borrow_mut();
        let index = dag.add_node(Node {
            value,
            grad: None,
            requires_grad,
            op: Some(op),
            state: NodeState::Fresh,
        });
        for (slot, operand) in operands.iter().enumerate() {
            dag.add_edge(index, operand.index(), Operand { slot });
        }
        drop(dag);

        Ok(Var::new(self, index))
    }

    /// Reset the gradient of every leaf to unset.
    ///
    /// Call this between forward/backward cycles that reuse the same leaves;
    /// backward never clears leaf gradients itself.
    pub fn zero_grad(&self) {
        let mut dag = self.dag.borrow_mut();
        for node in dag.node_weights_mut().filter(|n| n.is_leaf()) {
            reset(node);
        }
    }

    // ------------------------------------------------------------------------
    // Node access for `Var`
    // ------------------------------------------------------------------------

    pub(crate) fn value(&self, index: NodeIndex) -> f64 {
        self.dag.borrow()[index].value
    }

    pub(crate) fn grad(&self, index: NodeIndex) -> Result<f64, GraphError> {
        self.dag.borrow()[index]
            .grad
            .ok_or(GraphError::GradientUnset {
                node: index.index(),
            })
    }

    pub(crate) fn requires_grad(&self, index: NodeIndex) -> bool {
        self.dag.borrow()[index].requires_grad
    }

    pub(crate) fn is_leaf(&self, index: NodeIndex) -> bool {
        self.dag.borrow()[index].is_leaf()
    }

    pub(crate) fn state(&self, index: NodeIndex) -> NodeState {
        self.dag.borrow()[index].state
    }

    pub(crate) fn op_kind(&self, index: NodeIndex) -> Option<OpKind> {
        self.dag.borrow()[index].op.as_ref().map(Op::kind)
    }

    pub(crate) fn op_params(&self, index: NodeIndex) -> Vec<(&'static str, f64)> {
        self.dag.borrow()[index]
            .op
            .as_ref()
            .map(Op::params)
            .unwrap_or_default()
    }

    /// Operands in call order.
    pub(crate) fn operands(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let dag = self.dag.borrow();
        let mut edges: Vec<(usize, NodeIndex)> = dag
            .edges_directed(index, Direction::Outgoing)
            .map(|e| (e.weight().slot, e.target()))
            .collect();
        edges.sort_by_key(|&(slot, _)| slot);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Remove the most recently added node, which nothing may reference yet.
    pub(crate) fn discard_last(&self, index: NodeIndex) {
        let mut dag = self.dag.borrow_mut();
        debug_assert_eq!(index.index() + 1, dag.node_count());
        debug_assert_eq!(dag.neighbors_undirected(index).count(), 0);
        dag.remove_node(index);
    }

    pub(crate) fn set_value(&self, index: NodeIndex, value: f64) -> Result<(), GraphError> {
        let mut dag = self.dag.borrow_mut();
        let node = &mut dag[index];
        if !node.is_leaf() {
            return Err(GraphError::NotALeaf {
                node: index.index(),
            });
        }
        node.value = value;
        Ok(())
    }

    pub(crate) fn zero_grad_node(&self, index: NodeIndex) -> Result<(), GraphError> {
        let mut dag = self.dag.borrow_mut();
        let node = &mut dag[index];
        if !node.is_leaf() {
            return Err(GraphError::NotALeaf {
                node: index.index(),
            });
        }
        reset(node);
        Ok(())
    }
}

fn reset(node: &mut Node) {
    node.grad = None;
    if node.state == NodeState::Accumulating {
        node.state = NodeState::Fresh;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrad_core::OpError;

    #[test]
    fn test_leaves() {
        let graph = Graph::new();
        let x = graph.var(2.0);
        let c = graph.constant(3.0);

        assert_eq!(graph.len(), 2);
        assert!(x.requires_grad());
        assert!(!c.requires_grad());
        assert!(x.is_leaf() && c.is_leaf());
        assert_eq!(x.op_kind(), None);
        assert_eq!(x.state(), NodeState::Fresh);
    }

    #[test]
    fn test_apply_records_operation_and_operands() {
        let graph = Graph::new();
        let a = graph.var(2.0);
        let b = graph.constant(5.0);
        let y = graph.apply(Op::new(OpKind::Sub), &[b, a]).unwrap();

        assert_eq!(y.value(), 3.0);
        assert!(y.requires_grad());
        assert!(!y.is_leaf());
        assert_eq!(y.op_kind(), Some(OpKind::Sub));
        assert_eq!(y.operands(), vec![b, a]);
    }

    #[test]
    fn test_operands_keep_call_order_when_shared() {
        let graph = Graph::new();
        let a = graph.var(2.0);
        let b = graph.var(7.0);
        let y = graph.apply(Op::new(OpKind::Div), &[b, a]).unwrap();
        let z = a * a;

        assert_eq!(y.operands(), vec![b, a]);
        assert_eq!(z.operands(), vec![a, a]);
    }

    #[test]
    fn test_pow_exposes_exponent() {
        let graph = Graph::new();
        let x = graph.var(2.0);
        let y = x.pow(3.0).unwrap();
        assert_eq!(y.op_params(), vec![("exponent", 3.0)]);
        assert!(x.op_params().is_empty());
    }

    #[test]
    fn test_constant_folding() {
        let graph = Graph::new();
        let a = graph.constant(2.0);
        let b = graph.constant(4.0);
        let y = (a * b + 1.0).tanh();

        assert!((y.value() - 9.0_f64.tanh()).abs() < 1e-12);
        assert!(y.is_leaf());
        assert!(!y.requires_grad());
        assert!(y.operands().is_empty());
    }

    #[test]
    fn test_folding_disabled_records_constant_operations() {
        let config = GraphConfig {
            fold_constants: false,
            ..GraphConfig::default()
        };
        let graph = Graph::with_config(config).unwrap();
        let a = graph.constant(2.0);
        let y = a * 3.0;

        assert_eq!(y.value(), 6.0);
        assert_eq!(y.op_kind(), Some(OpKind::Mul));
        assert!(!y.requires_grad());
    }

    #[test]
    fn test_with_config_rejects_oversized_capacity() {
        let config = GraphConfig {
            node_capacity: usize::MAX / 2 + 1,
            ..GraphConfig::default()
        };
        assert!(matches!(
            Graph::with_config(config),
            Err(GraphError::Config(_))
        ));
    }

    #[test]
    fn test_requires_grad_is_or_of_operands() {
        let graph = Graph::new();
        let x = graph.var(1.0);
        let c = graph.constant(2.0);

        assert!((x + c).requires_grad());
        assert!((c + x).requires_grad());
        assert!(!(c + c).requires_grad());
    }

    #[test]
    fn test_domain_error_adds_no_node() {
        let graph = Graph::new();
        let x = graph.var(0.0);
        let before = graph.len();

        let err = graph.apply(Op::new(OpKind::Log), &[x]).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Op(OpError::Domain {
                op: OpKind::Log,
                ..
            })
        ));
        assert_eq!(graph.len(), before);
        assert_eq!(x.state(), NodeState::Fresh);
    }

    #[test]
    fn test_arity_error_surfaces() {
        let graph = Graph::new();
        let x = graph.var(1.0);
        let err = graph.apply(Op::new(OpKind::Mul), &[x]).unwrap_err();
        assert!(matches!(err, GraphError::Op(OpError::Arity { .. })));
    }

    #[test]
    #[should_panic(expected = "different graph")]
    fn test_mixing_graphs_panics() {
        let first = Graph::new();
        let second = Graph::new();
        let _ = first.var(1.0) + second.var(2.0);
    }

    #[test]
    fn test_set_value_only_on_leaves() {
        let graph = Graph::new();
        let x = graph.var(1.0);
        let y = x + 1.0;

        x.set_value(4.0).unwrap();
        assert_eq!(x.value(), 4.0);
        assert_eq!(y.value(), 2.0);
        assert!(matches!(y.set_value(0.0), Err(GraphError::NotALeaf { .. })));
    }

    #[test]
    fn test_reading_unset_gradient_fails() {
        let graph = Graph::new();
        let x = graph.var(1.0);
        assert!(matches!(x.grad(), Err(GraphError::GradientUnset { .. })));
    }
}
