//! # Backward Pass - Reverse-Mode Autodiff
//!
//! The backward pass walks the recorded graph from a root towards its leaves:
//!
//! 1. **Seed**: the root's gradient is set to the seed (usually `1.0`)
//! 2. **Order**: a depth-first post-order over operand edges, restricted to
//!    nodes that track gradients, with each node visited once
//! 3. **Propagate**: in reverse post-order each computed node hands its
//!    gradient to its operation's backward rule and accumulates the results
//!    into its operands
//! 4. **Release**: a computed node that has distributed its gradient drops its
//!    operation, operand edges and gradient
//!
//! Reverse post-order is a topological order, so a node shared by several
//! consumers has received every contribution before it propagates further.
//!
//! ## Example
//!
//! ```rust
//! use regrad_diff::Graph;
//!
//! // Fan-out: a feeds both sides of the sum
//! let graph = Graph::new();
//! let a = graph.var(3.0);
//! let y = a * a + a;
//!
//! y.backward().unwrap();
//! assert_eq!(a.grad().unwrap(), 7.0);  // 2a + 1
//!
//! // A root can only be differentiated once
//! assert!(y.backward().is_err());
//! ```

use log::{debug, trace};
use petgraph::graph::NodeIndex;
use petgraph::visit::{EdgeRef, VisitMap, Visitable};
use petgraph::Direction;

use crate::error::GraphError;
use crate::graph::{Dag, Graph, NodeState};

impl Graph {
    /// Run backward from `root`, seeding its gradient with `seed`.
    pub(crate) fn backward_from(&self, root: NodeIndex, seed: f64) -> Result<(), GraphError> {
        let mut dag = self.dag.borrow_mut();

        let node = &dag[root];
        if node.state == NodeState::Released {
            return Err(GraphError::Released { node: root.index() });
        }
        if !node.requires_grad {
            return Err(GraphError::NotTracked { node: root.index() });
        }
        if node.grad.is_some() {
            return Err(GraphError::GradientAlreadySet { node: root.index() });
        }

        let order = gradient_order(&dag, root);
        debug!(
            "backward from node {} with seed {}: {} node(s) to visit",
            root.index(),
            seed,
            order.len()
        );

        dag[root].accumulate(seed);
        for &index in order.iter().rev() {
            propagate(&mut dag, index)?;
        }

        Ok(())
    }
}

/// Post-order of the gradient-tracking nodes reachable from `root`.
///
/// Every node appears after all of its tracked operands. Uses an explicit
/// stack so deep expression chains cannot overflow the call stack.
pub(crate) fn gradient_order(dag: &Dag, root: NodeIndex) -> Vec<NodeIndex> {
    let mut visited = dag.visit_map();
    let mut order = Vec::new();
    let mut stack = vec![(root, false)];

    while let Some((index, expanded)) = stack.pop() {
        if expanded {
            order.push(index);
            continue;
        }
        if !visited.visit(index) {
            continue;
        }
        stack.push((index, true));
        for operand in dag.neighbors_directed(index, Direction::Outgoing) {
            if dag[operand].requires_grad && !visited.is_visited(&operand) {
                stack.push((operand, false));
            }
        }
    }

    order
}

/// Distribute a computed node's gradient to its operands, then release it.
/// Leaves are left untouched.
fn propagate(dag: &mut Dag, index: NodeIndex) -> Result<(), GraphError> {
    let node = &mut dag[index];
    let Some(mut op) = node.op.take() else {
        return Ok(());
    };
    let upstream = node.grad.ok_or(GraphError::GradientUnset {
        node: index.index(),
    })?;
    let grads = op.backward(upstream)?;
    trace!("node {} ({}): {} -> {:?}", index.index(), op, upstream, grads);

    let operands: Vec<(NodeIndex, usize)> = dag
        .edges_directed(index, Direction::Outgoing)
        .map(|e| (e.target(), e.weight().slot))
        .collect();
    for (operand, slot) in operands {
        let node = &mut dag[operand];
        if node.requires_grad {
            node.accumulate(grads[slot]);
        }
    }

    release(dag, index);
    Ok(())
}

fn release(dag: &mut Dag, index: NodeIndex) {
    while let Some(edge) = dag.first_edge(index, Direction::Outgoing) {
        dag.remove_edge(edge);
    }
    let node = &mut dag[index];
    node.grad = None;
    node.state = NodeState::Released;
}
