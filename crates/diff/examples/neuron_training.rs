//! Neuron Training: Gradient Descent on a Scalar Graph
//!
//! Run with: cargo run -p regrad-diff --example neuron_training
//!
//! This example demonstrates:
//! - Parameters as leaves that survive across training steps
//! - Training loop: zero_grad -> forward -> loss -> backward -> update
//! - Updating leaves in place with `set_value`
//!
//! Each step records new nodes in the same graph. Parameter handles stay
//! valid because leaves are never released.

use regrad_diff::{Graph, GraphError, Var};

/// Samples of y = 3x - 1 with inputs in [-1, 1].
fn dataset() -> Vec<(f64, f64)> {
    (0..8)
        .map(|i| {
            let x = -1.0 + i as f64 * (2.0 / 7.0);
            (x, 3.0 * x - 1.0)
        })
        .collect()
}

/// Mean squared error of the linear neuron `w·x + b` over `data`.
fn loss<'g>(w: Var<'g>, b: Var<'g>, data: &[(f64, f64)]) -> Result<Var<'g>, GraphError> {
    let graph = w.graph();
    let mut total = graph.constant(0.0);
    for &(x, y) in data {
        let prediction = w * x + b;
        total = total + (prediction - y).pow(2.0)?;
    }
    total / data.len() as f64
}

fn main() -> Result<(), GraphError> {
    env_logger::init();

    println!("=== Neuron Training ===\n");

    let graph = Graph::new();
    let w = graph.var(0.5);
    let b = graph.var(0.0);
    let data = dataset();
    let learning_rate = 0.2;

    for epoch in 0..100 {
        graph.zero_grad();
        let l = loss(w, b, &data)?;
        l.backward()?;

        w.set_value(w.value() - learning_rate * w.grad()?)?;
        b.set_value(b.value() - learning_rate * b.grad()?)?;

        if epoch % 10 == 0 {
            println!("epoch {epoch:>3}: loss = {:.6}", l.value());
        }
    }

    println!();
    println!("learned: w = {:.4}, b = {:.4}", w.value(), b.value());
    println!("target:  w = 3.0000, b = -1.0000");
    println!("nodes recorded: {}", graph.len());

    Ok(())
}
