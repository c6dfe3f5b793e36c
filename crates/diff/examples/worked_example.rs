//! Worked Example: Building and Differentiating an Expression
//!
//! Run with: cargo run -p regrad-diff --example worked_example
//!
//! This example demonstrates:
//! - Eager forward evaluation through operator overloading
//! - Rebinding names without disturbing earlier nodes
//! - A single backward pass accumulating into shared leaves
//! - Fallible operations (`/`, `pow`, `log`) propagating with `?`

use regrad_diff::{Graph, GraphError};

fn main() -> Result<(), GraphError> {
    env_logger::init();

    println!("=== Worked Example ===\n");

    // -------------------------------------------------------------------------
    // 1. Forward
    // -------------------------------------------------------------------------
    println!("1. Forward");
    println!("----------");

    let graph = Graph::new();
    let a = graph.var(-4.0);
    let b = graph.var(2.0);
    let five = graph.constant(5.0);

    let c = a + b;
    let d = a * b + b.pow(3.0)?;
    let c = c + (c + 1.0);
    let c = c + (1.0 + c + (-a));
    let d = d + (d * 2.0 + (b + a).relu());
    let d = d + (five * d + (b - a).relu());
    let e = c - d;
    let f = e.pow(2.0)?;
    let g = (f / 2.0)?;
    let g = g + (10.0 / f)?;

    println!("a = {a}, b = {b}");
    println!("g = {g:.4}");
    println!("nodes recorded: {}", graph.len());
    println!();

    // -------------------------------------------------------------------------
    // 2. Backward
    // -------------------------------------------------------------------------
    println!("2. Backward");
    println!("-----------");

    g.backward()?;
    println!("dg/da = {:.4}", a.grad()?);
    println!("dg/db = {:.4}", b.grad()?);
    println!("g is now {:?}", g.state());
    println!();

    // -------------------------------------------------------------------------
    // 3. Domain errors
    // -------------------------------------------------------------------------
    println!("3. Domain Errors");
    println!("----------------");

    let zero = graph.var(0.0);
    match zero.log() {
        Ok(v) => println!("log(0) = {v}"),
        Err(err) => println!("log(0) rejected: {err}"),
    }
    match 1.0 / zero {
        Ok(v) => println!("1 / 0 = {v}"),
        Err(err) => println!("1 / 0 rejected: {err}"),
    }

    Ok(())
}
