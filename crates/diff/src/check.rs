//! # Gradient Checking
//!
//! Compares gradients from backward against central finite differences
//! `(f(x+h) - f(x-h)) / 2h`.
//!
//! Expressions are given as closures that build their result on a fresh
//! [`Graph`] from one tracked leaf per input, so each evaluation starts from
//! an empty graph:
//!
//! ```rust
//! use regrad_core::GradCheckConfig;
//! use regrad_diff::check::grad_check;
//!
//! let result = grad_check(
//!     |_, x| Ok((x[0] * x[1]).tanh() + x[0].exp()),
//!     &[0.3, -1.2],
//!     &GradCheckConfig::default(),
//! );
//! assert!(result.is_ok());
//! ```

use log::debug;
use regrad_core::GradCheckConfig;

use crate::error::{GradCheckError, GraphError};
use crate::graph::Graph;
use crate::var::Var;

/// Evaluate an expression at `inputs`, returning its value.
pub fn evaluate<F>(f: &F, inputs: &[f64]) -> Result<f64, GraphError>
where
    F: for<'g> Fn(&'g Graph, &[Var<'g>]) -> Result<Var<'g>, GraphError>,
{
    let graph = Graph::new();
    let vars: Vec<Var<'_>> = inputs.iter().map(|&x| graph.var(x)).collect();
    let value = f(&graph, &vars)?.value();
    Ok(value)
}

/// Evaluate an expression and differentiate it with respect to every input.
///
/// Inputs the result does not depend on get a zero gradient.
pub fn gradients<F>(f: &F, inputs: &[f64]) -> Result<(f64, Vec<f64>), GraphError>
where
    F: for<'g> Fn(&'g Graph, &[Var<'g>]) -> Result<Var<'g>, GraphError>,
{
    let graph = Graph::new();
    let vars: Vec<Var<'_>> = inputs.iter().map(|&x| graph.var(x)).collect();
    let root = f(&graph, &vars)?;
    let value = root.value();
    root.backward()?;

    let grads = vars
        .iter()
        .map(|v| match v.grad() {
            Err(GraphError::GradientUnset { .. }) => Ok(0.0),
            other => other,
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((value, grads))
}

/// Central-difference derivative with respect to `inputs[input]`.
///
/// # Panics
///
/// Panics if `input` is not a valid index into `inputs`.
pub fn numerical_gradient<F>(
    f: &F,
    inputs: &[f64],
    input: usize,
    step: f64,
) -> Result<f64, GraphError>
where
    F: for<'g> Fn(&'g Graph, &[Var<'g>]) -> Result<Var<'g>, GraphError>,
{
    assert!(
        input < inputs.len(),
        "input {input} out of range for {} input(s)",
        inputs.len()
    );
    let mut plus = inputs.to_vec();
    let mut minus = inputs.to_vec();
    plus[input] += step;
    minus[input] -= step;

    let f_plus = evaluate(f, &plus)?;
    let f_minus = evaluate(f, &minus)?;

    Ok((f_plus - f_minus) / (2.0 * step))
}

/// Check analytic gradients against numerical ones.
///
/// An input fails when both its absolute difference and its difference
/// relative to `max(|analytic|, |numerical|, 1)` exceed the tolerance.
pub fn grad_check<F>(
    f: F,
    inputs: &[f64],
    config: &GradCheckConfig,
) -> Result<(), GradCheckError>
where
    F: for<'g> Fn(&'g Graph, &[Var<'g>]) -> Result<Var<'g>, GraphError>,
{
    config.validate().map_err(GraphError::from)?;

    let (_, analytic) = gradients(&f, inputs)?;
    for (input, &analytic) in analytic.iter().enumerate() {
        let numerical = numerical_gradient(&f, inputs, input, config.step)?;
        let diff = (numerical - analytic).abs();
        let scale = analytic.abs().max(numerical.abs()).max(1.0);
        debug!("input {input}: analytic={analytic}, numerical={numerical}");

        if diff / scale > config.tolerance && diff > config.tolerance {
            return Err(GradCheckError::Mismatch {
                input,
                analytic,
                numerical,
                diff,
            });
        }
    }

    Ok(())
}
