//! # Registry Tests
//!
//! Every backward rule is checked against a central finite difference of its
//! own forward rule, one operand at a time.

use regrad_core::{Op, OpError, OpKind};
use rstest::rstest;

const H: f64 = 1e-6;
const TOL: f64 = 1e-6;

fn make(kind: OpKind) -> Op {
    match kind {
        OpKind::Pow => Op::pow(2.5),
        _ => Op::new(kind),
    }
}

fn eval(kind: OpKind, inputs: &[f64]) -> f64 {
    make(kind).forward(inputs).unwrap()
}

fn numerical(kind: OpKind, inputs: &[f64], slot: usize) -> f64 {
    let mut plus = inputs.to_vec();
    let mut minus = inputs.to_vec();
    plus[slot] += H;
    minus[slot] -= H;
    (eval(kind, &plus) - eval(kind, &minus)) / (2.0 * H)
}

// ============================================================================
// Finite Difference Checks
// ============================================================================

#[rstest]
#[case(OpKind::Add, &[1.3, -0.4])]
#[case(OpKind::Sub, &[1.3, -0.4])]
#[case(OpKind::Mul, &[1.3, -0.4])]
#[case(OpKind::Div, &[1.3, -0.4])]
#[case(OpKind::Neg, &[0.9])]
#[case(OpKind::Pow, &[1.7])]
#[case(OpKind::Exp, &[0.9])]
#[case(OpKind::Log, &[0.9])]
#[case(OpKind::Sqrt, &[2.3])]
#[case(OpKind::Sin, &[0.9])]
#[case(OpKind::Cos, &[0.9])]
#[case(OpKind::Tanh, &[0.9])]
#[case(OpKind::Relu, &[0.9])]
#[case(OpKind::Relu, &[-0.9])]
fn test_backward_matches_finite_difference(#[case] kind: OpKind, #[case] inputs: &[f64]) {
    let mut op = make(kind);
    op.forward(inputs).unwrap();
    let analytic = op.backward(1.0).unwrap();
    assert_eq!(analytic.len(), kind.arity());

    for (slot, &grad) in analytic.iter().enumerate() {
        let expected = numerical(kind, inputs, slot);
        let scale = grad.abs().max(expected.abs()).max(1.0);
        assert!(
            (grad - expected).abs() / scale < TOL,
            "{kind} slot {slot}: analytic={grad}, numerical={expected}"
        );
    }
}

#[test]
fn test_backward_scales_with_upstream_gradient() {
    for kind in OpKind::ALL {
        let inputs: Vec<f64> = vec![0.8; kind.arity()];

        let mut unit = make(kind);
        unit.forward(&inputs).unwrap();
        let unit_grads = unit.backward(1.0).unwrap();

        let mut scaled = make(kind);
        scaled.forward(&inputs).unwrap();
        let scaled_grads = scaled.backward(-3.0).unwrap();

        for (u, s) in unit_grads.iter().zip(&scaled_grads) {
            assert!((s - (-3.0 * u)).abs() < 1e-12, "{kind}: {s} vs {}", -3.0 * u);
        }
    }
}

// ============================================================================
// Partial Operations
// ============================================================================

#[test]
fn test_only_partial_operations_raise_domain_errors() {
    for kind in OpKind::ALL {
        let inputs = if kind.arity() == 2 {
            vec![1.0, 0.0]
        } else {
            vec![0.0]
        };
        let mut op = match kind {
            OpKind::Pow => Op::pow(-1.0),
            _ => Op::new(kind),
        };
        let result = op.forward(&inputs);
        match kind {
            OpKind::Div | OpKind::Pow | OpKind::Log | OpKind::Sqrt => {
                assert!(kind.is_partial());
                assert!(
                    matches!(result, Err(OpError::Domain { .. })),
                    "{kind} should reject {inputs:?}"
                );
            }
            _ => {
                assert!(!kind.is_partial());
                assert!(result.is_ok(), "{kind} rejected {inputs:?}");
            }
        }
    }
}

#[test]
fn test_domain_error_message_names_operation() {
    let err = Op::new(OpKind::Log).forward(&[-2.0]).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Log"));
    assert!(message.contains("-2"));
}
