//! # Scalar Operations
//!
//! This module defines the closed set of operations a scalar graph can record.
//! Each [`Op`] is a single application of an [`OpKind`] and knows how to:
//!
//! - Execute forward (compute the output from operand values)
//! - Execute backward (distribute an upstream gradient to its operands)
//!
//! Forward caches whatever backward needs; backward consumes that cache
//! exactly once.
//!
//! ## Operations
//!
//! | Op | Forward | Backward (upstream `g`) |
//! |----|---------|-------------------------|
//! | Add | x1 + x2 | (g, g) |
//! | Sub | x1 - x2 | (g, -g) |
//! | Mul | x1 · x2 | (g·x2, g·x1) |
//! | Div | x1 / x2 | (g/x2, -g·x1/x2²) |
//! | Neg | -x | -g |
//! | Pow | x^p | g·p·x^(p-1), or 0 when p = 0 |
//! | Exp | e^x | g·y |
//! | Log | ln x | g/x |
//! | Sqrt | √x | g·0.5/y |
//! | Sin | sin x | g·cos x |
//! | Cos | cos x | -g·sin x |
//! | Tanh | tanh x | g·(1 - y²) |
//! | Relu | max(0, x) | g if x ≥ 0 else 0 |

use std::fmt;

use crate::error::OpError;

/// The kinds of operation the engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    /// Power with a constant exponent parameter.
    Pow,
    Exp,
    Log,
    Sqrt,
    Sin,
    Cos,
    Tanh,
    Relu,
}

impl OpKind {
    /// Every operation kind, in declaration order.
    pub const ALL: [OpKind; 13] = [
        OpKind::Add,
        OpKind::Sub,
        OpKind::Mul,
        OpKind::Div,
        OpKind::Neg,
        OpKind::Pow,
        OpKind::Exp,
        OpKind::Log,
        OpKind::Sqrt,
        OpKind::Sin,
        OpKind::Cos,
        OpKind::Tanh,
        OpKind::Relu,
    ];

    /// Number of operand values this operation consumes.
    pub fn arity(self) -> usize {
        match self {
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div => 2,
            _ => 1,
        }
    }

    /// Whether forward can reject its operands with a domain error.
    pub fn is_partial(self) -> bool {
        matches!(self, OpKind::Div | OpKind::Pow | OpKind::Log | OpKind::Sqrt)
    }

    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Add => "Add",
            OpKind::Sub => "Sub",
            OpKind::Mul => "Mul",
            OpKind::Div => "Div",
            OpKind::Neg => "Neg",
            OpKind::Pow => "Pow",
            OpKind::Exp => "Exp",
            OpKind::Log => "Log",
            OpKind::Sqrt => "Sqrt",
            OpKind::Sin => "Sin",
            OpKind::Cos => "Cos",
            OpKind::Tanh => "Tanh",
            OpKind::Relu => "Relu",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Values saved by forward for the matching backward call.
///
/// One variant per operation, so backward can never read another
/// operation's cache.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Saved {
    Add,
    Sub,
    Mul { x1: f64, x2: f64 },
    Div { x1: f64, x2: f64 },
    Neg,
    Pow { x: f64, p: f64 },
    Exp { y: f64 },
    Log { x: f64 },
    Sqrt { y: f64 },
    Sin { x: f64 },
    Cos { x: f64 },
    Tanh { y: f64 },
    Relu { mask: bool },
}

/// A single application of an operation to specific operand values.
///
/// Created fresh for every application, an `Op` runs forward once and
/// backward at most once:
///
/// ```rust
/// use regrad_core::{Op, OpKind};
///
/// let mut op = Op::new(OpKind::Mul);
/// assert_eq!(op.forward(&[3.0, 4.0]).unwrap(), 12.0);
/// assert_eq!(op.backward(1.0).unwrap(), vec![4.0, 3.0]);
/// assert!(op.backward(1.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    kind: OpKind,
    exponent: Option<f64>,
    saved: Option<Saved>,
}

impl Op {
    /// Create an operation instance without parameters.
    ///
    /// `Pow` needs an exponent; build it with [`Op::pow`] instead, otherwise
    /// forward fails with [`OpError::MissingParameter`].
    pub fn new(kind: OpKind) -> Self {
        Self {
            kind,
            exponent: None,
            saved: None,
        }
    }

    /// Create a `Pow` instance raising its operand to `exponent`.
    pub fn pow(exponent: f64) -> Self {
        Self {
            kind: OpKind::Pow,
            exponent: Some(exponent),
            saved: None,
        }
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Named parameters of this instance.
    pub fn params(&self) -> Vec<(&'static str, f64)> {
        self.exponent.map(|p| ("exponent", p)).into_iter().collect()
    }

    /// Look up a named parameter.
    pub fn param(&self, name: &str) -> Option<f64> {
        self.params()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Whether forward has run and backward has not consumed its state yet.
    pub fn has_saved_state(&self) -> bool {
        self.saved.is_some()
    }

    fn domain(&self, reason: impl Into<String>) -> OpError {
        OpError::Domain {
            op: self.kind,
            reason: reason.into(),
        }
    }

    /// Execute the forward pass.
    ///
    /// Checks arity and domain, computes the output and caches the state
    /// needed by [`Op::backward`]. On error nothing is cached.
    pub fn forward(&mut self, inputs: &[f64]) -> Result<f64, OpError> {
        let expected = self.kind.arity();
        if inputs.len() != expected {
            return Err(OpError::Arity {
                op: self.kind,
                expected,
                got: inputs.len(),
            });
        }

        let (y, saved) = match self.kind {
            OpKind::Add => (inputs[0] + inputs[1], Saved::Add),

            OpKind::Sub => (inputs[0] - inputs[1], Saved::Sub),

            OpKind::Mul => {
                let (x1, x2) = (inputs[0], inputs[1]);
                (x1 * x2, Saved::Mul { x1, x2 })
            }

            OpKind::Div => {
                let (x1, x2) = (inputs[0], inputs[1]);
                if x2 == 0.0 {
                    return Err(self.domain(format!("division of {x1} by zero")));
                }
                (x1 / x2, Saved::Div { x1, x2 })
            }

            OpKind::Neg => (-inputs[0], Saved::Neg),

            OpKind::Pow => {
                let x = inputs[0];
                let p = self.exponent.ok_or(OpError::MissingParameter {
                    op: self.kind,
                    name: "exponent",
                })?;
                if x == 0.0 && p < 0.0 {
                    return Err(self.domain(format!("zero raised to negative power {p}")));
                }
                if x == 0.0 && p > 0.0 && p < 1.0 {
                    return Err(self.domain(format!(
                        "zero raised to power {p} has no finite derivative"
                    )));
                }
                if x < 0.0 && p.fract() != 0.0 {
                    return Err(self.domain(format!(
                        "negative base {x} raised to non-integer power {p}"
                    )));
                }
                (x.powf(p), Saved::Pow { x, p })
            }

            OpKind::Exp => {
                let y = inputs[0].exp();
                (y, Saved::Exp { y })
            }

            OpKind::Log => {
                let x = inputs[0];
                if x.is_nan() || x <= 0.0 {
                    return Err(self.domain(format!("logarithm of non-positive value {x}")));
                }
                (x.ln(), Saved::Log { x })
            }

            OpKind::Sqrt => {
                let x = inputs[0];
                if x.is_nan() || x <= 0.0 {
                    return Err(self.domain(format!("square root of non-positive value {x}")));
                }
                let y = x.sqrt();
                (y, Saved::Sqrt { y })
            }

            OpKind::Sin => {
                let x = inputs[0];
                (x.sin(), Saved::Sin { x })
            }

            OpKind::Cos => {
                let x = inputs[0];
                (x.cos(), Saved::Cos { x })
            }

            OpKind::Tanh => {
                let y = inputs[0].tanh();
                (y, Saved::Tanh { y })
            }

            OpKind::Relu => {
                let x = inputs[0];
                let mask = x >= 0.0;
                (if mask { x } else { 0.0 }, Saved::Relu { mask })
            }
        };

        self.saved = Some(saved);
        Ok(y)
    }

    /// Execute the backward pass.
    ///
    /// Given the gradient of the root with respect to this operation's output,
    /// returns one gradient per operand in call order. Consumes the cached
    /// forward state; a second call fails.
    pub fn backward(&mut self, grad: f64) -> Result<Vec<f64>, OpError> {
        let saved = self
            .saved
            .take()
            .ok_or(OpError::MissingForwardState { op: self.kind })?;

        let grads = match saved {
            Saved::Add => vec![grad, grad],
            Saved::Sub => vec![grad, -grad],
            Saved::Mul { x1, x2 } => vec![grad * x2, grad * x1],
            Saved::Div { x1, x2 } => vec![grad / x2, -(grad * x1) / (x2 * x2)],
            Saved::Neg => vec![-grad],
            Saved::Pow { p, .. } if p == 0.0 => vec![0.0],
            Saved::Pow { x, p } => vec![grad * p * x.powf(p - 1.0)],
            Saved::Exp { y } => vec![grad * y],
            Saved::Log { x } => vec![grad / x],
            Saved::Sqrt { y } => vec![grad * 0.5 / y],
            Saved::Sin { x } => vec![grad * x.cos()],
            Saved::Cos { x } => vec![-grad * x.sin()],
            Saved::Tanh { y } => vec![grad * (1.0 - y * y)],
            Saved::Relu { mask } => vec![if mask { grad } else { 0.0 }],
        };

        Ok(grads)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exponent {
            Some(p) => write!(f, "{}({})", self.kind, p),
            None => write!(f, "{}", self.kind),
        }
    }
}
