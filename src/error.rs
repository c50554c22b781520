//! Error taxonomy of the solver.
//!
//! Most of these conditions are treated as fatal: the public operations that encounter them panic
//! with the `Display` output of the corresponding variant. The fallible `try_*` variants return
//! them instead, so that callers can inspect the failure.

use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PolarError {
    /// A buffer or input did not satisfy the documented requirements.
    PreconditionViolation { message: String },
    /// A Jacobian determinant was too small to invert the Jacobian matrix.
    SingularJacobian { determinant: f64, threshold: f64 },
    /// The Jacobian of the pseudo-Cartesian transformation at the pole could not be inverted for
    /// the given angle.
    NonInvertibleCenterJacobian { theta: f64, determinant: f64 },
    /// Factorization of the finite element system failed.
    SingularSystemError { message: String },
}

impl PolarError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            message: message.into(),
        }
    }
}

impl Display for PolarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreconditionViolation { message } => {
                write!(f, "Precondition violated: {message}")
            }
            Self::SingularJacobian { determinant, threshold } => {
                write!(
                    f,
                    "The Jacobian matrix is singular: |det| = {:e} is not above {:e}. \
                     Jacobian-dependent quantities cannot be evaluated at the pole",
                    determinant.abs(),
                    threshold
                )
            }
            Self::NonInvertibleCenterJacobian { theta, determinant } => {
                write!(
                    f,
                    "The pseudo-Cartesian Jacobian at the center is not invertible for theta = {theta} \
                     (det = {determinant:e})"
                )
            }
            Self::SingularSystemError { message } => {
                write!(f, "Failed to factorize the finite element system: {message}")
            }
        }
    }
}

impl std::error::Error for PolarError {}
