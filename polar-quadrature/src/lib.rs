//! Gauss-Legendre quadrature rules for one-dimensional domains.
//!
//! Rules are produced on the reference interval `[-1, 1]` and can be mapped onto every cell of a
//! sequence of break points. Everything here works with `f64`;
//! callers working with other scalar types convert the nodes and weights themselves.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The break points are not strictly increasing, or fewer than two were given.
    InvalidBreakPoints,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBreakPoints => {
                write!(f, "Break points must contain at least two strictly increasing values")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A one-dimensional rule, stored as `(weights, points)`.
pub type Rule = (Vec<f64>, Vec<f64>);
