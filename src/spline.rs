//! Interpolation onto and evaluation of 2D tensor-product splines.
//!
//! A 2D spline is stored as a coefficient matrix: row `a` belongs to basis function `a` of the
//! first (radial) basis, column `b` to basis function `b` of the second (angular) basis. Periodic
//! bases store each coefficient once.

mod builder;
mod evaluator;

pub use builder::*;
pub use evaluator::*;

use nalgebra::DMatrix;

/// Coefficients of a 2D tensor-product spline.
pub type Spline2D<T> = DMatrix<T>;
