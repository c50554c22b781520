//! One-dimensional bases and the Bernstein basis on a triangle.
//!
//! Every 1D basis evaluates the `degree + 1` functions that are non-zero at a query point and
//! reports the index of the first of them. Output buffers are provided by the caller, and their
//! length is checked: a buffer of the wrong size is a programming error and panics.

mod bernstein;
mod bsplines;
mod lagrange;

pub use bernstein::*;
pub use bsplines::*;
pub use lagrange::*;

/// Largest supported polynomial degree.
///
/// Fixed-size scratch buffers of length `MAX_DEGREE + 1` are used during evaluation, so that no
/// evaluation allocates.
pub const MAX_DEGREE: usize = 9;

/// Stack buffer large enough for the non-zero functions of any supported basis.
pub(crate) type BasisBuffer<T> = [T; MAX_DEGREE + 1];

pub(crate) fn check_output_len(len: usize, degree: usize) {
    assert_eq!(
        len,
        degree + 1,
        "Precondition violated: output buffer must hold degree + 1 = {} values",
        degree + 1
    );
}

/// `floor(x)` as a signed index.
pub(crate) fn floor_index<T: crate::Real>(x: T) -> isize {
    nalgebra::try_convert::<T, f64>(x.floor())
        .map(|v| v as isize)
        .unwrap_or(0)
}
