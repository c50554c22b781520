//! Polar B-splines: tensor-product B-splines with a smooth treatment of the pole.
//!
//! The tensor product of an open radial basis and a periodic angular basis is singular at `r = 0`,
//! where all angular functions of the innermost rings meet at the same physical point. A polar basis
//! of continuity `C ∈ {-1, 0, 1}` replaces the tensor-product functions of the first `C + 1` rings by
//! `(C + 1)(C + 2) / 2` singular functions. These are linear combinations of the replaced functions,
//! chosen so that every function in the basis is `C` times continuously differentiable across the
//! pole.
//!
//! Basis functions are numbered singular first, then tensor-product functions ring by ring:
//! the tensor-product function `(i_r, i_θ)` has global index
//! `n_singular + (i_r - (C + 1)) * n_θ + i_θ`.

mod basis;
mod evaluator;
mod spline;

pub use basis::*;
pub use evaluator::*;
pub use spline::*;
