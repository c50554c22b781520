//! The polar finite element solver and the reconstruction of the electric field.
//!
//! [`PolarSplineFemPoissonLikeSolver`] discretizes
//!
//! ```text
//! -∇·(α ∇φ) + β φ = ρ   in Ω,        φ = 0   on ∂Ω,
//! ```
//!
//! on the polar basis, with `α > 0` and `β ≥ 0`. [`VlasovPoissonSolver`] builds on it to compute
//! `E = -∇φ` in Cartesian components on the interpolation grid.

mod linear;
mod poisson_like;
mod vlasov_poisson;

pub use linear::*;
pub use poisson_like::*;
pub use vlasov_poisson::*;
