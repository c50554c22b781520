//! Polar B-spline finite element solver for Poisson-like problems on disk-like domains.
//!
//! The logical domain is `(r, θ) ∈ [0, r_max] × [0, 2π)`, mapped onto a physical domain by a
//! [`CurvilinearToCartesian`](mapping::CurvilinearToCartesian) mapping. The pole `r = 0` is a
//! coordinate singularity of every such mapping; it is handled by a small set of singular basis
//! functions (see [`polar::PolarBSplines`]) and, for field reconstruction, by a linearization
//! around the pole (see [`solver::VlasovPoissonSolver`]).
//!
//! The crate is organized bottom-up:
//!
//! - [`basis`]: one-dimensional B-spline and Lagrange bases.
//! - [`spline`]: interpolation onto and evaluation of 2D tensor-product splines.
//! - [`polar`]: polar B-splines, polar spline coefficients and their evaluator.
//! - [`mapping`]: analytical and discrete mappings, Jacobians and metric tensors.
//! - [`assembly`]: sparse assembly of the weak form.
//! - [`solver`]: the Poisson-like solver and the electric field reconstruction.

use nalgebra::RealField;

pub mod assembly;
pub mod basis;
pub mod config;
pub mod context;
pub mod error;
pub mod manufactured;
pub mod mapping;
pub mod polar;
pub mod quadrature;
pub mod solver;
pub mod spline;

pub(crate) mod workspace;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use context::ExecutionContext;
pub use error::PolarError;

/// Scalar type used throughout the crate.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// A point `(r, θ)` in the logical polar domain.
///
/// `θ` is stored as given; evaluators reduce it modulo `2π` where needed.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LogicalCoordinate<T> {
    pub r: T,
    pub theta: T,
}

impl<T: Real> LogicalCoordinate<T> {
    pub fn new(r: T, theta: T) -> Self {
        Self { r, theta }
    }

    /// Returns the same point with `θ` reduced to `[0, 2π)`.
    pub fn wrapped(&self) -> Self {
        Self {
            r: self.r,
            theta: wrap_periodic(self.theta, T::zero(), T::two_pi()),
        }
    }
}

/// Reduces `x` into `[min, min + period)`.
pub fn wrap_periodic<T: Real>(x: T, min: T, period: T) -> T {
    let shifted = x - min;
    let mut wrapped = shifted - (shifted / period).floor() * period;
    // Round-off may land exactly on the upper end
    if wrapped >= period {
        wrapped -= period;
    }
    min + wrapped
}
