//! Mappings from the logical polar domain onto the physical plane.
//!
//! Every mapping is a [`CurvilinearToCartesian`] implementation. Jacobian matrices are laid out as
//!
//! ```text
//! J = [ ∂x/∂r  ∂x/∂θ ]
//!     [ ∂y/∂r  ∂y/∂θ ]
//! ```
//!
//! so that the metric tensor is `G = JᵀJ` and its inverse `G⁻¹ = J⁻¹J⁻ᵀ`. All mappings are singular
//! at the pole `r = 0`; close to the pole the solver works with the *pseudo-Cartesian* coordinates
//! `(X, Y) = (r cos θ, r sin θ)` instead, whose Jacobian with respect to the physical coordinates
//! stays regular.

mod circular;
mod czarny;
mod discrete;

pub use circular::*;
pub use czarny::*;
pub use discrete::*;

use crate::error::PolarError;
use crate::{LogicalCoordinate, Real};
use nalgebra::{try_convert, Matrix2, Point2};
use std::fmt::Debug;

/// Determinants at or below this magnitude are treated as singular by [`inverse_jacobian_matrix`].
pub const SINGULAR_JACOBIAN_THRESHOLD: f64 = 1e-15;

/// A mapping from logical coordinates `(r, θ)` to Cartesian coordinates `(x, y)`.
pub trait CurvilinearToCartesian<T: Real>: Debug + Send + Sync {
    fn to_cartesian(&self, coord: &LogicalCoordinate<T>) -> Point2<T>;

    fn jacobian_matrix(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T>;

    /// The determinant of the Jacobian matrix.
    fn jacobian(&self, coord: &LogicalCoordinate<T>) -> T {
        self.jacobian_matrix(coord).determinant()
    }

    /// # Panics
    ///
    /// Panics if the Jacobian is singular, which is always the case at the pole.
    fn inv_jacobian_matrix(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        inverse_jacobian_matrix(&self.jacobian_matrix(coord))
    }

    fn metric_tensor(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        let j = self.jacobian_matrix(coord);
        j.transpose() * j
    }

    /// # Panics
    ///
    /// Same conditions as [`CurvilinearToCartesian::inv_jacobian_matrix`].
    fn inverse_metric_tensor(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        let inv = self.inv_jacobian_matrix(coord);
        inv * inv.transpose()
    }

    /// The inverse Jacobian of the pseudo-Cartesian coordinates with respect to the physical
    /// coordinates at the pole, `∂(X, Y)/∂(x, y)`.
    fn try_pseudo_cartesian_jacobian_center_matrix(&self) -> Result<Matrix2<T>, PolarError>;

    /// # Panics
    ///
    /// Panics if [`CurvilinearToCartesian::try_pseudo_cartesian_jacobian_center_matrix`] fails.
    fn pseudo_cartesian_jacobian_center_matrix(&self) -> Matrix2<T> {
        self.try_pseudo_cartesian_jacobian_center_matrix()
            .unwrap_or_else(|err| panic!("{err}"))
    }
}

impl<T: Real, M: CurvilinearToCartesian<T> + ?Sized> CurvilinearToCartesian<T> for &M {
    fn to_cartesian(&self, coord: &LogicalCoordinate<T>) -> Point2<T> {
        (**self).to_cartesian(coord)
    }

    fn jacobian_matrix(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        (**self).jacobian_matrix(coord)
    }

    fn jacobian(&self, coord: &LogicalCoordinate<T>) -> T {
        (**self).jacobian(coord)
    }

    fn inv_jacobian_matrix(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        (**self).inv_jacobian_matrix(coord)
    }

    fn try_pseudo_cartesian_jacobian_center_matrix(&self) -> Result<Matrix2<T>, PolarError> {
        (**self).try_pseudo_cartesian_jacobian_center_matrix()
    }
}

impl<T: Real, M: CurvilinearToCartesian<T> + ?Sized> CurvilinearToCartesian<T> for Box<M> {
    fn to_cartesian(&self, coord: &LogicalCoordinate<T>) -> Point2<T> {
        (**self).to_cartesian(coord)
    }

    fn jacobian_matrix(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        (**self).jacobian_matrix(coord)
    }

    fn jacobian(&self, coord: &LogicalCoordinate<T>) -> T {
        (**self).jacobian(coord)
    }

    fn inv_jacobian_matrix(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        (**self).inv_jacobian_matrix(coord)
    }

    fn try_pseudo_cartesian_jacobian_center_matrix(&self) -> Result<Matrix2<T>, PolarError> {
        (**self).try_pseudo_cartesian_jacobian_center_matrix()
    }
}

/// Inverts a Jacobian matrix through its adjugate, `J⁻¹ = adj(J) / det(J)`.
///
/// Returns [`PolarError::SingularJacobian`] if `|det(J)| <= 1e-15`.
pub fn try_inverse_jacobian_matrix<T: Real>(jacobian: &Matrix2<T>) -> Result<Matrix2<T>, PolarError> {
    let det = jacobian.determinant();
    let threshold: T = nalgebra::convert(SINGULAR_JACOBIAN_THRESHOLD);
    if det.abs() <= threshold {
        return Err(PolarError::SingularJacobian {
            determinant: try_convert(det).unwrap_or(f64::NAN),
            threshold: SINGULAR_JACOBIAN_THRESHOLD,
        });
    }
    let adjugate = Matrix2::new(
        jacobian[(1, 1)],
        -jacobian[(0, 1)],
        -jacobian[(1, 0)],
        jacobian[(0, 0)],
    );
    Ok(adjugate / det)
}

/// Inverts a Jacobian matrix.
///
/// # Panics
///
/// Panics with [`PolarError::SingularJacobian`] if `|det(J)| <= 1e-15`.
pub fn inverse_jacobian_matrix<T: Real>(jacobian: &Matrix2<T>) -> Matrix2<T> {
    try_inverse_jacobian_matrix(jacobian).unwrap_or_else(|err| panic!("{err}"))
}
