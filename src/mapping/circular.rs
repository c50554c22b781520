use crate::error::PolarError;
use crate::mapping::{CurvilinearToCartesian, SINGULAR_JACOBIAN_THRESHOLD};
use crate::{wrap_periodic, LogicalCoordinate, Real};
use nalgebra::{convert, Matrix2, Point2};

/// The polar coordinate mapping `(x, y) = (x0 + r cos θ, y0 + r sin θ)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularToCartesian<T: Real> {
    center: Point2<T>,
}

impl<T: Real> Default for CircularToCartesian<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> CircularToCartesian<T> {
    /// The mapping centered at the origin.
    pub fn new() -> Self {
        Self::with_center(Point2::origin())
    }

    pub fn with_center(center: Point2<T>) -> Self {
        Self { center }
    }

    pub fn center(&self) -> &Point2<T> {
        &self.center
    }

    /// The inverse mapping, with `θ ∈ [0, 2π)`.
    pub fn to_logical(&self, point: &Point2<T>) -> LogicalCoordinate<T> {
        let x = point.x - self.center.x;
        let y = point.y - self.center.y;
        let r = (x * x + y * y).sqrt();
        let theta = wrap_periodic(y.atan2(x), T::zero(), T::two_pi());
        LogicalCoordinate::new(r, theta)
    }
}

impl<T: Real> CurvilinearToCartesian<T> for CircularToCartesian<T> {
    fn to_cartesian(&self, coord: &LogicalCoordinate<T>) -> Point2<T> {
        let (sin, cos) = coord.theta.sin_cos();
        Point2::new(self.center.x + coord.r * cos, self.center.y + coord.r * sin)
    }

    fn jacobian_matrix(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        let (sin, cos) = coord.theta.sin_cos();
        let r = coord.r;
        Matrix2::new(cos, -r * sin, sin, r * cos)
    }

    fn jacobian(&self, coord: &LogicalCoordinate<T>) -> T {
        coord.r
    }

    fn inv_jacobian_matrix(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        let r = coord.r;
        assert!(
            r.abs() > convert(SINGULAR_JACOBIAN_THRESHOLD),
            "{}",
            PolarError::SingularJacobian {
                determinant: nalgebra::try_convert(r).unwrap_or(f64::NAN),
                threshold: SINGULAR_JACOBIAN_THRESHOLD,
            }
        );
        let (sin, cos) = coord.theta.sin_cos();
        Matrix2::new(cos, sin, -sin / r, cos / r)
    }

    fn try_pseudo_cartesian_jacobian_center_matrix(&self) -> Result<Matrix2<T>, PolarError> {
        Ok(Matrix2::identity())
    }
}
