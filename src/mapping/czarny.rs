use crate::error::PolarError;
use crate::mapping::CurvilinearToCartesian;
use crate::{wrap_periodic, LogicalCoordinate, Real};
use nalgebra::{Matrix2, Point2};
use numeric_literals::replace_float_literals;

/// The Czarny mapping, a D-shaped deformation of the disk.
///
/// ```text
/// x = (1 - √(1 + ε(ε + 2r cos θ))) / ε
/// y = e ξ r sin θ / (2 - √(1 + ε(ε + 2r cos θ)))
/// ```
///
/// with inverse aspect ratio `ε`, ellipticity `e` and `ξ = 1 / √(1 - ε²/4)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CzarnyToCartesian<T> {
    epsilon: T,
    e: T,
}

impl<T: Real> CzarnyToCartesian<T> {
    /// # Panics
    ///
    /// Panics unless `0 < ε < 2` and `e > 0`.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn new(epsilon: T, e: T) -> Self {
        assert!(epsilon > 0.0 && epsilon < 2.0, "epsilon must lie in (0, 2)");
        assert!(e > 0.0, "e must be positive");
        Self { epsilon, e }
    }

    pub fn epsilon(&self) -> T {
        self.epsilon
    }

    pub fn e(&self) -> T {
        self.e
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn xi(&self) -> T {
        (1.0 / (1.0 - 0.25 * self.epsilon * self.epsilon)).sqrt()
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn root(&self, coord: &LogicalCoordinate<T>) -> T {
        (1.0 + self.epsilon * (self.epsilon + 2.0 * coord.r * coord.theta.cos())).sqrt()
    }

    /// The inverse mapping, with `θ ∈ [0, 2π)`.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn to_logical(&self, point: &Point2<T>) -> LogicalCoordinate<T> {
        let (x, y) = (point.x, point.y);
        let eps = self.epsilon;
        let xi = self.xi();
        let ex = 1.0 + eps * x;
        let ex2 = eps * x * x - 2.0 * x - eps;
        let r = (y * y * ex * ex / (self.e * self.e * xi * xi) + 0.25 * ex2 * ex2).sqrt();
        let theta = (2.0 * y * ex).atan2(self.e * xi * ex2);
        LogicalCoordinate::new(r, wrap_periodic(theta, T::zero(), T::two_pi()))
    }
}

impl<T: Real> CurvilinearToCartesian<T> for CzarnyToCartesian<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn to_cartesian(&self, coord: &LogicalCoordinate<T>) -> Point2<T> {
        let root = self.root(coord);
        let x = (1.0 - root) / self.epsilon;
        let y = self.e * self.xi() * coord.r * coord.theta.sin() / (2.0 - root);
        Point2::new(x, y)
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn jacobian_matrix(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        let r = coord.r;
        let (sin, cos) = coord.theta.sin_cos();
        let root = self.root(coord);
        let denom = 2.0 - root;
        let e_xi = self.e * self.xi();
        let cross = self.epsilon * r * sin / (denom * denom * root);

        let dx_dr = -cos / root;
        let dx_dtheta = r * sin / root;
        let dy_dr = e_xi * (cos * cross + sin / denom);
        let dy_dtheta = e_xi * r * (cos / denom - sin * cross);
        Matrix2::new(dx_dr, dx_dtheta, dy_dr, dy_dtheta)
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn jacobian(&self, coord: &LogicalCoordinate<T>) -> T {
        let root = self.root(coord);
        -self.e * self.xi() * coord.r / (root * (2.0 - root))
    }

    /// `[[-√(1 + ε²), 0], [0, (2 - √(1 + ε²)) / (e ξ)]]`
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn try_pseudo_cartesian_jacobian_center_matrix(&self) -> Result<Matrix2<T>, PolarError> {
        let root = (1.0 + self.epsilon * self.epsilon).sqrt();
        Ok(Matrix2::new(-root, 0.0, 0.0, (2.0 - root) / (self.e * self.xi())))
    }
}
