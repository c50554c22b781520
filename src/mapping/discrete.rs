use crate::basis::BSplines;
use crate::error::PolarError;
use crate::mapping::CurvilinearToCartesian;
use crate::spline::{ExtrapolationRule, Spline2D, SplineBuilder2D, SplineEvaluator2D};
use crate::{LogicalCoordinate, Real};
use log::warn;
use nalgebra::{convert, try_convert, Matrix2, Point2};
use std::sync::Arc;

/// Determinants below this magnitude make the pseudo-Cartesian Jacobian at the pole unusable.
pub const CENTER_JACOBIAN_THRESHOLD: f64 = 1e-16;

/// A mapping represented by a pair of 2D splines, one per Cartesian component.
///
/// Discrete mappings are usually obtained by interpolating an analytical mapping with a
/// [`DiscreteToCartesianBuilder`]. The spline coefficients double as control points, which the
/// polar basis uses to build the functions crossing the pole.
#[derive(Debug, Clone)]
pub struct DiscreteToCartesian<T: Real> {
    x_spline: Spline2D<T>,
    y_spline: Spline2D<T>,
    evaluator: SplineEvaluator2D<T>,
    interpolation_points_theta: Vec<T>,
}

impl<T: Real> DiscreteToCartesian<T> {
    /// # Panics
    ///
    /// Panics if the coefficient matrices do not match the bases of the evaluator.
    pub fn new(
        x_spline: Spline2D<T>,
        y_spline: Spline2D<T>,
        evaluator: SplineEvaluator2D<T>,
        interpolation_points_theta: Vec<T>,
    ) -> Self {
        let shape = evaluator.coefficient_shape();
        assert_eq!(x_spline.shape(), shape, "x coefficients do not match the bases");
        assert_eq!(y_spline.shape(), shape, "y coefficients do not match the bases");
        Self {
            x_spline,
            y_spline,
            evaluator,
            interpolation_points_theta,
        }
    }

    pub fn evaluator(&self) -> &SplineEvaluator2D<T> {
        &self.evaluator
    }

    pub fn x_spline(&self) -> &Spline2D<T> {
        &self.x_spline
    }

    pub fn y_spline(&self) -> &Spline2D<T> {
        &self.y_spline
    }

    /// The control point attached to the tensor-product basis function `(i_r, i_θ)`.
    ///
    /// The angular index is taken modulo the number of angular basis functions.
    pub fn control_point(&self, ir: usize, itheta: usize) -> Point2<T> {
        let itheta = itheta % self.x_spline.ncols();
        Point2::new(self.x_spline[(ir, itheta)], self.y_spline[(ir, itheta)])
    }

    /// The Jacobian of the pseudo-Cartesian coordinates with respect to the physical coordinates
    /// at the pole, approached along the ray of angle `theta`.
    ///
    /// At `r = 0` the spline derivatives `∂r` and `∂r∂θ` determine the first-order expansion of
    /// the mapping, which composed with the inverse circular mapping gives `∂(x, y)/∂(X, Y)`.
    fn center_jacobian_along(&self, theta: T) -> Matrix2<T> {
        let coord = LogicalCoordinate::new(T::zero(), theta);
        let first_order = Matrix2::new(
            self.evaluator.deriv_dim_1(coord, &self.x_spline),
            self.evaluator.deriv_1_and_2(coord, &self.x_spline),
            self.evaluator.deriv_dim_1(coord, &self.y_spline),
            self.evaluator.deriv_1_and_2(coord, &self.y_spline),
        );
        let (sin, cos) = theta.sin_cos();
        let circular = Matrix2::new(cos, sin, -sin, cos);
        first_order * circular
    }
}

impl<T: Real> CurvilinearToCartesian<T> for DiscreteToCartesian<T> {
    fn to_cartesian(&self, coord: &LogicalCoordinate<T>) -> Point2<T> {
        Point2::new(
            self.evaluator.evaluate(*coord, &self.x_spline),
            self.evaluator.evaluate(*coord, &self.y_spline),
        )
    }

    fn jacobian_matrix(&self, coord: &LogicalCoordinate<T>) -> Matrix2<T> {
        Matrix2::new(
            self.evaluator.deriv_dim_1(*coord, &self.x_spline),
            self.evaluator.deriv_dim_2(*coord, &self.x_spline),
            self.evaluator.deriv_dim_1(*coord, &self.y_spline),
            self.evaluator.deriv_dim_2(*coord, &self.y_spline),
        )
    }

    /// Averages the inverse center Jacobian over the angles of the interpolation grid.
    fn try_pseudo_cartesian_jacobian_center_matrix(&self) -> Result<Matrix2<T>, PolarError> {
        let threshold: T = convert(CENTER_JACOBIAN_THRESHOLD);
        let mut sum = Matrix2::zeros();
        for &theta in &self.interpolation_points_theta {
            let jacobian = self.center_jacobian_along(theta);
            let det = jacobian.determinant();
            if det.abs() < threshold {
                let theta = try_convert(theta).unwrap_or(f64::NAN);
                let determinant = try_convert(det).unwrap_or(f64::NAN);
                warn!(
                    "Pseudo-Cartesian Jacobian at the center is singular for theta = {theta} (det = {determinant:e})"
                );
                return Err(PolarError::NonInvertibleCenterJacobian { theta, determinant });
            }
            let adjugate = Matrix2::new(jacobian[(1, 1)], -jacobian[(0, 1)], -jacobian[(1, 0)], jacobian[(0, 0)]);
            sum += adjugate / det;
        }
        let count: T = convert(self.interpolation_points_theta.len() as f64);
        Ok(sum / count)
    }
}

/// Interpolates an analytical mapping onto 2D splines.
#[derive(Debug, Clone)]
pub struct DiscreteToCartesianBuilder<T: Real> {
    builder: SplineBuilder2D<T>,
}

impl<T: Real> DiscreteToCartesianBuilder<T> {
    pub fn new(builder: SplineBuilder2D<T>) -> Self {
        Self { builder }
    }

    /// A builder on a uniform grid of `ncells_r × ncells_theta` cells over the domain of
    /// `bsplines_r × bsplines_theta`, with the same degrees.
    ///
    /// Interpolating on a grid finer than the one of the unknowns keeps the mapping error below
    /// the discretization error of the solution. The mapping to interpolate may itself be discrete.
    ///
    /// ```
    /// # fn main() -> eyre::Result<()> {
    /// use polar_poisson::basis::BSplines;
    /// use polar_poisson::mapping::{CurvilinearToCartesian, CzarnyToCartesian, DiscreteToCartesianBuilder};
    /// use polar_poisson::LogicalCoordinate;
    /// use std::f64::consts::PI;
    ///
    /// let bsplines_r = BSplines::uniform(3, false, 0.0, 1.0, 8);
    /// let bsplines_theta = BSplines::uniform(3, true, 0.0, 2.0 * PI, 16);
    /// let refined = DiscreteToCartesianBuilder::refined(&bsplines_r, &bsplines_theta, 64, 128)?
    ///     .build(&CzarnyToCartesian::new(0.3, 1.4))?;
    /// let point = refined.to_cartesian(&LogicalCoordinate::new(0.5, 1.0));
    /// assert!(point.x.is_finite() && point.y.is_finite());
    /// # Ok(())
    /// # }
    /// ```
    pub fn refined(
        bsplines_r: &BSplines<T>,
        bsplines_theta: &BSplines<T>,
        ncells_r: usize,
        ncells_theta: usize,
    ) -> eyre::Result<Self> {
        for (bsplines, ncells) in [(bsplines_r, ncells_r), (bsplines_theta, ncells_theta)] {
            if ncells < bsplines.degree().max(1) {
                return Err(PolarError::precondition(format!(
                    "a refined grid of degree {} needs at least as many cells, got {ncells}",
                    bsplines.degree()
                ))
                .into());
            }
        }
        let refine = |bsplines: &BSplines<T>, ncells| {
            Arc::new(BSplines::uniform(
                bsplines.degree(),
                bsplines.is_periodic(),
                bsplines.rmin(),
                bsplines.rmax(),
                ncells,
            ))
        };
        let builder = SplineBuilder2D::new(refine(bsplines_r, ncells_r), refine(bsplines_theta, ncells_theta))?;
        Ok(Self::new(builder))
    }

    pub fn builder(&self) -> &SplineBuilder2D<T> {
        &self.builder
    }

    /// Interpolates `mapping` at the points of the interpolation grid.
    ///
    /// The resulting mapping extrapolates constantly beyond the outer radius.
    pub fn build(&self, mapping: &impl CurvilinearToCartesian<T>) -> eyre::Result<DiscreteToCartesian<T>> {
        let x_spline = self.builder.interpolate(|coord| mapping.to_cartesian(&coord).x)?;
        let y_spline = self.builder.interpolate(|coord| mapping.to_cartesian(&coord).y)?;
        let evaluator = SplineEvaluator2D::with_extrapolation(
            self.builder.bsplines_r().clone(),
            self.builder.bsplines_theta().clone(),
            ExtrapolationRule::Constant,
            ExtrapolationRule::Constant,
        );
        Ok(DiscreteToCartesian::new(
            x_spline,
            y_spline,
            evaluator,
            self.builder.interpolation_points_theta().to_vec(),
        ))
    }
}
