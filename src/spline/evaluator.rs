use crate::basis::{BSplines, BasisBuffer, MAX_DEGREE};
use crate::spline::Spline2D;
use crate::{ExecutionContext, LogicalCoordinate, Real};
use std::sync::Arc;

/// How a spline is continued outside the domain of a non-periodic basis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExtrapolationRule {
    /// The spline and all its derivatives vanish outside the domain.
    Null,
    /// The spline takes the value at the nearest boundary; derivatives across the boundary vanish.
    Constant,
}

#[derive(Debug, Copy, Clone)]
enum Order {
    Value,
    Deriv,
}

/// Evaluates 2D tensor-product splines on a radial and an angular basis.
///
/// Periodic directions wrap the coordinate. Outside the domain of a non-periodic direction the
/// lower and upper [`ExtrapolationRule`] apply.
#[derive(Debug, Clone)]
pub struct SplineEvaluator2D<T: Real> {
    bsplines_r: Arc<BSplines<T>>,
    bsplines_theta: Arc<BSplines<T>>,
    lower: ExtrapolationRule,
    upper: ExtrapolationRule,
}

impl<T: Real> SplineEvaluator2D<T> {
    /// An evaluator with [`ExtrapolationRule::Null`] on both sides.
    pub fn new(bsplines_r: Arc<BSplines<T>>, bsplines_theta: Arc<BSplines<T>>) -> Self {
        Self::with_extrapolation(bsplines_r, bsplines_theta, ExtrapolationRule::Null, ExtrapolationRule::Null)
    }

    pub fn with_extrapolation(
        bsplines_r: Arc<BSplines<T>>,
        bsplines_theta: Arc<BSplines<T>>,
        lower: ExtrapolationRule,
        upper: ExtrapolationRule,
    ) -> Self {
        Self {
            bsplines_r,
            bsplines_theta,
            lower,
            upper,
        }
    }

    pub fn bsplines_r(&self) -> &Arc<BSplines<T>> {
        &self.bsplines_r
    }

    pub fn bsplines_theta(&self) -> &Arc<BSplines<T>> {
        &self.bsplines_theta
    }

    /// The shape a coefficient matrix must have.
    pub fn coefficient_shape(&self) -> (usize, usize) {
        (self.bsplines_r.nbasis(), self.bsplines_theta.nbasis())
    }

    pub fn evaluate(&self, coord: LogicalCoordinate<T>, spline: &Spline2D<T>) -> T {
        self.eval(coord, spline, Order::Value, Order::Value)
    }

    /// The derivative with respect to the first (radial) coordinate.
    pub fn deriv_dim_1(&self, coord: LogicalCoordinate<T>, spline: &Spline2D<T>) -> T {
        self.eval(coord, spline, Order::Deriv, Order::Value)
    }

    /// The derivative with respect to the second (angular) coordinate.
    pub fn deriv_dim_2(&self, coord: LogicalCoordinate<T>, spline: &Spline2D<T>) -> T {
        self.eval(coord, spline, Order::Value, Order::Deriv)
    }

    /// The mixed second derivative.
    pub fn deriv_1_and_2(&self, coord: LogicalCoordinate<T>, spline: &Spline2D<T>) -> T {
        self.eval(coord, spline, Order::Deriv, Order::Deriv)
    }

    /// Evaluates the spline at every coordinate, in parallel.
    ///
    /// # Panics
    ///
    /// Panics if `coords` and `values` differ in length.
    pub fn evaluate_batch(
        &self,
        coords: &[LogicalCoordinate<T>],
        spline: &Spline2D<T>,
        values: &mut [T],
        context: &ExecutionContext,
    ) {
        assert_eq!(
            coords.len(),
            values.len(),
            "Precondition violated: one output value per coordinate is required"
        );
        context.fill_indexed(values, |i| self.evaluate(coords[i], spline));
    }

    /// The integral of the spline over the logical domain.
    pub fn integrate(&self, spline: &Spline2D<T>) -> T {
        self.check_shape(spline);
        let integrals_r = self.bsplines_r.integrals();
        let integrals_theta = self.bsplines_theta.integrals();
        let mut sum = T::zero();
        for (i, &int_r) in integrals_r.iter().enumerate() {
            for (j, &int_theta) in integrals_theta.iter().enumerate() {
                sum += spline[(i, j)] * int_r * int_theta;
            }
        }
        sum
    }

    fn check_shape(&self, spline: &Spline2D<T>) {
        assert_eq!(
            spline.shape(),
            self.coefficient_shape(),
            "Precondition violated: spline coefficients do not match the bases"
        );
    }

    /// Applies the extrapolation rules in one direction.
    ///
    /// Returns `None` if the spline vanishes, otherwise the coordinate to evaluate at and whether
    /// the coordinate was clamped to the boundary.
    fn extrapolate(&self, x: T, bsplines: &BSplines<T>) -> Option<(T, bool)> {
        if bsplines.is_periodic() {
            return Some((x, false));
        }
        let (rule, boundary) = if x < bsplines.rmin() {
            (self.lower, bsplines.rmin())
        } else if x > bsplines.rmax() {
            (self.upper, bsplines.rmax())
        } else {
            return Some((x, false));
        };
        match rule {
            ExtrapolationRule::Null => None,
            ExtrapolationRule::Constant => Some((boundary, true)),
        }
    }

    fn eval(&self, coord: LogicalCoordinate<T>, spline: &Spline2D<T>, order_r: Order, order_theta: Order) -> T {
        self.check_shape(spline);
        let Some((r, clamped_r)) = self.extrapolate(coord.r, &self.bsplines_r) else {
            return T::zero();
        };
        let Some((theta, clamped_theta)) = self.extrapolate(coord.theta, &self.bsplines_theta) else {
            return T::zero();
        };
        if (clamped_r && matches!(order_r, Order::Deriv)) || (clamped_theta && matches!(order_theta, Order::Deriv)) {
            return T::zero();
        }

        let mut values_r: BasisBuffer<T> = [T::zero(); MAX_DEGREE + 1];
        let mut values_theta: BasisBuffer<T> = [T::zero(); MAX_DEGREE + 1];
        let (nr, ntheta) = (self.bsplines_r.degree() + 1, self.bsplines_theta.degree() + 1);
        let jmin_r = eval_1d(&self.bsplines_r, r, order_r, &mut values_r[..nr]);
        let jmin_theta = eval_1d(&self.bsplines_theta, theta, order_theta, &mut values_theta[..ntheta]);

        let (nbasis_r, nbasis_theta) = self.coefficient_shape();
        let mut sum = T::zero();
        for (i, &vr) in values_r[..nr].iter().enumerate() {
            let row = (jmin_r + i) % nbasis_r;
            for (j, &vtheta) in values_theta[..ntheta].iter().enumerate() {
                sum += spline[(row, (jmin_theta + j) % nbasis_theta)] * vr * vtheta;
            }
        }
        sum
    }
}

fn eval_1d<T: Real>(bsplines: &BSplines<T>, x: T, order: Order, values: &mut [T]) -> usize {
    match order {
        Order::Value => bsplines.eval_basis(x, values),
        Order::Deriv => bsplines.eval_deriv(x, values),
    }
}
