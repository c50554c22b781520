use crate::polar::{PolarBSplines, PolarSpline, MAX_SINGULAR, MAX_TENSOR_SUPPORT};
use crate::spline::ExtrapolationRule;
use crate::{ExecutionContext, LogicalCoordinate, Real};
use std::sync::Arc;

/// Selects the quantity computed by a [`PolarSplineEvaluator`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PolarDerivative {
    Value,
    DerivR,
    DerivTheta,
    DerivRTheta,
}

/// Evaluates polar splines and their logical derivatives.
///
/// Beyond the outer radius the spline is continued according to an [`ExtrapolationRule`].
#[derive(Debug, Clone)]
pub struct PolarSplineEvaluator<T: Real> {
    basis: Arc<PolarBSplines<T>>,
    outer: ExtrapolationRule,
}

impl<T: Real> PolarSplineEvaluator<T> {
    pub fn new(basis: Arc<PolarBSplines<T>>, outer: ExtrapolationRule) -> Self {
        Self { basis, outer }
    }

    pub fn basis(&self) -> &Arc<PolarBSplines<T>> {
        &self.basis
    }

    pub fn evaluate(&self, coord: LogicalCoordinate<T>, spline: &PolarSpline<T>) -> T {
        self.eval(coord, spline, PolarDerivative::Value)
    }

    pub fn deriv_dim_1(&self, coord: LogicalCoordinate<T>, spline: &PolarSpline<T>) -> T {
        self.eval(coord, spline, PolarDerivative::DerivR)
    }

    pub fn deriv_dim_2(&self, coord: LogicalCoordinate<T>, spline: &PolarSpline<T>) -> T {
        self.eval(coord, spline, PolarDerivative::DerivTheta)
    }

    pub fn deriv_1_and_2(&self, coord: LogicalCoordinate<T>, spline: &PolarSpline<T>) -> T {
        self.eval(coord, spline, PolarDerivative::DerivRTheta)
    }

    /// Evaluates `quantity` at every coordinate, in parallel.
    ///
    /// # Panics
    ///
    /// Panics if `coords` and `output` differ in length.
    pub fn evaluate_batch(
        &self,
        quantity: PolarDerivative,
        coords: &[LogicalCoordinate<T>],
        spline: &PolarSpline<T>,
        output: &mut [T],
        context: &ExecutionContext,
    ) {
        assert_eq!(
            coords.len(),
            output.len(),
            "Precondition violated: one output value per coordinate is required"
        );
        context.fill_indexed(output, |i| self.eval(coords[i], spline, quantity));
    }

    /// The integral of the spline over the logical domain.
    pub fn integrate(&self, spline: &PolarSpline<T>) -> T {
        let integrals = self.basis.integrals();
        integrals.singular.dot(&spline.singular) + integrals.tensor.dot(&spline.tensor)
    }

    fn eval(&self, coord: LogicalCoordinate<T>, spline: &PolarSpline<T>, quantity: PolarDerivative) -> T {
        let basis = &*self.basis;
        let rmax = basis.bsplines_r().rmax();
        let mut coord = coord;
        if coord.r > rmax {
            match (self.outer, quantity) {
                (ExtrapolationRule::Constant, PolarDerivative::Value | PolarDerivative::DerivTheta) => {
                    coord.r = rmax;
                }
                _ => return T::zero(),
            }
        }

        let n_singular = basis.n_singular();
        let tensor_len = basis.tensor_buffer_len();
        let mut singular = [T::zero(); MAX_SINGULAR];
        let mut tensor = [T::zero(); MAX_TENSOR_SUPPORT];
        let (singular, tensor) = (&mut singular[..n_singular], &mut tensor[..tensor_len]);
        let support = match quantity {
            PolarDerivative::Value => basis.eval_basis(&coord, singular, tensor),
            PolarDerivative::DerivR => basis.eval_deriv_r(&coord, singular, tensor),
            PolarDerivative::DerivTheta => basis.eval_deriv_theta(&coord, singular, tensor),
            PolarDerivative::DerivRTheta => basis.eval_deriv_r_and_theta(&coord, singular, tensor),
        };

        let mut sum = singular
            .iter()
            .zip(spline.singular.iter())
            .fold(T::zero(), |acc, (&value, &coef)| acc + value * coef);
        let n_rings = basis.n_rings();
        for i in 0..support.nr {
            for j in 0..support.ntheta {
                let (r, theta) = support.tensor_index(i, j);
                sum += spline.tensor[(r - n_rings, theta)] * tensor[i * support.ntheta + j];
            }
        }
        sum
    }
}
