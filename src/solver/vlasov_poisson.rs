use crate::mapping::{inverse_jacobian_matrix, CurvilinearToCartesian};
use crate::polar::{PolarDerivative, PolarSpline, PolarSplineEvaluator};
use crate::solver::{PolarSplineFemPoissonLikeSolver, SplineSource};
use crate::spline::{SplineBuilder2D, SplineEvaluator2D};
use crate::{ExecutionContext, LogicalCoordinate, Real};
use nalgebra::{convert, DMatrix, Matrix2, Vector2};
use numeric_literals::replace_float_literals;

/// Default radius below which the electric field is linearized around the pole.
pub const DEFAULT_POLE_EPSILON: f64 = 1e-12;

/// Cartesian components of a vector field sampled on the interpolation grid.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField<T: Real> {
    pub x: DMatrix<T>,
    pub y: DMatrix<T>,
}

impl<T: Real> VectorField<T> {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            x: DMatrix::zeros(nrows, ncols),
            y: DMatrix::zeros(nrows, ncols),
        }
    }
}

/// Computes the electrostatic potential and the electric field `E = -∇φ` from a charge density
/// sampled on the interpolation grid.
///
/// Away from the pole the field is
///
/// ```text
/// E = -J G⁻¹ (∂φ/∂r, ∂φ/∂θ)ᵀ,
/// ```
///
/// which cannot be evaluated at `r = 0`. For `r <= ε` the field is interpolated linearly in `r`
/// between its value at the pole and its value at `(ε, θ)`. The value at the pole is the Cartesian
/// gradient solving
///
/// ```text
/// ∂φ/∂r (0, θᵢ) = ∂x/∂r (0, θᵢ) ∂φ/∂x + ∂y/∂r (0, θᵢ) ∂φ/∂y
/// ```
///
/// for `θ₁ = π/4` and `θ₂ = 7π/4`.
#[derive(Debug)]
pub struct VlasovPoissonSolver<'a, T: Real, M: ?Sized> {
    mapping: &'a M,
    rhs_builder: &'a SplineBuilder2D<T>,
    rhs_evaluator: &'a SplineEvaluator2D<T>,
    poisson_solver: &'a PolarSplineFemPoissonLikeSolver<T>,
    epsilon: T,
}

impl<'a, T, M> VlasovPoissonSolver<'a, T, M>
where
    T: Real,
    M: CurvilinearToCartesian<T> + ?Sized,
{
    pub fn new(
        mapping: &'a M,
        rhs_builder: &'a SplineBuilder2D<T>,
        rhs_evaluator: &'a SplineEvaluator2D<T>,
        poisson_solver: &'a PolarSplineFemPoissonLikeSolver<T>,
    ) -> Self {
        Self {
            mapping,
            rhs_builder,
            rhs_evaluator,
            poisson_solver,
            epsilon: convert(DEFAULT_POLE_EPSILON),
        }
    }

    /// Sets the radius of the linearized region around the pole.
    ///
    /// # Panics
    ///
    /// Panics if `epsilon` is not positive.
    pub fn with_epsilon(self, epsilon: T) -> Self {
        assert!(epsilon > T::zero(), "the pole radius must be positive");
        Self { epsilon, ..self }
    }

    pub fn epsilon(&self) -> T {
        self.epsilon
    }

    /// The shape `(n_r, n_θ)` of the grid on which densities, potentials and fields are sampled.
    pub fn grid_shape(&self) -> (usize, usize) {
        self.rhs_builder.grid_shape()
    }

    /// Solves for the potential and the electric field at the points of the interpolation grid.
    ///
    /// Entry `(i, j)` of every matrix belongs to the grid point `(r_i, θ_j)`.
    ///
    /// # Panics
    ///
    /// Panics if an output does not have the shape of the grid, or if the radial derivatives of
    /// the mapping at the pole do not determine a Cartesian gradient.
    pub fn solve(
        &self,
        charge_density: &DMatrix<T>,
        potential: &mut DMatrix<T>,
        electric_field: &mut VectorField<T>,
        context: &ExecutionContext,
    ) -> eyre::Result<()> {
        let (nr, ntheta) = self.grid_shape();
        for (name, shape) in [
            ("potential", potential.shape()),
            ("electric field x", electric_field.x.shape()),
            ("electric field y", electric_field.y.shape()),
        ] {
            assert_eq!(
                shape,
                (nr, ntheta),
                "Precondition violated: {name} output does not match the grid"
            );
        }

        let density_spline = self.rhs_builder.build(charge_density)?;
        let source = SplineSource::new(self.rhs_evaluator, &density_spline);
        let phi = self.poisson_solver.solve_spline(&source, context)?;
        let evaluator = self.poisson_solver.evaluator();

        let coords = self.rhs_builder.interpolation_coordinates();
        let mut values = vec![T::zero(); coords.len()];
        evaluator.evaluate_batch(PolarDerivative::Value, &coords, &phi, &mut values, context);
        *potential = DMatrix::from_row_slice(nr, ntheta, &values);

        let pole_field = coords
            .iter()
            .any(|coord| coord.r <= self.epsilon)
            .then(|| self.field_at_pole(evaluator, &phi));
        let fields = context.map_collect(coords.len(), |i| {
            let coord = coords[i];
            match pole_field {
                Some(pole) if coord.r <= self.epsilon => {
                    let coord_epsilon = LogicalCoordinate::new(self.epsilon, coord.theta);
                    let at_epsilon = self.field_from_gradient(coord_epsilon, evaluator, &phi);
                    let weight = coord.r / self.epsilon;
                    pole * (T::one() - weight) + at_epsilon * weight
                }
                _ => self.field_from_gradient(coord, evaluator, &phi),
            }
        });
        for (idx, field) in fields.iter().enumerate() {
            let (i, j) = (idx / ntheta, idx % ntheta);
            electric_field.x[(i, j)] = field.x;
            electric_field.y[(i, j)] = field.y;
        }
        Ok(())
    }

    /// `-J G⁻¹ ∇φ` at a point away from the pole.
    fn field_from_gradient(
        &self,
        coord: LogicalCoordinate<T>,
        evaluator: &PolarSplineEvaluator<T>,
        phi: &PolarSpline<T>,
    ) -> Vector2<T> {
        let gradient = Vector2::new(evaluator.deriv_dim_1(coord, phi), evaluator.deriv_dim_2(coord, phi));
        let jacobian = self.mapping.jacobian_matrix(&coord);
        let inverse_metric = self.mapping.inverse_metric_tensor(&coord);
        let logical_field = -(inverse_metric.transpose() * gradient);
        jacobian * logical_field
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn field_at_pole(&self, evaluator: &PolarSplineEvaluator<T>, phi: &PolarSpline<T>) -> Vector2<T> {
        let theta1 = T::pi() / 4.0;
        let theta2 = -T::pi() / 4.0 + T::two_pi();
        let pole1 = LogicalCoordinate::new(0.0, theta1);
        let pole2 = LogicalCoordinate::new(0.0, theta2);

        let jacobian1 = self.mapping.jacobian_matrix(&pole1);
        let jacobian2 = self.mapping.jacobian_matrix(&pole2);
        let radial_derivatives = Matrix2::new(
            jacobian1[(0, 0)],
            jacobian1[(1, 0)],
            jacobian2[(0, 0)],
            jacobian2[(1, 0)],
        );
        let deriv_r = Vector2::new(evaluator.deriv_dim_1(pole1, phi), evaluator.deriv_dim_1(pole2, phi));
        let cartesian_gradient = inverse_jacobian_matrix(&radial_derivatives) * deriv_r;
        -cartesian_gradient
    }
}
