use super::solver::polar_test_setup;
use polar_poisson::mapping::{CircularToCartesian, CzarnyToCartesian};
use polar_poisson::nalgebra::DMatrix;
use polar_poisson::solver::{PolarSplineFemPoissonLikeSolver, VectorField, VlasovPoissonSolver, DEFAULT_POLE_EPSILON};
use polar_poisson::spline::SplineEvaluator2D;
use polar_poisson::ExecutionContext;

use matrixcompare::assert_scalar_eq;

/// `φ = (1 - x² - y²)(x² - y²)` on the unit disk, with `-Δφ = 12 (x² - y²)`.
fn exact_field(x: f64, y: f64) -> (f64, f64) {
    let r2 = x * x + y * y;
    let d = x * x - y * y;
    let dphi_dx = 2.0 * x * (1.0 - r2) - 2.0 * x * d;
    let dphi_dy = -2.0 * y * (1.0 - r2) - 2.0 * y * d;
    (-dphi_dx, -dphi_dy)
}

#[test]
fn vlasov_poisson_solver_computes_potential_and_field_on_the_disk() {
    let mapping = CircularToCartesian::new();
    let setup = polar_test_setup(16, 32, 1, &mapping);
    let context = ExecutionContext::with_threads(2).unwrap();
    let builder = &setup.builder;
    let evaluator = SplineEvaluator2D::new(builder.bsplines_r().clone(), builder.bsplines_theta().clone());
    let poisson = PolarSplineFemPoissonLikeSolver::poisson(setup.basis.clone(), &mapping, &context).unwrap();
    let solver = VlasovPoissonSolver::new(&mapping, builder, &evaluator, &poisson);
    assert_eq!(solver.epsilon(), DEFAULT_POLE_EPSILON);

    let (nr, ntheta) = solver.grid_shape();
    let coords = builder.interpolation_coordinates();
    assert_eq!(coords[0].r, 0.0);
    let rho = DMatrix::from_fn(nr, ntheta, |i, j| {
        let c = coords[i * ntheta + j];
        12.0 * c.r * c.r * (2.0 * c.theta).cos()
    });
    let mut potential = DMatrix::zeros(nr, ntheta);
    let mut field = VectorField::zeros(nr, ntheta);
    solver.solve(&rho, &mut potential, &mut field, &context).unwrap();

    for (idx, c) in coords.iter().enumerate() {
        let (i, j) = (idx / ntheta, idx % ntheta);
        let (x, y) = (c.r * c.theta.cos(), c.r * c.theta.sin());
        let exact_potential = (1.0 - c.r * c.r) * (x * x - y * y);
        let (ex, ey) = exact_field(x, y);
        assert!(field.x[(i, j)].is_finite() && field.y[(i, j)].is_finite());
        assert_scalar_eq!(potential[(i, j)], exact_potential, comp = abs, tol = 1e-3);
        assert_scalar_eq!(field.x[(i, j)], ex, comp = abs, tol = 1e-2);
        assert_scalar_eq!(field.y[(i, j)], ey, comp = abs, tol = 1e-2);
    }
}

#[test]
fn field_at_the_pole_is_single_valued() {
    let mapping = CzarnyToCartesian::new(0.3, 1.4);
    let setup = polar_test_setup(8, 16, 1, &mapping);
    let context = ExecutionContext::serial().unwrap();
    let builder = &setup.builder;
    let evaluator = SplineEvaluator2D::new(builder.bsplines_r().clone(), builder.bsplines_theta().clone());
    let poisson = PolarSplineFemPoissonLikeSolver::poisson(setup.basis.clone(), &mapping, &context).unwrap();
    let solver = VlasovPoissonSolver::new(&mapping, builder, &evaluator, &poisson);

    let (nr, ntheta) = solver.grid_shape();
    let coords = builder.interpolation_coordinates();
    let rho = DMatrix::from_fn(nr, ntheta, |i, j| {
        let c = coords[i * ntheta + j];
        1.0 + c.r * c.theta.sin()
    });
    let mut potential = DMatrix::zeros(nr, ntheta);
    let mut field = VectorField::zeros(nr, ntheta);
    solver.solve(&rho, &mut potential, &mut field, &context).unwrap();

    for j in 1..ntheta {
        assert_scalar_eq!(potential[(0, j)], potential[(0, 0)], comp = abs, tol = 1e-12);
        assert_eq!(field.x[(0, j)], field.x[(0, 0)]);
        assert_eq!(field.y[(0, j)], field.y[(0, 0)]);
    }
    assert!(field.x.iter().chain(field.y.iter()).all(|v| v.is_finite()));
    // The potential vanishes on the outer boundary
    for j in 0..ntheta {
        assert_scalar_eq!(potential[(nr - 1, j)], 0.0, comp = abs, tol = 1e-14);
    }
}

#[test]
fn larger_pole_radius_blends_towards_the_pole_value() {
    let mapping = CircularToCartesian::new();
    let setup = polar_test_setup(16, 32, 1, &mapping);
    let context = ExecutionContext::serial().unwrap();
    let builder = &setup.builder;
    let evaluator = SplineEvaluator2D::new(builder.bsplines_r().clone(), builder.bsplines_theta().clone());
    let poisson = PolarSplineFemPoissonLikeSolver::poisson(setup.basis.clone(), &mapping, &context).unwrap();
    let epsilon = 0.1;
    let solver = VlasovPoissonSolver::new(&mapping, builder, &evaluator, &poisson).with_epsilon(epsilon);
    assert_eq!(solver.epsilon(), epsilon);

    let (nr, ntheta) = solver.grid_shape();
    let coords = builder.interpolation_coordinates();
    let rho = DMatrix::from_fn(nr, ntheta, |i, j| {
        let c = coords[i * ntheta + j];
        12.0 * c.r * c.r * (2.0 * c.theta).cos()
    });
    let mut potential = DMatrix::zeros(nr, ntheta);
    let mut field = VectorField::zeros(nr, ntheta);
    solver.solve(&rho, &mut potential, &mut field, &context).unwrap();

    // The exact field is linear in r close to the pole
    for (idx, c) in coords.iter().enumerate().filter(|(_, c)| c.r <= epsilon) {
        let (i, j) = (idx / ntheta, idx % ntheta);
        let (ex, ey) = exact_field(c.r * c.theta.cos(), c.r * c.theta.sin());
        assert_scalar_eq!(field.x[(i, j)], ex, comp = abs, tol = 0.5 * epsilon);
        assert_scalar_eq!(field.y[(i, j)], ey, comp = abs, tol = 0.5 * epsilon);
    }
}

#[test]
#[should_panic(expected = "the pole radius must be positive")]
fn vlasov_poisson_solver_rejects_non_positive_pole_radius() {
    let mapping = CircularToCartesian::new();
    let setup = polar_test_setup(4, 8, 1, &mapping);
    let context = ExecutionContext::serial().unwrap();
    let builder = &setup.builder;
    let evaluator = SplineEvaluator2D::new(builder.bsplines_r().clone(), builder.bsplines_theta().clone());
    let poisson = PolarSplineFemPoissonLikeSolver::poisson(setup.basis.clone(), &mapping, &context).unwrap();
    VlasovPoissonSolver::new(&mapping, builder, &evaluator, &poisson).with_epsilon(0.0);
}

#[test]
#[should_panic(expected = "Precondition violated: electric field y output does not match the grid")]
fn vlasov_poisson_solver_panics_on_wrong_output_shape() {
    let mapping = CircularToCartesian::new();
    let setup = polar_test_setup(4, 8, 1, &mapping);
    let context = ExecutionContext::serial().unwrap();
    let builder = &setup.builder;
    let evaluator = SplineEvaluator2D::new(builder.bsplines_r().clone(), builder.bsplines_theta().clone());
    let poisson = PolarSplineFemPoissonLikeSolver::poisson(setup.basis.clone(), &mapping, &context).unwrap();
    let solver = VlasovPoissonSolver::new(&mapping, builder, &evaluator, &poisson);

    let (nr, ntheta) = solver.grid_shape();
    let rho = DMatrix::zeros(nr, ntheta);
    let mut potential = DMatrix::zeros(nr, ntheta);
    let mut field = VectorField {
        x: DMatrix::zeros(nr, ntheta),
        y: DMatrix::zeros(nr, ntheta + 1),
    };
    let _ = solver.solve(&rho, &mut potential, &mut field, &context);
}

#[test]
fn vlasov_poisson_solver_rejects_density_of_wrong_shape() {
    let mapping = CircularToCartesian::new();
    let setup = polar_test_setup(4, 8, 1, &mapping);
    let context = ExecutionContext::serial().unwrap();
    let builder = &setup.builder;
    let evaluator = SplineEvaluator2D::new(builder.bsplines_r().clone(), builder.bsplines_theta().clone());
    let poisson = PolarSplineFemPoissonLikeSolver::poisson(setup.basis.clone(), &mapping, &context).unwrap();
    let solver = VlasovPoissonSolver::new(&mapping, builder, &evaluator, &poisson);

    let (nr, ntheta) = solver.grid_shape();
    let mut potential = DMatrix::zeros(nr, ntheta);
    let mut field = VectorField::zeros(nr, ntheta);
    let rho = DMatrix::zeros(nr + 1, ntheta);
    assert!(solver.solve(&rho, &mut potential, &mut field, &context).is_err());
}
