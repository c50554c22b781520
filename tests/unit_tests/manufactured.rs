use polar_poisson::manufactured::{
    CartesianSolution, CoefficientProfile, CurvilinearSolution, ManufacturedPoissonTest, PoissonSolution,
};
use polar_poisson::mapping::{CircularToCartesian, CurvilinearToCartesian, CzarnyToCartesian};
use polar_poisson::nalgebra::Vector2;
use polar_poisson::solver::SourceFunction;
use polar_poisson::LogicalCoordinate;
use std::f64::consts::PI;

use matrixcompare::{assert_matrix_eq, assert_scalar_eq};

const AMPLITUDE: f64 = 1e-4 * 4096.0;

fn coords() -> Vec<LogicalCoordinate<f64>> {
    let mut coords = Vec::new();
    for i in 1..10 {
        for j in 0..7 {
            coords.push(LogicalCoordinate::new(i as f64 / 10.0, 0.2 + j as f64 * 0.9));
        }
    }
    coords
}

fn fd_logical_gradient(solution: &impl PoissonSolution<f64>, coord: LogicalCoordinate<f64>) -> Vector2<f64> {
    let h = 1e-6;
    let at = |r, theta| solution.value(&LogicalCoordinate::new(r, theta));
    Vector2::new(
        (at(coord.r + h, coord.theta) - at(coord.r - h, coord.theta)) / (2.0 * h),
        (at(coord.r, coord.theta + h) - at(coord.r, coord.theta - h)) / (2.0 * h),
    )
}

#[test]
fn curvilinear_solution_vanishes_on_the_boundary_and_at_the_pole() {
    let solution = CurvilinearSolution::new(CzarnyToCartesian::new(0.3, 1.4));
    for theta in [0.0, 1.0, 3.0] {
        assert_eq!(solution.value(&LogicalCoordinate::new(1.0, theta)), 0.0);
        assert_eq!(solution.value(&LogicalCoordinate::new(0.0, theta)), 0.0);
        assert_eq!(solution.cartesian_gradient(&LogicalCoordinate::new(0.0, theta)), Vector2::zeros());
    }
    // The amplitude normalizes the radial profile to 1e-4 at r = 1/2
    let peak = solution.value(&LogicalCoordinate::new(0.5, 0.0));
    assert_scalar_eq!(peak, 1e-4, comp = abs, tol = 1e-16);
}

#[test]
fn manufactured_gradients_match_finite_differences() {
    let mapping = CzarnyToCartesian::new(0.3, 1.4);
    let curvilinear = CurvilinearSolution::new(mapping);
    let cartesian = CartesianSolution::new(mapping);
    for coord in coords() {
        let tol = 1e-8;
        assert_matrix_eq!(
            curvilinear.logical_gradient(&coord),
            fd_logical_gradient(&curvilinear, coord),
            comp = abs,
            tol = tol
        );
        assert_matrix_eq!(
            cartesian.logical_gradient(&coord),
            fd_logical_gradient(&cartesian, coord),
            comp = abs,
            tol = tol
        );
    }
}

#[test]
fn cartesian_gradients_are_pushed_forward_logical_gradients() {
    let mapping = CzarnyToCartesian::new(0.3, 1.4);
    let curvilinear = CurvilinearSolution::new(mapping);
    let cartesian = CartesianSolution::new(mapping);
    for coord in coords() {
        let inverse_transpose = mapping.inv_jacobian_matrix(&coord).transpose();
        for solution in [&curvilinear as &dyn PoissonSolution<f64>, &cartesian] {
            let expected = inverse_transpose * solution.logical_gradient(&coord);
            assert_matrix_eq!(solution.cartesian_gradient(&coord), expected, comp = abs, tol = 1e-12);
            assert_matrix_eq!(solution.electric_field(&coord), -expected, comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn cartesian_solution_gradient_at_the_pole() {
    let mapping = CzarnyToCartesian::new(0.3, 1.4);
    let solution = CartesianSolution::new(mapping);
    let pole = LogicalCoordinate::new(0.0, 1.2);
    let point = mapping.to_cartesian(&pole);
    let two_pi = 2.0 * PI;
    let expected = Vector2::new(
        -two_pi * (two_pi * point.x).sin() * (two_pi * point.y).sin(),
        two_pi * (two_pi * point.x).cos() * (two_pi * point.y).cos(),
    ) * AMPLITUDE;
    assert_matrix_eq!(solution.cartesian_gradient(&pole), expected, comp = abs, tol = 1e-14);

    // The gradient is continuous as the pole is approached
    let near = LogicalCoordinate::new(1e-8, 1.2);
    assert_matrix_eq!(solution.cartesian_gradient(&near), expected, comp = abs, tol = 1e-5);
}

#[test]
fn rhs_matches_the_analytical_laplacian_on_the_disk() {
    let mapping = CircularToCartesian::new();
    let test = ManufacturedPoissonTest::with_profile(
        mapping,
        CurvilinearSolution::new(mapping),
        CoefficientProfile::Poisson,
    );
    for coord in coords() {
        let r = coord.r;
        let f = r.powi(6) * (r - 1.0).powi(6);
        let df = 6.0 * r.powi(5) * (r - 1.0).powi(6) + 6.0 * r.powi(6) * (r - 1.0).powi(5);
        let d2f = 30.0 * r.powi(4) * (r - 1.0).powi(6)
            + 72.0 * r.powi(5) * (r - 1.0).powi(5)
            + 30.0 * r.powi(6) * (r - 1.0).powi(4);
        let expected = -AMPLITUDE * (d2f + df / r - 121.0 * f / (r * r)) * (11.0 * coord.theta).cos();
        assert_scalar_eq!(test.rhs(coord), expected, comp = abs, tol = 1e-8);
        assert_eq!(SourceFunction::evaluate(&test, coord), test.rhs(coord));
    }
}

#[test]
fn rhs_includes_the_coefficient_profile() {
    let mapping = CircularToCartesian::new();
    let profile = CoefficientProfile::Tanh {
        center: 0.5,
        width: 0.2,
    };
    let test = ManufacturedPoissonTest::with_profile(mapping, CurvilinearSolution::new(mapping), profile);
    for coord in coords() {
        let r = coord.r;
        let alpha = test.alpha(coord);
        let dalpha = -alpha * (1.0 - ((r - 0.5) / 0.2).tanh().powi(2)) / 0.2;
        let f = r.powi(6) * (r - 1.0).powi(6);
        let df = 6.0 * r.powi(5) * (r - 1.0).powi(6) + 6.0 * r.powi(6) * (r - 1.0).powi(5);
        let d2f = 30.0 * r.powi(4) * (r - 1.0).powi(6)
            + 72.0 * r.powi(5) * (r - 1.0).powi(5)
            + 30.0 * r.powi(6) * (r - 1.0).powi(4);
        let cos = (11.0 * coord.theta).cos();
        let divergence = alpha * (d2f + df / r - 121.0 * f / (r * r)) + dalpha * df;
        let expected = AMPLITUDE * cos * (-divergence + test.beta(coord) * f);
        assert_scalar_eq!(test.rhs(coord), expected, comp = abs, tol = 1e-8);
    }
}

#[test]
fn rhs_is_extrapolated_continuously_to_the_pole() {
    let mapping = CzarnyToCartesian::<f64>::new(0.3, 1.4);
    let test = ManufacturedPoissonTest::new(mapping, CartesianSolution::new(mapping));
    for theta in [0.0, 0.8, 2.5, 4.0] {
        let at_pole: f64 = test.rhs(LogicalCoordinate::new(0.0, theta));
        assert!(at_pole.is_finite());
        // sin(2πy) vanishes at the pole and so does every term of the Laplacian
        assert_scalar_eq!(at_pole, 0.0, comp = abs, tol = 1e-4);
        // ρ grows linearly away from the pole, with slope below 1e3
        for r in [1e-6, 1e-5] {
            let near_pole: f64 = test.rhs(LogicalCoordinate::new(r, theta));
            assert_scalar_eq!(at_pole, near_pole, comp = abs, tol = 1e3 * r + 1e-4);
        }
    }
    assert_eq!(test.potential(LogicalCoordinate::new(1.0, 0.3)), 0.0);
}

#[test]
fn coefficient_profiles() {
    let coord = LogicalCoordinate::new(0.3, 1.0);
    assert_eq!(CoefficientProfile::Poisson.alpha(&coord), 1.0);
    assert_eq!(CoefficientProfile::Poisson.beta(&coord), 0.0);

    let profile = CoefficientProfile::default();
    assert_eq!(
        profile,
        CoefficientProfile::Tanh {
            center: 0.7,
            width: 0.05
        }
    );
    for r in [0.0, 0.3, 0.7, 0.9, 1.0] {
        let coord = LogicalCoordinate::new(r, 0.0);
        assert_scalar_eq!(profile.alpha(&coord) * profile.beta(&coord), 1.0, comp = abs, tol = 1e-14);
    }
    assert_scalar_eq!(profile.alpha(&LogicalCoordinate::new(0.7, 0.0)), 1.0, comp = abs, tol = 1e-14);
    assert!(profile.alpha(&LogicalCoordinate::new(0.0, 0.0)) > profile.alpha(&LogicalCoordinate::new(1.0, 0.0)));
}

#[test]
fn coefficient_profiles_serialize_as_tagged_json() {
    let json = serde_json::to_string(&CoefficientProfile::Tanh {
        center: 0.5,
        width: 0.1,
    })
    .unwrap();
    assert_eq!(json, r#"{"Tanh":{"center":0.5,"width":0.1}}"#);
    let parsed: CoefficientProfile = serde_json::from_str(r#""Poisson""#).unwrap();
    assert_eq!(parsed, CoefficientProfile::Poisson);
}
