use polar_poisson::basis::BSplines;
use polar_poisson::mapping::{
    try_inverse_jacobian_matrix, CircularToCartesian, CurvilinearToCartesian, CzarnyToCartesian,
    DiscreteToCartesianBuilder,
};
use polar_poisson::nalgebra::{Matrix2, Point2};
use polar_poisson::spline::SplineBuilder2D;
use polar_poisson::{LogicalCoordinate, PolarError};
use std::f64::consts::PI;
use std::sync::Arc;

use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use proptest::prelude::*;
use util::assert_panics;

fn czarny() -> CzarnyToCartesian<f64> {
    CzarnyToCartesian::new(0.3, 1.4)
}

fn fd_jacobian(mapping: &impl CurvilinearToCartesian<f64>, coord: LogicalCoordinate<f64>) -> Matrix2<f64> {
    let h = 1e-6;
    let at = |r, theta| mapping.to_cartesian(&LogicalCoordinate::new(r, theta));
    let d_r = (at(coord.r + h, coord.theta) - at(coord.r - h, coord.theta)) / (2.0 * h);
    let d_theta = (at(coord.r, coord.theta + h) - at(coord.r, coord.theta - h)) / (2.0 * h);
    Matrix2::new(d_r.x, d_theta.x, d_r.y, d_theta.y)
}

fn builder(nr: usize, ntheta: usize) -> SplineBuilder2D<f64> {
    let bsplines_r = Arc::new(BSplines::uniform(3, false, 0.0, 1.0, nr));
    let bsplines_theta = Arc::new(BSplines::uniform(3, true, 0.0, 2.0 * PI, ntheta));
    SplineBuilder2D::new(bsplines_r, bsplines_theta).unwrap()
}

#[test]
fn circular_mapping_basic_values() {
    let mapping = CircularToCartesian::new();
    let coord = LogicalCoordinate::new(0.5, PI / 2.0);
    let point = mapping.to_cartesian(&coord);
    assert_scalar_eq!(point.x, 0.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(point.y, 0.5, comp = abs, tol = 1e-15);
    assert_scalar_eq!(mapping.jacobian(&coord), 0.5, comp = abs, tol = 1e-15);
    assert_matrix_eq!(mapping.pseudo_cartesian_jacobian_center_matrix(), Matrix2::identity());

    let shifted = CircularToCartesian::with_center(Point2::new(1.0, -2.0));
    let logical = shifted.to_logical(&Point2::new(1.0, -3.0));
    assert_scalar_eq!(logical.r, 1.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(logical.theta, 1.5 * PI, comp = abs, tol = 1e-14);
}

#[test]
fn analytical_jacobians_match_finite_differences() {
    let coords = [
        LogicalCoordinate::new(0.1, 0.0),
        LogicalCoordinate::new(0.5, 1.3),
        LogicalCoordinate::new(0.9, 3.5),
        LogicalCoordinate::new(1.0, 5.9),
    ];
    for coord in coords {
        let circular = CircularToCartesian::new();
        assert_matrix_eq!(circular.jacobian_matrix(&coord), fd_jacobian(&circular, coord), comp = abs, tol = 1e-8);
        let czarny = czarny();
        let jacobian = czarny.jacobian_matrix(&coord);
        assert_matrix_eq!(jacobian, fd_jacobian(&czarny, coord), comp = abs, tol = 1e-8);
        assert_scalar_eq!(czarny.jacobian(&coord), jacobian.determinant(), comp = abs, tol = 1e-12);
    }
}

#[test]
fn mappings_panic_on_inverse_jacobian_at_the_pole() {
    let pole = LogicalCoordinate::new(0.0, 0.7);
    assert_panics!(CircularToCartesian::<f64>::new().inv_jacobian_matrix(&pole));
    assert_panics!(czarny().inv_jacobian_matrix(&pole));
    assert_panics!(czarny().inverse_metric_tensor(&pole));

    let result = try_inverse_jacobian_matrix(&czarny().jacobian_matrix(&pole));
    assert!(matches!(result, Err(PolarError::SingularJacobian { .. })));
}

#[test]
fn czarny_center_matrix_has_closed_form() {
    let (epsilon, e) = (0.3, 1.4);
    let mapping = CzarnyToCartesian::new(epsilon, e);
    let xi = 1.0 / (1.0 - epsilon * epsilon / 4.0f64).sqrt();
    let root = (1.0 + epsilon * epsilon).sqrt();
    let expected = Matrix2::new(-root, 0.0, 0.0, (2.0 - root) / (e * xi));
    assert_matrix_eq!(mapping.pseudo_cartesian_jacobian_center_matrix(), expected, comp = abs, tol = 1e-14);
}

#[test]
fn czarny_to_logical_inverts_to_cartesian() {
    let mapping = czarny();
    for k in 0..40 {
        let coord = LogicalCoordinate::new(0.05 + 0.9 * k as f64 / 39.0, 2.0 * PI * k as f64 / 40.0 + 0.01);
        let logical = mapping.to_logical(&mapping.to_cartesian(&coord));
        assert_scalar_eq!(logical.r, coord.r, comp = abs, tol = 1e-12);
        assert_scalar_eq!(logical.theta, coord.theta, comp = abs, tol = 1e-12);
    }
}

#[test]
#[should_panic(expected = "epsilon must lie in (0, 2)")]
fn czarny_rejects_invalid_epsilon() {
    CzarnyToCartesian::new(2.5, 1.0);
}

#[test]
fn discrete_mapping_approximates_the_analytical_mapping() {
    let mapping = czarny();
    let discrete = DiscreteToCartesianBuilder::new(builder(16, 32)).build(&mapping).unwrap();
    for k in 0..25 {
        let coord = LogicalCoordinate::new(k as f64 / 24.0, 0.37 * k as f64);
        let exact = mapping.to_cartesian(&coord);
        let approx = discrete.to_cartesian(&coord);
        assert_scalar_eq!(approx.x, exact.x, comp = abs, tol = 1e-4);
        assert_scalar_eq!(approx.y, exact.y, comp = abs, tol = 1e-4);
        assert_matrix_eq!(
            discrete.jacobian_matrix(&coord),
            mapping.jacobian_matrix(&coord),
            comp = abs,
            tol = 1e-2
        );
    }
}

#[test]
fn refined_discrete_mapping_is_more_accurate_than_the_coarse_one() {
    let mapping = czarny();
    let coarse_builder = builder(4, 8);
    let coarse = DiscreteToCartesianBuilder::new(coarse_builder.clone()).build(&mapping).unwrap();
    let refined_builder =
        DiscreteToCartesianBuilder::refined(coarse_builder.bsplines_r(), coarse_builder.bsplines_theta(), 32, 64)
            .unwrap();
    assert_eq!(refined_builder.builder().bsplines_r().ncells(), 32);
    assert_eq!(refined_builder.builder().bsplines_theta().ncells(), 64);
    assert!(refined_builder.builder().bsplines_theta().is_periodic());
    assert_eq!(refined_builder.builder().bsplines_r().degree(), 3);
    let refined = refined_builder.build(&mapping).unwrap();

    let max_error = |discrete: &dyn Fn(&LogicalCoordinate<f64>) -> Point2<f64>| {
        (0..50)
            .map(|k| {
                let coord = LogicalCoordinate::new(k as f64 / 49.0, 0.37 * k as f64);
                (discrete(&coord) - mapping.to_cartesian(&coord)).amax()
            })
            .fold(0.0, f64::max)
    };
    let coarse_error = max_error(&|c: &LogicalCoordinate<f64>| coarse.to_cartesian(c));
    let refined_error = max_error(&|c: &LogicalCoordinate<f64>| refined.to_cartesian(c));
    assert!(refined_error < 1e-4);
    assert!(refined_error < 0.05 * coarse_error);

    // Refining a discrete mapping reproduces it up to the interpolation error
    let re_refined = refined_builder.build(&coarse).unwrap();
    for k in 0..25 {
        let coord = LogicalCoordinate::new(k as f64 / 24.0, 0.9 * k as f64);
        let expected = coarse.to_cartesian(&coord);
        let actual = re_refined.to_cartesian(&coord);
        assert_scalar_eq!(actual.x, expected.x, comp = abs, tol = 1e-3);
        assert_scalar_eq!(actual.y, expected.y, comp = abs, tol = 1e-3);
    }
}

#[test]
fn refined_discrete_mapping_rejects_too_few_cells() {
    let coarse = builder(4, 8);
    let result = DiscreteToCartesianBuilder::refined(coarse.bsplines_r(), coarse.bsplines_theta(), 2, 64);
    assert!(matches!(
        result.map(|_| ()).unwrap_err().downcast_ref::<PolarError>(),
        Some(PolarError::PreconditionViolation { .. })
    ));
}

#[test]
fn discrete_mapping_control_points_collapse_at_the_pole() {
    let mapping = czarny();
    let discrete = DiscreteToCartesianBuilder::new(builder(8, 16)).build(&mapping).unwrap();
    let center = mapping.to_cartesian(&LogicalCoordinate::new(0.0, 0.0));
    for itheta in 0..16 {
        let point = discrete.control_point(0, itheta);
        assert_scalar_eq!(point.x, center.x, comp = abs, tol = 1e-12);
        assert_scalar_eq!(point.y, center.y, comp = abs, tol = 1e-12);
    }
    assert_eq!(discrete.control_point(3, 17), discrete.control_point(3, 1));
}

#[test]
fn discrete_mapping_extrapolates_constantly_beyond_the_outer_radius() {
    let discrete = DiscreteToCartesianBuilder::new(builder(8, 16))
        .build(&CircularToCartesian::new())
        .unwrap();
    let boundary = discrete.to_cartesian(&LogicalCoordinate::new(1.0, 0.3));
    let outside = discrete.to_cartesian(&LogicalCoordinate::new(1.2, 0.3));
    assert_scalar_eq!(outside.x, boundary.x, comp = abs, tol = 1e-14);
    assert_scalar_eq!(outside.y, boundary.y, comp = abs, tol = 1e-14);
}

#[test]
fn discrete_center_matrix_approaches_analytical_value() {
    let builder = builder(32, 64);
    let circular = DiscreteToCartesianBuilder::new(builder.clone())
        .build(&CircularToCartesian::new())
        .unwrap();
    assert_matrix_eq!(
        circular.pseudo_cartesian_jacobian_center_matrix(),
        Matrix2::identity(),
        comp = abs,
        tol = 1e-3
    );

    let mapping = czarny();
    let discrete = DiscreteToCartesianBuilder::new(builder).build(&mapping).unwrap();
    assert_matrix_eq!(
        discrete.pseudo_cartesian_jacobian_center_matrix(),
        mapping.pseudo_cartesian_jacobian_center_matrix(),
        comp = abs,
        tol = 1e-3
    );
}

#[test]
fn degenerate_discrete_mapping_reports_non_invertible_center() {
    let discrete = DiscreteToCartesianBuilder::new(builder(4, 8))
        .build(&ConstantMapping)
        .unwrap();
    let result = discrete.try_pseudo_cartesian_jacobian_center_matrix();
    assert!(matches!(result, Err(PolarError::NonInvertibleCenterJacobian { .. })));
}

#[derive(Debug)]
struct ConstantMapping;

impl CurvilinearToCartesian<f64> for ConstantMapping {
    fn to_cartesian(&self, _coord: &LogicalCoordinate<f64>) -> Point2<f64> {
        Point2::new(0.5, -0.5)
    }

    fn jacobian_matrix(&self, _coord: &LogicalCoordinate<f64>) -> Matrix2<f64> {
        Matrix2::zeros()
    }

    fn try_pseudo_cartesian_jacobian_center_matrix(&self) -> Result<Matrix2<f64>, PolarError> {
        Err(PolarError::precondition("constant mapping"))
    }
}

proptest! {
    #[test]
    fn metric_tensor_times_inverse_is_identity(r in 0.01f64..1.0, theta in 0.0..2.0 * PI) {
        let coord = LogicalCoordinate::new(r, theta);
        let circular = CircularToCartesian::new();
        let czarny = czarny();
        let identity = Matrix2::<f64>::identity();
        assert_matrix_eq!(
            circular.metric_tensor(&coord) * circular.inverse_metric_tensor(&coord),
            identity,
            comp = abs,
            tol = 1e-10
        );
        assert_matrix_eq!(
            czarny.metric_tensor(&coord) * czarny.inverse_metric_tensor(&coord),
            identity,
            comp = abs,
            tol = 1e-10
        );
        assert_matrix_eq!(
            czarny.jacobian_matrix(&coord) * czarny.inv_jacobian_matrix(&coord),
            identity,
            comp = abs,
            tol = 1e-10
        );
    }

    #[test]
    fn circular_to_logical_inverts_to_cartesian(r in 0.01f64..1.0, theta in 0.0..2.0 * PI) {
        let mapping = CircularToCartesian::new();
        let logical = mapping.to_logical(&mapping.to_cartesian(&LogicalCoordinate::new(r, theta)));
        prop_assert!((logical.r - r).abs() < 1e-12);
        let dtheta = (logical.theta - theta).abs();
        prop_assert!(dtheta < 1e-10 || (dtheta - 2.0 * PI).abs() < 1e-10);
    }
}
