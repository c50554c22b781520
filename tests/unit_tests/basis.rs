use polar_poisson::basis::{BSplines, CartesianToBarycentric, TriangularBernsteinBasis, UniformLagrangeBasis};
use polar_poisson::nalgebra::Point2;
use std::f64::consts::PI;

use proptest::prelude::*;

use matrixcompare::assert_scalar_eq;
use util::assert_panics;

fn non_uniform_breaks() -> Vec<f64> {
    vec![0.0, 0.1, 0.25, 0.3, 0.5, 0.65, 0.8, 0.95, 1.0]
}

fn bsplines_variants() -> Vec<BSplines<f64>> {
    let mut variants = Vec::new();
    for degree in 1..=5 {
        for periodic in [false, true] {
            variants.push(BSplines::uniform(degree, periodic, 0.0, 1.0, 10));
            variants.push(BSplines::non_uniform(degree, periodic, &non_uniform_breaks()));
        }
    }
    variants
}

#[test]
fn bsplines_basis_counts() {
    let open = BSplines::<f64>::uniform(3, false, 0.0, 1.0, 8);
    assert_eq!(open.nbasis(), 11);
    assert_eq!(open.ncells(), 8);
    assert!(open.is_uniform());

    let periodic = BSplines::<f64>::uniform(3, true, 0.0, 2.0 * PI, 8);
    assert_eq!(periodic.nbasis(), 8);
    assert!(periodic.is_periodic());

    let non_uniform = BSplines::non_uniform(2, false, &non_uniform_breaks());
    assert!(!non_uniform.is_uniform());
    assert_eq!(non_uniform.nbasis(), 10);
}

#[test]
fn bsplines_knots_are_padded() {
    let open = BSplines::non_uniform(2, false, &non_uniform_breaks());
    assert_eq!(open.knot(-2), 0.0);
    assert_eq!(open.knot(-1), 0.0);
    assert_eq!(open.knot(9), 1.0);
    assert_eq!(open.knot(10), 1.0);

    let periodic = BSplines::non_uniform(2, true, &non_uniform_breaks());
    assert_scalar_eq!(periodic.knot(-1), 0.95 - 1.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(periodic.knot(-2), 0.8 - 1.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(periodic.knot(9), 1.1, comp = abs, tol = 1e-15);
    assert_scalar_eq!(periodic.knot(10), 1.25, comp = abs, tol = 1e-15);
}

#[test]
fn bsplines_find_cell_assigns_upper_end_to_last_cell() {
    let bsplines = BSplines::non_uniform(3, false, &non_uniform_breaks());
    assert_eq!(bsplines.find_cell(0.0), 0);
    assert_eq!(bsplines.find_cell(0.1), 1);
    assert_eq!(bsplines.find_cell(0.29), 2);
    assert_eq!(bsplines.find_cell(0.97), 7);
    assert_eq!(bsplines.find_cell(1.0), 7);
}

#[test]
fn bsplines_eval_reports_first_function() {
    let bsplines = BSplines::<f64>::uniform(3, false, 0.0, 1.0, 4);
    let mut values = [0.0; 4];
    assert_eq!(bsplines.eval_basis(0.0, &mut values), 0);
    for (value, expected) in values.iter().zip([1.0, 0.0, 0.0, 0.0]) {
        assert_scalar_eq!(*value, expected, comp = abs, tol = 1e-15);
    }
    assert_eq!(bsplines.eval_basis(0.6, &mut values), 2);
    assert_eq!(bsplines.eval_basis(1.0, &mut values), 3);
    assert_scalar_eq!(values[3], 1.0, comp = abs, tol = 1e-15);
}

#[test]
fn bsplines_periodic_evaluation_wraps() {
    let bsplines = BSplines::<f64>::uniform(3, true, 0.0, 2.0 * PI, 12);
    let mut values = [0.0; 4];
    let mut shifted = [0.0; 4];
    let jmin = bsplines.eval_basis(0.3, &mut values);
    let jmin_shifted = bsplines.eval_basis(0.3 + 2.0 * PI, &mut shifted);
    let jmin_negative = bsplines.eval_basis(0.3 - 4.0 * PI, &mut shifted);
    assert_eq!(jmin, jmin_shifted);
    assert_eq!(jmin, jmin_negative);
    for (a, b) in values.iter().zip(&shifted) {
        assert_scalar_eq!(*a, *b, comp = abs, tol = 1e-13);
    }
}

#[test]
fn bsplines_derivative_matches_finite_difference() {
    let h = 1e-6;
    for bsplines in bsplines_variants() {
        let n = bsplines.degree() + 1;
        for &x in &[0.13, 0.42, 0.77] {
            let mut derivs = vec![0.0; n];
            let mut plus = vec![0.0; n];
            let mut minus = vec![0.0; n];
            let jmin = bsplines.eval_deriv(x, &mut derivs);
            assert_eq!(bsplines.eval_basis(x + h, &mut plus), jmin);
            assert_eq!(bsplines.eval_basis(x - h, &mut minus), jmin);
            for k in 0..n {
                let fd = (plus[k] - minus[k]) / (2.0 * h);
                assert_scalar_eq!(derivs[k], fd, comp = abs, tol = 1e-5 * (1.0 + fd.abs()));
            }
        }
    }
}

#[test]
fn bsplines_integrals_sum_to_domain_length() {
    for bsplines in bsplines_variants() {
        let total: f64 = bsplines.integrals().iter().sum();
        assert_scalar_eq!(total, 1.0, comp = abs, tol = 1e-14);
    }
}

#[test]
fn bsplines_greville_points() {
    let open = BSplines::<f64>::uniform(3, false, 0.0, 1.0, 4);
    let points = open.greville_points();
    assert_eq!(points.len(), open.nbasis());
    assert_eq!(points[0], 0.0);
    assert_scalar_eq!(points[6], 1.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(points[1], 0.25 / 3.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(points[3], 0.5, comp = abs, tol = 1e-15);

    let periodic = BSplines::<f64>::uniform(3, true, 0.0, 1.0, 5);
    let points = periodic.greville_points();
    assert_eq!(points.len(), 5);
    assert!(points.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(points.iter().all(|&x| (0.0..1.0).contains(&x)));
}

#[test]
fn bsplines_reject_wrong_buffer_size() {
    let bsplines = BSplines::<f64>::uniform(3, false, 0.0, 1.0, 4);
    assert_panics!({
        let mut values = [0.0; 3];
        bsplines.eval_basis(0.5, &mut values)
    });
    assert_panics!({
        let mut values = [0.0; 4];
        bsplines.eval_basis(1.5, &mut values)
    });
}

#[test]
fn bsplines_reject_too_few_breaks() {
    assert_panics!(BSplines::non_uniform(3, false, &[0.0, 0.5, 1.0]));
    assert_panics!(BSplines::non_uniform(1, false, &[0.0, 0.5, 0.4, 1.0]));
}

#[test]
fn lagrange_kronecker_delta_at_knots() {
    for degree in 1..=6 {
        for periodic in [false, true] {
            let basis = UniformLagrangeBasis::new(degree, periodic, -1.0, 2.0, 12);
            let mut values = vec![0.0; degree + 1];
            for i in 0..=12 {
                let x = basis.knot(i);
                let start = basis.eval_basis(x, &mut values);
                for (k, &value) in values.iter().enumerate() {
                    let expected = if start + k as isize == i as isize
                        || (periodic && i == 12 && start + k as isize == 0)
                    {
                        1.0
                    } else {
                        0.0
                    };
                    assert_scalar_eq!(value, expected, comp = abs, tol = 1e-12);
                }
            }
        }
    }
}

#[test]
fn lagrange_reproduces_polynomials() {
    let degree = 4;
    let basis = UniformLagrangeBasis::new(degree, false, 0.0, 1.0, 8);
    let p = |x: f64| 1.0 - 2.0 * x + 3.0 * x.powi(3) - x.powi(4);
    let mut values = vec![0.0; degree + 1];
    for &x in &[0.01, 0.33, 0.5, 0.71, 0.99] {
        let start = basis.eval_basis(x, &mut values);
        let interpolated: f64 = values
            .iter()
            .enumerate()
            .map(|(k, &v)| v * p(basis.knot(start + k as isize)))
            .sum();
        assert_scalar_eq!(interpolated, p(x), comp = abs, tol = 1e-12);
    }
}

#[test]
fn lagrange_open_stencil_stays_inside_the_domain() {
    let basis = UniformLagrangeBasis::new(3, false, 0.0, 1.0, 6);
    assert_eq!(basis.poly_start(0.0), 0);
    assert_eq!(basis.poly_start(0.99), 3);
    assert_eq!(basis.poly_start(1.0), 3);
}

#[test]
fn lagrange_rejects_wrong_buffer_size() {
    let basis = UniformLagrangeBasis::new(3, true, 0.0, 1.0, 6);
    assert_panics!({
        let mut values = [0.0; 5];
        basis.eval_basis(0.5, &mut values)
    });
}

#[test]
fn bernstein_basis_on_corners() {
    let triangle = CartesianToBarycentric::new(
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 0.0),
        Point2::new(0.0, 1.0),
    );
    let bernstein = TriangularBernsteinBasis::new(1, triangle);
    assert_eq!(bernstein.nbasis(), 3);
    let mut values = [0.0; 3];
    bernstein.eval_basis(&Point2::new(0.25, 0.25), &mut values);
    let total: f64 = values.iter().sum();
    assert_scalar_eq!(total, 1.0, comp = abs, tol = 1e-14);
    for corner in bernstein.triangle().corners() {
        bernstein.eval_basis(corner, &mut values);
        assert_eq!(values.iter().filter(|&&v| (v - 1.0).abs() < 1e-14).count(), 1);
        assert_eq!(values.iter().filter(|&&v| v.abs() < 1e-14).count(), 2);
    }
}

proptest! {
    #[test]
    fn bsplines_partition_of_unity(x in 0.0f64 ..= 1.0, degree in 0usize ..= 6, periodic: bool, uniform: bool) {
        let bsplines = if uniform {
            BSplines::uniform(degree, periodic, 0.0, 1.0, 9)
        } else {
            BSplines::non_uniform(degree, periodic, &non_uniform_breaks())
        };
        let mut values = vec![0.0; degree + 1];
        bsplines.eval_basis(x, &mut values);
        let sum: f64 = values.iter().sum();
        prop_assert!((sum - 1.0).abs() <= 1e-15 * (degree + 1) as f64);
        prop_assert!(values.iter().all(|&v| v >= -1e-15));
    }

    #[test]
    fn bsplines_derivatives_sum_to_zero(x in 0.0f64 ..= 1.0, degree in 1usize ..= 6, periodic: bool) {
        let bsplines = BSplines::non_uniform(degree, periodic, &non_uniform_breaks());
        let mut derivs = vec![0.0; degree + 1];
        bsplines.eval_deriv(x, &mut derivs);
        let sum: f64 = derivs.iter().sum();
        prop_assert!(sum.abs() <= 1e-10);
    }

    #[test]
    fn lagrange_partition_of_unity(x in -3.0f64 ..= 3.0, degree in 1usize ..= 7, periodic: bool) {
        let basis = UniformLagrangeBasis::new(degree, periodic, -1.0, 2.0, 10);
        // Open bases extrapolate outside the domain, so only sample inside it
        let x = if periodic { x } else { x.clamp(-1.0, 2.0) };
        let mut values = vec![0.0; degree + 1];
        basis.eval_basis(x, &mut values);
        let sum: f64 = values.iter().sum();
        prop_assert!((sum - 1.0).abs() <= 1e-12);
    }

    #[test]
    fn bernstein_partition_of_unity(x in -0.5f64 ..= 0.5, y in -0.5f64 ..= 0.5, degree in 0usize ..= 2) {
        let triangle = CartesianToBarycentric::new(
            Point2::new(1.0, 0.0),
            Point2::new(-0.5, 0.866),
            Point2::new(-0.5, -0.866),
        );
        let bernstein = TriangularBernsteinBasis::new(degree, triangle);
        let mut values = vec![0.0; bernstein.nbasis()];
        bernstein.eval_basis(&Point2::new(x, y), &mut values);
        let sum: f64 = values.iter().sum();
        prop_assert!((sum - 1.0).abs() <= 1e-12);
    }
}
