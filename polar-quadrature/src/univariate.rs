//! Gauss-Legendre rules on `[-1, 1]` and on break-point sequences.

use crate::{Error, Rule};
use std::f64::consts::PI;

const MAX_NEWTON_ITERATIONS: usize = 100;

/// Evaluates the Legendre polynomial `P_n` and its derivative at `x`.
///
/// The derivative formula is singular at `|x| == 1`, so `x` must lie in the open interval `(-1, 1)`.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    // (m + 1) P_{m + 1}(x) = (2m + 1) x P_m(x) - m P_{m - 1}(x)
    let mut current = 1.0;
    let mut previous = 0.0;
    for m in 0..n {
        let m = m as f64;
        let next = ((2.0 * m + 1.0) * x * current - m * previous) / (m + 1.0);
        previous = current;
        current = next;
    }
    let derivative = n as f64 * (x * current - previous) / (x * x - 1.0);
    (current, derivative)
}

/// Gauss-Legendre rule with `num_points` points on the reference interval `[-1, 1]`.
///
/// Points are returned in ascending order. A rule with `n` points integrates polynomials of degree
/// up to `2 n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    let half = (n + 1) / 2;
    let mut points = vec![0.0; n];
    let mut weights = vec![0.0; n];

    for i in 0..half {
        // Tricomi's initial guess for the i-th largest root
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = legendre_with_derivative(n, x).1;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let (p, dp_new) = legendre_with_derivative(n, x);
            dp = dp_new;
            let dx = -p / dp;
            x += dx;
            if dx.abs() <= 1e-15 {
                dp = legendre_with_derivative(n, x).1;
                break;
            }
        }

        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        // Roots are found from the right end, mirror them onto the left half
        points[n - 1 - i] = x;
        points[i] = -x;
        weights[n - 1 - i] = w;
        weights[i] = w;
    }

    // The middle root of an odd rule is exactly zero
    if n % 2 == 1 {
        points[n / 2] = 0.0;
    }

    (weights, points)
}

/// Composite Gauss-Legendre rule with `points_per_cell` points on every cell `[breaks[i], breaks[i + 1]]`.
///
/// The points of cell `i` occupy the index range `i * points_per_cell .. (i + 1) * points_per_cell`
/// of the returned rule.
pub fn gauss_on_breaks(points_per_cell: usize, breaks: &[f64]) -> Result<Rule, Error> {
    if breaks.len() < 2 {
        return Err(Error::InvalidBreakPoints);
    }
    let ncells = breaks.len() - 1;
    let (ref_weights, ref_points) = gauss(points_per_cell);
    let mut weights = Vec::with_capacity(ncells * points_per_cell);
    let mut points = Vec::with_capacity(ncells * points_per_cell);
    for cell in breaks.windows(2) {
        let (a, b) = (cell[0], cell[1]);
        if !(a < b) {
            return Err(Error::InvalidBreakPoints);
        }
        let half_length = 0.5 * (b - a);
        let midpoint = 0.5 * (a + b);
        weights.extend(ref_weights.iter().map(|w| w * half_length));
        points.extend(ref_points.iter().map(|x| midpoint + half_length * x));
    }
    Ok((weights, points))
}
