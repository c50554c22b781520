use crate::basis::{check_output_len, floor_index, MAX_DEGREE};
use crate::{wrap_periodic, Real};
use nalgebra::convert;
use numeric_literals::replace_float_literals;

/// Lagrange polynomials of degree `D` on a uniform grid, evaluated in barycentric form.
///
/// Every evaluation uses a stencil of `D + 1` consecutive knots. For a periodic grid the knots are
/// extended by `D - 1` on each side, so that a centered stencil is always available; for an open
/// grid the stencil is shifted inwards near the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformLagrangeBasis<T> {
    degree: usize,
    periodic: bool,
    rmin: T,
    rmax: T,
    ncells: usize,
    step: T,
    weights: Vec<T>,
}

impl<T: Real> UniformLagrangeBasis<T> {
    /// # Panics
    ///
    /// Panics if the degree is zero or exceeds [`MAX_DEGREE`], if `rmin >= rmax`, or if there are
    /// fewer cells than the degree.
    pub fn new(degree: usize, periodic: bool, rmin: T, rmax: T, ncells: usize) -> Self {
        assert!(degree > 0, "degree must be positive");
        assert!(
            degree <= MAX_DEGREE,
            "degree {degree} exceeds the maximum supported degree {MAX_DEGREE}"
        );
        assert!(rmin < rmax, "the domain must be non-empty");
        assert!(ncells >= degree, "at least degree = {degree} cells are required");

        let step = (rmax - rmin) / convert::<f64, T>(ncells as f64);

        // Barycentric weights w_i = 1 / (dx * prod_{j != i} (i - j))
        let weights = (0..=degree as i64)
            .map(|i| {
                let product = (0..=degree as i64)
                    .filter(|&j| j != i)
                    .fold(step, |acc, j| acc * convert::<f64, T>((i - j) as f64));
                T::one() / product
            })
            .collect();

        Self {
            degree,
            periodic,
            rmin,
            rmax,
            ncells,
            step,
            weights,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub fn ncells(&self) -> usize {
        self.ncells
    }

    pub fn step(&self) -> T {
        self.step
    }

    pub fn rmin(&self) -> T {
        self.rmin
    }

    pub fn rmax(&self) -> T {
        self.rmax
    }

    /// The coordinate of knot `i`. Periodic grids accept `-(D - 1) ..= ncells + D - 1`.
    pub fn knot(&self, i: isize) -> T {
        let padding = if self.periodic { self.degree as isize - 1 } else { 0 };
        assert!(
            i >= -padding && i <= self.ncells as isize + padding,
            "knot index {i} is out of bounds"
        );
        self.rmin + self.step * convert::<f64, T>(i as f64)
    }

    /// The index of the first knot of the stencil used to evaluate at `x`.
    pub fn poly_start(&self, x: T) -> isize {
        let x = if self.periodic {
            wrap_periodic(x, self.rmin, self.rmax - self.rmin)
        } else {
            x
        };
        let last_cell = self.ncells as isize - 1;
        let icell = floor_index((x - self.rmin) / self.step).clamp(0, last_cell);
        let left = (self.degree / 2) as isize;
        if self.periodic {
            icell - left
        } else {
            (icell - left).clamp(0, self.ncells as isize - self.degree as isize)
        }
    }

    /// Evaluates the `D + 1` Lagrange polynomials of the stencil containing `x`.
    ///
    /// Returns the index of the first knot of the stencil.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != D + 1`.
    pub fn eval_basis(&self, x: T, values: &mut [T]) -> isize {
        let start = self.poly_start(x);
        let x = if self.periodic {
            wrap_periodic(x, self.rmin, self.rmax - self.rmin)
        } else {
            x
        };
        self.eval_basis_from(x, start, values);
        start
    }

    /// Evaluates the `D + 1` Lagrange polynomials whose stencil starts at knot `poly_start`.
    ///
    /// Within `4 eps` of a knot the result is the exact Kronecker delta of that knot.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != D + 1`.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn eval_basis_from(&self, x: T, poly_start: isize, values: &mut [T]) {
        check_output_len(values.len(), self.degree);
        let dx = self.step;
        let offset = (x - self.knot(poly_start)) / dx;
        let eps = 4.0 * T::default_epsilon();
        let icell = floor_index(offset);
        let local_offset = offset - convert::<f64, T>(icell as f64);

        let one_hot = if local_offset < eps {
            Some(icell)
        } else if local_offset > 1.0 - eps {
            Some(icell + 1)
        } else {
            None
        };

        match one_hot {
            Some(hot) => {
                for (j, v) in values.iter_mut().enumerate() {
                    *v = if j as isize == hot { T::one() } else { T::zero() };
                }
            }
            None => {
                let terms = |i: usize| self.weights[i] / (dx * (offset - convert::<f64, T>(i as f64)));
                let denominator = (0..=self.degree).fold(T::zero(), |acc, j| acc + terms(j));
                for (i, v) in values.iter_mut().enumerate() {
                    *v = terms(i) / denominator;
                }
            }
        }
    }
}
