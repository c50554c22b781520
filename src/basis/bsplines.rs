use crate::basis::{check_output_len, BasisBuffer, MAX_DEGREE};
use crate::{wrap_periodic, Real};
use nalgebra::convert;
use numeric_literals::replace_float_literals;
use std::cmp::Ordering;

/// B-splines of arbitrary degree on a sequence of break points.
///
/// The knot sequence is the break point sequence padded with `degree` knots on each side. For a
/// periodic basis the padding wraps around by the period, so that there are exactly `ncells` basis
/// functions. For an open (non-periodic) basis the end points are repeated, giving
/// `ncells + degree` basis functions, the first and last of which interpolate the end points.
///
/// Basis function `j` is supported on `[knot(j - degree), knot(j + 1)]`, so on cell `i` the
/// non-zero functions are `i..=i + degree` (modulo `nbasis` for periodic bases).
#[derive(Debug, Clone, PartialEq)]
pub struct BSplines<T> {
    degree: usize,
    periodic: bool,
    ncells: usize,
    uniform: bool,
    // knot(i) is stored at index i + degree
    knots: Vec<T>,
}

impl<T: Real> BSplines<T> {
    /// Constructs B-splines on the given, strictly increasing, break points.
    ///
    /// # Panics
    ///
    /// Panics if the degree exceeds [`MAX_DEGREE`], if the break points are not strictly increasing,
    /// or if there are fewer cells than the degree (at least `degree + 1` distinct break points are
    /// required).
    pub fn non_uniform(degree: usize, periodic: bool, breaks: &[T]) -> Self {
        Self::from_breaks(degree, periodic, breaks, false)
    }

    /// Constructs B-splines on `ncells` cells of equal size covering `[min, max]`.
    ///
    /// # Panics
    ///
    /// Same conditions as [`BSplines::non_uniform`].
    pub fn uniform(degree: usize, periodic: bool, min: T, max: T, ncells: usize) -> Self {
        assert!(ncells > 0, "number of cells must be positive");
        let step = (max - min) / convert::<f64, T>(ncells as f64);
        let breaks: Vec<T> = (0..=ncells)
            .map(|i| {
                if i == ncells {
                    max
                } else {
                    min + step * convert::<f64, T>(i as f64)
                }
            })
            .collect();
        Self::from_breaks(degree, periodic, &breaks, true)
    }

    fn from_breaks(degree: usize, periodic: bool, breaks: &[T], uniform: bool) -> Self {
        assert!(
            degree <= MAX_DEGREE,
            "degree {degree} exceeds the maximum supported degree {MAX_DEGREE}"
        );
        assert!(breaks.len() >= 2, "at least two break points are required");
        assert!(
            breaks.windows(2).all(|pair| pair[0] < pair[1]),
            "break points must be strictly increasing"
        );
        let ncells = breaks.len() - 1;
        assert!(
            ncells >= degree.max(1),
            "at least degree + 1 = {} distinct break points are required, got {}",
            degree + 1,
            breaks.len()
        );

        let rmin = breaks[0];
        let rmax = breaks[ncells];
        let period = rmax - rmin;

        let mut knots = vec![T::zero(); ncells + 1 + 2 * degree];
        knots[degree..=degree + ncells].copy_from_slice(breaks);
        for i in 1..=degree {
            if periodic {
                knots[degree - i] = breaks[ncells - i] - period;
                knots[degree + ncells + i] = breaks[i] + period;
            } else {
                knots[degree - i] = rmin;
                knots[degree + ncells + i] = rmax;
            }
        }

        Self {
            degree,
            periodic,
            ncells,
            uniform,
            knots,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub fn is_uniform(&self) -> bool {
        self.uniform
    }

    pub fn ncells(&self) -> usize {
        self.ncells
    }

    /// Number of distinct basis functions.
    pub fn nbasis(&self) -> usize {
        if self.periodic {
            self.ncells
        } else {
            self.ncells + self.degree
        }
    }

    pub fn rmin(&self) -> T {
        self.knots[self.degree]
    }

    pub fn rmax(&self) -> T {
        self.knots[self.degree + self.ncells]
    }

    pub fn length(&self) -> T {
        self.rmax() - self.rmin()
    }

    /// Returns the knot with (possibly negative) index `i`, where `knot(0) == rmin()`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is outside `-degree ..= ncells + degree`.
    pub fn knot(&self, i: isize) -> T {
        let idx = i + self.degree as isize;
        assert!(
            idx >= 0 && (idx as usize) < self.knots.len(),
            "knot index {i} is out of bounds"
        );
        self.knots[idx as usize]
    }

    /// The break points, i.e. the knots `0..=ncells`.
    pub fn break_points(&self) -> &[T] {
        &self.knots[self.degree..=self.degree + self.ncells]
    }

    /// Maps `x` into the domain: periodic bases wrap, open bases clamp round-off excursions.
    ///
    /// # Panics
    ///
    /// Panics if `x` lies outside the domain of an open basis by more than round-off.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn to_domain(&self, x: T) -> T {
        if self.periodic {
            wrap_periodic(x, self.rmin(), self.length())
        } else {
            let tol = 4.0 * T::default_epsilon() * self.length();
            assert!(
                x >= self.rmin() - tol && x <= self.rmax() + tol,
                "coordinate {x} is outside of the domain [{}, {}]",
                self.rmin(),
                self.rmax()
            );
            x.max(self.rmin()).min(self.rmax())
        }
    }

    /// Returns the index of the cell containing `x`.
    ///
    /// `x == rmax()` belongs to the last cell. `x` must already lie in the domain.
    pub fn find_cell(&self, x: T) -> usize {
        if x >= self.rmax() {
            return self.ncells - 1;
        }
        if x <= self.rmin() {
            return 0;
        }
        let breaks = self.break_points();
        let (mut low, mut high) = (0, self.ncells);
        while high - low > 1 {
            let mid = (low + high) / 2;
            if x < breaks[mid] {
                high = mid;
            } else {
                low = mid;
            }
        }
        low
    }

    /// Evaluates the `degree + 1` basis functions that are non-zero at `x`.
    ///
    /// Returns the index of the first function; entry `k` of `values` belongs to function
    /// `jmin + k` (modulo `nbasis()` for periodic bases).
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != degree + 1` or if `x` is outside the domain of an open basis.
    pub fn eval_basis(&self, x: T, values: &mut [T]) -> usize {
        check_output_len(values.len(), self.degree);
        let x = self.to_domain(x);
        let icell = self.find_cell(x);
        self.eval_basis_in_cell(x, icell, self.degree, values);
        icell
    }

    /// Evaluates the first derivatives of the `degree + 1` basis functions that are non-zero at `x`.
    ///
    /// # Panics
    ///
    /// Same conditions as [`BSplines::eval_basis`].
    pub fn eval_deriv(&self, x: T, derivs: &mut [T]) -> usize {
        check_output_len(derivs.len(), self.degree);
        let x = self.to_domain(x);
        let icell = self.find_cell(x);
        self.eval_deriv_in_cell(x, icell, derivs);
        icell
    }

    /// Cox-de Boor recursion for the `degree + 1` functions of the given degree on cell `icell`.
    fn eval_basis_in_cell(&self, x: T, icell: usize, degree: usize, values: &mut [T]) {
        let mut left: BasisBuffer<T> = [T::zero(); MAX_DEGREE + 1];
        let mut right: BasisBuffer<T> = [T::zero(); MAX_DEGREE + 1];
        let icell = icell as isize;

        values[0] = T::one();
        for j in 0..degree {
            left[j] = x - self.knot(icell - j as isize);
            right[j] = self.knot(icell + j as isize + 1) - x;
            let mut saved = T::zero();
            for r in 0..=j {
                let temp = values[r] / (right[r] + left[j - r]);
                values[r] = saved + right[r] * temp;
                saved = left[j - r] * temp;
            }
            values[j + 1] = saved;
        }
    }

    fn eval_deriv_in_cell(&self, x: T, icell: usize, derivs: &mut [T]) {
        let degree = self.degree;
        if degree == 0 {
            derivs[0] = T::zero();
            return;
        }

        // Derivatives are differences of the basis functions of one degree lower
        let mut lower: BasisBuffer<T> = [T::zero(); MAX_DEGREE + 1];
        self.eval_basis_in_cell(x, icell, degree - 1, &mut lower);

        let p: T = convert(degree as f64);
        let d = degree as isize;
        let c = icell as isize;
        derivs[0] = -p * lower[0] / (self.knot(c + 1) - self.knot(c + 1 - d));
        for j in 1..degree {
            let jj = j as isize;
            derivs[j] = p
                * (lower[j - 1] / (self.knot(c + jj) - self.knot(c + jj - d))
                    - lower[j] / (self.knot(c + jj + 1) - self.knot(c + jj + 1 - d)));
        }
        derivs[degree] = p * lower[degree - 1] / (self.knot(c + d) - self.knot(c));
    }

    /// The integral of every basis function over the domain.
    pub fn integrals(&self) -> Vec<T> {
        let p1: T = convert((self.degree + 1) as f64);
        let d = self.degree as isize;
        (0..self.nbasis() as isize)
            .map(|j| (self.knot(j + 1) - self.knot(j - d)) / p1)
            .collect()
    }

    /// Greville abscissae: one interpolation point per basis function.
    ///
    /// For open bases the first and last points are the end points of the domain. For periodic
    /// bases the points are wrapped into `[rmin, rmax)` and sorted.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn greville_points(&self) -> Vec<T> {
        let d = self.degree as isize;
        let mut points: Vec<T> = (0..self.nbasis() as isize)
            .map(|j| {
                if d == 0 {
                    0.5 * (self.knot(j) + self.knot(j + 1))
                } else {
                    let sum = (1..=d).fold(T::zero(), |acc, k| acc + self.knot(j - d + k));
                    sum / convert::<f64, T>(d as f64)
                }
            })
            .collect();

        if self.periodic {
            for x in &mut points {
                *x = wrap_periodic(*x, self.rmin(), self.length());
            }
            points.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        }
        points
    }
}
