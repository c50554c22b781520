use crate::basis::{BSplines, BasisBuffer, CartesianToBarycentric, TriangularBernsteinBasis, MAX_DEGREE};
use crate::mapping::{CurvilinearToCartesian, DiscreteToCartesian};
use crate::polar::PolarSpline;
use crate::{LogicalCoordinate, Real};
use nalgebra::{DMatrix, Point2};
use numeric_literals::replace_float_literals;
use std::sync::Arc;

/// Largest number of singular functions, attained for `C = 1`.
pub const MAX_SINGULAR: usize = 3;

/// Largest number of tensor-product functions that are non-zero at a point.
pub const MAX_TENSOR_SUPPORT: usize = (MAX_DEGREE + 1) * (MAX_DEGREE + 1);

/// Position of a basis function in the polar basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolarIndex {
    /// Singular function `k`.
    Singular(usize),
    /// The tensor product of radial function `r` and angular function `theta`.
    Tensor { r: usize, theta: usize },
}

/// Tells which tensor-product functions an evaluation of the polar basis produced.
///
/// Entry `i * ntheta + j` of the tensor-product output buffer belongs to the function
/// `(r_start + i, (theta_start + j) mod nbasis_theta)` for `i < nr`; rows `i >= nr` are zero.
/// Functions of the rings absorbed into the singular functions are never reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolarBasisSupport {
    pub r_start: usize,
    pub theta_start: usize,
    pub nr: usize,
    pub ntheta: usize,
    pub nbasis_theta: usize,
}

impl PolarBasisSupport {
    /// The tensor-product index of entry `(i, j)` of the output buffer.
    pub fn tensor_index(&self, i: usize, j: usize) -> (usize, usize) {
        (self.r_start + i, (self.theta_start + j) % self.nbasis_theta)
    }
}

#[derive(Debug, Copy, Clone)]
enum Order {
    Value,
    Deriv,
}

/// B-splines on the polar domain with `C` continuous derivatives across the pole.
#[derive(Debug, Clone)]
pub struct PolarBSplines<T: Real> {
    bsplines_r: Arc<BSplines<T>>,
    bsplines_theta: Arc<BSplines<T>>,
    continuity: i32,
    // Coefficients of singular function k on the tensor-product functions (i_r, i_θ), i_r <= C
    singular_elements: Vec<DMatrix<T>>,
}

impl<T: Real> PolarBSplines<T> {
    /// Builds the polar basis from the control points of a discrete mapping.
    ///
    /// The singular functions are the Bernstein polynomials of degree `C` on an equilateral
    /// triangle enclosing the control points of the first ring, evaluated at the control points of
    /// the absorbed rings.
    ///
    /// # Panics
    ///
    /// Panics if `continuity` is not one of -1, 0 or 1, if the radial basis is periodic or the
    /// angular basis is not, if the radial basis has no more than `C + 1` functions, or if the
    /// mapping is not defined on the same bases.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn new(
        bsplines_r: Arc<BSplines<T>>,
        bsplines_theta: Arc<BSplines<T>>,
        continuity: i32,
        mapping: &DiscreteToCartesian<T>,
    ) -> Self {
        assert!(
            (-1..=1).contains(&continuity),
            "continuity must be -1, 0 or 1, got {continuity}"
        );
        assert!(!bsplines_r.is_periodic(), "the radial B-splines must not be periodic");
        assert!(bsplines_theta.is_periodic(), "the angular B-splines must be periodic");
        let n_rings = (continuity + 1) as usize;
        assert!(
            bsplines_r.nbasis() > n_rings,
            "the radial basis needs more than {n_rings} functions"
        );
        assert_eq!(
            mapping.x_spline().shape(),
            (bsplines_r.nbasis(), bsplines_theta.nbasis()),
            "the mapping must be defined on the same bases"
        );

        let ntheta = bsplines_theta.nbasis();
        let mut singular_elements = Vec::new();
        if continuity >= 0 {
            let pole = mapping.to_cartesian(&LogicalCoordinate::new(0.0, 0.0));
            let sqrt3 = T::sqrt(3.0);

            // Smallest equilateral triangle centered at the pole enclosing the first ring
            let mut tau = T::zero();
            for itheta in 0..ntheta {
                let point = mapping.control_point(1, itheta);
                let (dx, dy) = (point.x - pole.x, point.y - pole.y);
                tau = tau.max(-2.0 * dx).max(dx - sqrt3 * dy).max(dx + sqrt3 * dy);
            }
            let triangle = CartesianToBarycentric::new(
                Point2::new(pole.x + tau, pole.y),
                Point2::new(pole.x - 0.5 * tau, pole.y + 0.5 * tau * sqrt3),
                Point2::new(pole.x - 0.5 * tau, pole.y - 0.5 * tau * sqrt3),
            );
            let bernstein = TriangularBernsteinBasis::new(continuity as usize, triangle);

            let n_singular = bernstein.nbasis();
            singular_elements = vec![DMatrix::zeros(n_rings, ntheta); n_singular];
            let mut values = [T::zero(); MAX_SINGULAR];
            for ir in 0..n_rings {
                for itheta in 0..ntheta {
                    let point = mapping.control_point(ir, itheta);
                    bernstein.eval_basis(&point, &mut values[..n_singular]);
                    for (element, &value) in singular_elements.iter_mut().zip(&values[..n_singular]) {
                        element[(ir, itheta)] = value;
                    }
                }
            }
        }

        Self {
            bsplines_r,
            bsplines_theta,
            continuity,
            singular_elements,
        }
    }

    pub fn bsplines_r(&self) -> &Arc<BSplines<T>> {
        &self.bsplines_r
    }

    pub fn bsplines_theta(&self) -> &Arc<BSplines<T>> {
        &self.bsplines_theta
    }

    pub fn continuity(&self) -> i32 {
        self.continuity
    }

    /// Number of singular functions, `(C + 1)(C + 2) / 2`.
    pub fn n_singular(&self) -> usize {
        let c = (self.continuity + 1) as usize;
        c * (c + 1) / 2
    }

    /// Number of radial rings absorbed into the singular functions, `C + 1`.
    pub fn n_rings(&self) -> usize {
        (self.continuity + 1) as usize
    }

    pub fn nbasis_r(&self) -> usize {
        self.bsplines_r.nbasis()
    }

    pub fn nbasis_theta(&self) -> usize {
        self.bsplines_theta.nbasis()
    }

    /// Total number of basis functions.
    pub fn nbasis(&self) -> usize {
        self.n_singular() + (self.nbasis_r() - self.n_rings()) * self.nbasis_theta()
    }

    /// Length of the tensor-product output buffer of the evaluation functions.
    pub fn tensor_buffer_len(&self) -> usize {
        (self.bsplines_r.degree() + 1) * (self.bsplines_theta.degree() + 1)
    }

    /// The coefficients of singular function `k` on the tensor-product functions of the absorbed
    /// rings, as an `(C + 1) × n_θ` matrix.
    pub fn singular_element(&self, k: usize) -> &DMatrix<T> {
        &self.singular_elements[k]
    }

    /// # Panics
    ///
    /// Panics if `idx >= nbasis()`.
    pub fn polar_index(&self, idx: usize) -> PolarIndex {
        assert!(idx < self.nbasis(), "basis index {idx} is out of bounds");
        let n_singular = self.n_singular();
        if idx < n_singular {
            PolarIndex::Singular(idx)
        } else {
            let local = idx - n_singular;
            PolarIndex::Tensor {
                r: local / self.nbasis_theta() + self.n_rings(),
                theta: local % self.nbasis_theta(),
            }
        }
    }

    /// The global index of a basis function. Angular indices are taken modulo `n_θ`.
    ///
    /// # Panics
    ///
    /// Panics if the index does not belong to the basis, in particular for tensor-product
    /// functions of the absorbed rings.
    pub fn global_index(&self, index: PolarIndex) -> usize {
        match index {
            PolarIndex::Singular(k) => {
                assert!(k < self.n_singular(), "singular index {k} is out of bounds");
                k
            }
            PolarIndex::Tensor { r, theta } => {
                assert!(
                    r >= self.n_rings() && r < self.nbasis_r(),
                    "radial index {r} is not a tensor-product index"
                );
                self.n_singular() + (r - self.n_rings()) * self.nbasis_theta() + theta % self.nbasis_theta()
            }
        }
    }

    /// Evaluates the basis functions that are non-zero at `coord`.
    ///
    /// All singular functions are written to `singular`, the non-zero tensor-product functions to
    /// `tensor` as described by the returned [`PolarBasisSupport`].
    ///
    /// # Panics
    ///
    /// Panics if `singular.len() != n_singular()`, if `tensor.len() != tensor_buffer_len()`, or if
    /// `r` lies outside the radial domain.
    pub fn eval_basis(&self, coord: &LogicalCoordinate<T>, singular: &mut [T], tensor: &mut [T]) -> PolarBasisSupport {
        self.eval(coord, singular, tensor, Order::Value, Order::Value)
    }

    /// Evaluates the radial derivatives of the basis functions that are non-zero at `coord`.
    pub fn eval_deriv_r(
        &self,
        coord: &LogicalCoordinate<T>,
        singular: &mut [T],
        tensor: &mut [T],
    ) -> PolarBasisSupport {
        self.eval(coord, singular, tensor, Order::Deriv, Order::Value)
    }

    /// Evaluates the angular derivatives of the basis functions that are non-zero at `coord`.
    pub fn eval_deriv_theta(
        &self,
        coord: &LogicalCoordinate<T>,
        singular: &mut [T],
        tensor: &mut [T],
    ) -> PolarBasisSupport {
        self.eval(coord, singular, tensor, Order::Value, Order::Deriv)
    }

    /// Evaluates the mixed derivatives `∂r∂θ` of the basis functions that are non-zero at `coord`.
    pub fn eval_deriv_r_and_theta(
        &self,
        coord: &LogicalCoordinate<T>,
        singular: &mut [T],
        tensor: &mut [T],
    ) -> PolarBasisSupport {
        self.eval(coord, singular, tensor, Order::Deriv, Order::Deriv)
    }

    fn eval(
        &self,
        coord: &LogicalCoordinate<T>,
        singular: &mut [T],
        tensor: &mut [T],
        order_r: Order,
        order_theta: Order,
    ) -> PolarBasisSupport {
        assert_eq!(
            singular.len(),
            self.n_singular(),
            "Precondition violated: the singular buffer must hold {} values",
            self.n_singular()
        );
        assert_eq!(
            tensor.len(),
            self.tensor_buffer_len(),
            "Precondition violated: the tensor-product buffer must hold {} values",
            self.tensor_buffer_len()
        );

        let nr = self.bsplines_r.degree() + 1;
        let ntheta = self.bsplines_theta.degree() + 1;
        let mut values_r: BasisBuffer<T> = [T::zero(); MAX_DEGREE + 1];
        let mut values_theta: BasisBuffer<T> = [T::zero(); MAX_DEGREE + 1];
        let jmin_r = match order_r {
            Order::Value => self.bsplines_r.eval_basis(coord.r, &mut values_r[..nr]),
            Order::Deriv => self.bsplines_r.eval_deriv(coord.r, &mut values_r[..nr]),
        };
        let jmin_theta = match order_theta {
            Order::Value => self.bsplines_theta.eval_basis(coord.theta, &mut values_theta[..ntheta]),
            Order::Deriv => self.bsplines_theta.eval_deriv(coord.theta, &mut values_theta[..ntheta]),
        };

        let nbasis_theta = self.nbasis_theta();
        let n_rings = self.n_rings();
        let nr_done = n_rings.saturating_sub(jmin_r).min(nr);

        for (k, value) in singular.iter_mut().enumerate() {
            let element = &self.singular_elements[k];
            let mut sum = T::zero();
            for i in 0..nr_done {
                for j in 0..ntheta {
                    sum += element[(jmin_r + i, (jmin_theta + j) % nbasis_theta)] * values_r[i] * values_theta[j];
                }
            }
            *value = sum;
        }

        for i in 0..nr {
            for j in 0..ntheta {
                tensor[i * ntheta + j] = if i + nr_done < nr {
                    values_r[i + nr_done] * values_theta[j]
                } else {
                    T::zero()
                };
            }
        }

        PolarBasisSupport {
            r_start: jmin_r + nr_done,
            theta_start: jmin_theta,
            nr: nr - nr_done,
            ntheta,
            nbasis_theta,
        }
    }

    /// The integral of every basis function over the logical domain.
    pub fn integrals(&self) -> PolarSpline<T> {
        let integrals_r = self.bsplines_r.integrals();
        let integrals_theta = self.bsplines_theta.integrals();
        let mut integrals = PolarSpline::zeros(self);

        for (k, element) in self.singular_elements.iter().enumerate() {
            let mut sum = T::zero();
            for ir in 0..self.n_rings() {
                for (itheta, &int_theta) in integrals_theta.iter().enumerate() {
                    sum += element[(ir, itheta)] * integrals_r[ir] * int_theta;
                }
            }
            integrals.singular[k] = sum;
        }

        let n_rings = self.n_rings();
        for j in 0..self.nbasis_theta() {
            for i in 0..self.nbasis_r() - n_rings {
                integrals.tensor[(i, j)] = integrals_r[i + n_rings] * integrals_theta[j];
            }
        }
        integrals
    }

    /// The number of the radial cell and the angular cell containing `coord`.
    pub fn find_cell(&self, coord: &LogicalCoordinate<T>) -> (usize, usize) {
        let r = self.bsplines_r.to_domain(coord.r);
        let theta = self.bsplines_theta.to_domain(coord.theta);
        (self.bsplines_r.find_cell(r), self.bsplines_theta.find_cell(theta))
    }

    /// Total number of singular and tensor-product functions supported on a cell of radial index `ir`.
    pub fn num_functions_on_cell(&self, ir: usize) -> usize {
        let nr = self.bsplines_r.degree() + 1;
        let nr_done = self.n_rings().saturating_sub(ir).min(nr);
        let n_singular = if nr_done > 0 { self.n_singular() } else { 0 };
        n_singular + (nr - nr_done) * (self.bsplines_theta.degree() + 1)
    }

    /// The global indices of the functions supported on cell `(i_r, i_θ)`, singular first, then
    /// tensor-product functions in the order of [`PolarBasisSupport`].
    pub fn functions_on_cell(&self, ir: usize, itheta: usize, output: &mut Vec<usize>) {
        output.clear();
        let nr = self.bsplines_r.degree() + 1;
        let ntheta = self.bsplines_theta.degree() + 1;
        let n_rings = self.n_rings();
        let nr_done = n_rings.saturating_sub(ir).min(nr);
        if nr_done > 0 {
            output.extend(0..self.n_singular());
        }
        for i in ir + nr_done..ir + nr {
            for j in 0..ntheta {
                output.push(self.global_index(PolarIndex::Tensor {
                    r: i,
                    theta: itheta + j,
                }));
            }
        }
    }

    /// Number of cells in each direction.
    pub fn ncells(&self) -> (usize, usize) {
        (self.bsplines_r.ncells(), self.bsplines_theta.ncells())
    }

    /// Radial extent of the domain.
    pub fn rmax(&self) -> T {
        self.bsplines_r.rmax()
    }
}
