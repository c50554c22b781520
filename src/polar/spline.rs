use crate::polar::{PolarBSplines, PolarIndex};
use crate::Real;
use nalgebra::{DMatrix, DVector};

/// Coefficients of a spline on a polar basis.
///
/// `tensor[(i, j)]` is the coefficient of the tensor-product function `(i + C + 1, j)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarSpline<T: Real> {
    pub singular: DVector<T>,
    pub tensor: DMatrix<T>,
}

impl<T: Real> PolarSpline<T> {
    pub fn zeros(basis: &PolarBSplines<T>) -> Self {
        Self {
            singular: DVector::zeros(basis.n_singular()),
            tensor: DMatrix::zeros(basis.nbasis_r() - basis.n_rings(), basis.nbasis_theta()),
        }
    }

    /// Number of coefficients, equal to the size of the basis the spline was created for.
    pub fn len(&self) -> usize {
        self.singular.len() + self.tensor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of radial rings absorbed into the singular functions.
    fn n_rings(&self, basis: &PolarBSplines<T>) -> usize {
        basis.nbasis_r() - self.tensor.nrows()
    }

    /// # Panics
    ///
    /// Panics if the index does not belong to the basis of the spline.
    pub fn get(&self, basis: &PolarBSplines<T>, index: PolarIndex) -> T {
        match index {
            PolarIndex::Singular(k) => self.singular[k],
            PolarIndex::Tensor { r, theta } => {
                self.tensor[(r - self.n_rings(basis), theta % basis.nbasis_theta())]
            }
        }
    }

    /// # Panics
    ///
    /// Panics if the index does not belong to the basis of the spline.
    pub fn set(&mut self, basis: &PolarBSplines<T>, index: PolarIndex, value: T) {
        match index {
            PolarIndex::Singular(k) => self.singular[k] = value,
            PolarIndex::Tensor { r, theta } => {
                let row = r - self.n_rings(basis);
                self.tensor[(row, theta % basis.nbasis_theta())] = value;
            }
        }
    }

    /// The coefficient of the basis function with global index `idx`.
    pub fn coefficient(&self, basis: &PolarBSplines<T>, idx: usize) -> T {
        self.get(basis, basis.polar_index(idx))
    }

    /// Fills the spline from coefficients in global index order.
    ///
    /// Coefficients beyond the end of `values` are set to zero, which allows a solution vector that
    /// omits the outermost functions to be stored directly.
    ///
    /// # Panics
    ///
    /// Panics if `values` holds more coefficients than the basis has functions.
    pub fn copy_from_global(&mut self, basis: &PolarBSplines<T>, values: &[T]) {
        assert!(
            values.len() <= basis.nbasis(),
            "Precondition violated: {} coefficients for a basis of {} functions",
            values.len(),
            basis.nbasis()
        );
        self.singular.fill(T::zero());
        self.tensor.fill(T::zero());
        for (idx, &value) in values.iter().enumerate() {
            self.set(basis, basis.polar_index(idx), value);
        }
    }

    /// The coefficients in global index order.
    pub fn to_global(&self, basis: &PolarBSplines<T>) -> DVector<T> {
        DVector::from_fn(basis.nbasis(), |idx, _| self.coefficient(basis, idx))
    }
}
