use crate::error::PolarError;
use nalgebra::{DVector, RealField};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

/// A sparse Cholesky factorization, computed once and reused for every right-hand side.
#[derive(Debug)]
pub struct LinearSolver<T: RealField> {
    cholesky: CscCholesky<T>,
    dim: usize,
}

impl<T: RealField> LinearSolver<T> {
    /// Factors a symmetric positive definite matrix.
    ///
    /// Fails with [`PolarError::SingularSystemError`] if the matrix is not square or the
    /// factorization breaks down.
    pub fn factor(matrix: &CsrMatrix<T>) -> eyre::Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(PolarError::SingularSystemError {
                message: format!("matrix of shape {}x{} is not square", matrix.nrows(), matrix.ncols()),
            }
            .into());
        }
        let cholesky =
            CscCholesky::factor(&CscMatrix::from(matrix)).map_err(|err| PolarError::SingularSystemError {
                message: err.to_string(),
            })?;
        Ok(Self {
            cholesky,
            dim: matrix.nrows(),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// # Panics
    ///
    /// Panics if `rhs` does not match the dimension of the system.
    pub fn solve(&self, rhs: &DVector<T>) -> DVector<T> {
        assert_eq!(
            rhs.len(),
            self.dim,
            "Precondition violated: right-hand side has the wrong dimension"
        );
        self.cholesky.solve(rhs).column(0).into_owned()
    }
}
