use crate::basis::{BSplines, BasisBuffer, MAX_DEGREE};
use crate::spline::Spline2D;
use crate::{LogicalCoordinate, Real};
use eyre::eyre;
use nalgebra::{DMatrix, DVector, Dyn, LU};
use std::sync::Arc;

/// Interpolation with B-splines at their Greville points.
///
/// The collocation matrix is factorized once on construction; every subsequent interpolation is a
/// pair of triangular solves.
#[derive(Debug, Clone)]
pub struct SplineBuilder1D<T: Real> {
    bsplines: Arc<BSplines<T>>,
    points: Vec<T>,
    lu: LU<T, Dyn, Dyn>,
}

impl<T: Real> SplineBuilder1D<T> {
    pub fn new(bsplines: Arc<BSplines<T>>) -> eyre::Result<Self> {
        let points = bsplines.greville_points();
        let n = bsplines.nbasis();
        let degree = bsplines.degree();

        let mut collocation = DMatrix::zeros(n, n);
        let mut values: BasisBuffer<T> = [T::zero(); MAX_DEGREE + 1];
        for (i, &x) in points.iter().enumerate() {
            let jmin = bsplines.eval_basis(x, &mut values[..=degree]);
            for (k, &value) in values[..=degree].iter().enumerate() {
                // Periodic bases wrap around, open bases never exceed n
                collocation[(i, (jmin + k) % n)] += value;
            }
        }

        let lu = collocation.lu();
        if !lu.is_invertible() {
            return Err(eyre!(
                "Collocation matrix of {} B-splines of degree {} is singular",
                n,
                degree
            ));
        }

        Ok(Self { bsplines, points, lu })
    }

    pub fn bsplines(&self) -> &Arc<BSplines<T>> {
        &self.bsplines
    }

    pub fn interpolation_points(&self) -> &[T] {
        &self.points
    }

    /// Replaces every column of `values`, given at the interpolation points, by spline coefficients.
    pub fn solve_in_place(&self, values: &mut DMatrix<T>) -> eyre::Result<()> {
        if values.nrows() != self.points.len() {
            return Err(eyre!(
                "Expected {} rows of values at the interpolation points, got {}",
                self.points.len(),
                values.nrows()
            ));
        }
        if !self.lu.solve_mut(values) {
            return Err(eyre!("Failed to solve the spline interpolation system"));
        }
        Ok(())
    }

    /// Spline coefficients interpolating `values` given at the interpolation points.
    pub fn build(&self, values: &[T]) -> eyre::Result<DVector<T>> {
        let mut coefficients = DMatrix::from_column_slice(values.len(), 1, values);
        self.solve_in_place(&mut coefficients)?;
        Ok(coefficients.column(0).into_owned())
    }
}

/// Tensor-product interpolation over a radial and an angular B-spline basis.
#[derive(Debug, Clone)]
pub struct SplineBuilder2D<T: Real> {
    builder_r: SplineBuilder1D<T>,
    builder_theta: SplineBuilder1D<T>,
}

impl<T: Real> SplineBuilder2D<T> {
    pub fn new(bsplines_r: Arc<BSplines<T>>, bsplines_theta: Arc<BSplines<T>>) -> eyre::Result<Self> {
        Ok(Self {
            builder_r: SplineBuilder1D::new(bsplines_r)?,
            builder_theta: SplineBuilder1D::new(bsplines_theta)?,
        })
    }

    pub fn bsplines_r(&self) -> &Arc<BSplines<T>> {
        self.builder_r.bsplines()
    }

    pub fn bsplines_theta(&self) -> &Arc<BSplines<T>> {
        self.builder_theta.bsplines()
    }

    pub fn interpolation_points_r(&self) -> &[T] {
        self.builder_r.interpolation_points()
    }

    pub fn interpolation_points_theta(&self) -> &[T] {
        self.builder_theta.interpolation_points()
    }

    /// Number of interpolation points in each direction.
    pub fn grid_shape(&self) -> (usize, usize) {
        (
            self.interpolation_points_r().len(),
            self.interpolation_points_theta().len(),
        )
    }

    /// The interpolation grid, radial index major.
    pub fn interpolation_coordinates(&self) -> Vec<LogicalCoordinate<T>> {
        let thetas = self.interpolation_points_theta();
        self.interpolation_points_r()
            .iter()
            .flat_map(|&r| thetas.iter().map(move |&theta| LogicalCoordinate::new(r, theta)))
            .collect()
    }

    /// Spline coefficients interpolating `values`, where `values[(i, j)]` is given at
    /// `(r_i, θ_j)` of the interpolation grid.
    pub fn build(&self, values: &DMatrix<T>) -> eyre::Result<Spline2D<T>> {
        if values.shape() != self.grid_shape() {
            return Err(eyre!(
                "Values of shape {:?} do not match the interpolation grid of shape {:?}",
                values.shape(),
                self.grid_shape()
            ));
        }
        let mut partial = values.clone();
        self.builder_r.solve_in_place(&mut partial)?;
        let mut transposed = partial.transpose();
        self.builder_theta.solve_in_place(&mut transposed)?;
        Ok(transposed.transpose())
    }

    /// Interpolates a function of the logical coordinates.
    pub fn interpolate(&self, f: impl Fn(LogicalCoordinate<T>) -> T) -> eyre::Result<Spline2D<T>> {
        let (nr, ntheta) = self.grid_shape();
        let rs = self.interpolation_points_r();
        let thetas = self.interpolation_points_theta();
        let values = DMatrix::from_fn(nr, ntheta, |i, j| f(LogicalCoordinate::new(rs[i], thetas[j])));
        self.build(&values)
    }
}
