//! Gauss-Legendre quadrature on the cells of the polar grid.
use crate::basis::BSplines;
use crate::{LogicalCoordinate, Real};
use eyre::eyre;
use nalgebra::{convert, try_convert};
use polar_quadrature::univariate;

/// A 1D rule stored as `(weights, points)`.
pub type QuadraturePair1d<T> = (Vec<T>, Vec<T>);

/// Gauss-Legendre rule with `num_points` points on `[-1, 1]`.
pub fn gauss<T: Real>(num_points: usize) -> QuadraturePair1d<T> {
    let (weights, points) = univariate::gauss(num_points);
    convert_quadrature_rule_from_f64((weights, points))
}

fn convert_quadrature_rule_from_f64<T: Real>(quadrature: polar_quadrature::Rule) -> QuadraturePair1d<T> {
    let (weights, points) = quadrature;
    let weights = weights.into_iter().map(convert).collect();
    let points = points.into_iter().map(convert).collect();
    (weights, points)
}

/// Composite Gauss-Legendre rule on a sequence of break points.
///
/// Points are grouped per cell: the points of cell `i` are
/// `i * points_per_cell() .. (i + 1) * points_per_cell()`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre<T> {
    points_per_cell: usize,
    weights: Vec<T>,
    points: Vec<T>,
}

impl<T: Real> GaussLegendre<T> {
    /// Maps `points_per_cell` nodes onto every cell of `breaks`.
    pub fn on_breaks(points_per_cell: usize, breaks: &[T]) -> eyre::Result<Self> {
        if points_per_cell == 0 {
            return Err(eyre!("At least one quadrature point per cell is required"));
        }
        let breaks = breaks
            .iter()
            .map(|&b| try_convert(b).ok_or_else(|| eyre!("Break point is not representable as f64")))
            .collect::<eyre::Result<Vec<f64>>>()?;
        let rule = univariate::gauss_on_breaks(points_per_cell, &breaks)?;
        let (weights, points) = convert_quadrature_rule_from_f64(rule);
        Ok(Self {
            points_per_cell,
            weights,
            points,
        })
    }

    pub fn points_per_cell(&self) -> usize {
        self.points_per_cell
    }

    pub fn ncells(&self) -> usize {
        self.points.len() / self.points_per_cell
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn points(&self) -> &[T] {
        &self.points
    }

    pub fn cell_weights(&self, cell: usize) -> &[T] {
        &self.weights[cell * self.points_per_cell..(cell + 1) * self.points_per_cell]
    }

    pub fn cell_points(&self, cell: usize) -> &[T] {
        &self.points[cell * self.points_per_cell..(cell + 1) * self.points_per_cell]
    }

    pub fn integrate(&self, f: impl Fn(T) -> T) -> T {
        self.weights
            .iter()
            .zip(&self.points)
            .fold(T::zero(), |acc, (&w, &x)| acc + w * f(x))
    }
}

/// Tensor-product Gauss-Legendre rule over every cell `(i_r, i_θ)` of the logical grid.
///
/// Quadrature points are numbered cell by cell, so that the points of one cell are contiguous:
/// cell `(i_r, i_θ)` owns the `points_per_cell()` indices starting at
/// `(i_r * ncells_theta + i_θ) * points_per_cell()`. Within a cell the angular index runs fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarQuadrature<T> {
    radial: GaussLegendre<T>,
    angular: GaussLegendre<T>,
}

impl<T: Real> PolarQuadrature<T> {
    pub fn new(radial: GaussLegendre<T>, angular: GaussLegendre<T>) -> Self {
        Self { radial, angular }
    }

    /// A rule with `degree + 1` points per cell and direction, exact for the products of two
    /// basis functions on an affine mapping.
    pub fn for_bsplines(bsplines_r: &BSplines<T>, bsplines_theta: &BSplines<T>) -> eyre::Result<Self> {
        Ok(Self::new(
            GaussLegendre::on_breaks(bsplines_r.degree() + 1, bsplines_r.break_points())?,
            GaussLegendre::on_breaks(bsplines_theta.degree() + 1, bsplines_theta.break_points())?,
        ))
    }

    pub fn radial(&self) -> &GaussLegendre<T> {
        &self.radial
    }

    pub fn angular(&self) -> &GaussLegendre<T> {
        &self.angular
    }

    pub fn ncells_r(&self) -> usize {
        self.radial.ncells()
    }

    pub fn ncells_theta(&self) -> usize {
        self.angular.ncells()
    }

    pub fn num_cells(&self) -> usize {
        self.ncells_r() * self.ncells_theta()
    }

    pub fn points_per_cell(&self) -> usize {
        self.radial.points_per_cell() * self.angular.points_per_cell()
    }

    pub fn num_points(&self) -> usize {
        self.num_cells() * self.points_per_cell()
    }

    /// The cell `(i_r, i_θ)` owning the global quadrature point `index`.
    pub fn cell_of_point(&self, index: usize) -> (usize, usize) {
        let cell = index / self.points_per_cell();
        (cell / self.ncells_theta(), cell % self.ncells_theta())
    }

    /// Weight and coordinate of the global quadrature point `index`.
    pub fn point(&self, index: usize) -> (T, LogicalCoordinate<T>) {
        let (ir, itheta) = self.cell_of_point(index);
        let local = index % self.points_per_cell();
        let npt = self.angular.points_per_cell();
        let (kr, ktheta) = (local / npt, local % npt);
        let r_idx = ir * self.radial.points_per_cell() + kr;
        let theta_idx = itheta * npt + ktheta;
        let weight = self.radial.weights()[r_idx] * self.angular.weights()[theta_idx];
        let coord = LogicalCoordinate::new(self.radial.points()[r_idx], self.angular.points()[theta_idx]);
        (weight, coord)
    }

    /// The global index of the first quadrature point of cell `(i_r, i_θ)`.
    pub fn cell_offset(&self, ir: usize, itheta: usize) -> usize {
        (ir * self.ncells_theta() + itheta) * self.points_per_cell()
    }
}
