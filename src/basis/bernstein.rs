use crate::Real;
use nalgebra::{convert, Point2};
use num::integer::binomial;
use num::pow;

/// Barycentric coordinates with respect to a fixed, non-degenerate triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct CartesianToBarycentric<T: Real> {
    corners: [Point2<T>; 3],
    inv_det: T,
}

impl<T: Real> CartesianToBarycentric<T> {
    /// # Panics
    ///
    /// Panics if the triangle is degenerate.
    pub fn new(corner1: Point2<T>, corner2: Point2<T>, corner3: Point2<T>) -> Self {
        let [p1, p2, p3] = [corner1, corner2, corner3];
        let det = (p2.y - p3.y) * (p1.x - p3.x) + (p3.x - p2.x) * (p1.y - p3.y);
        assert!(det != T::zero(), "the triangle is degenerate");
        Self {
            corners: [corner1, corner2, corner3],
            inv_det: T::one() / det,
        }
    }

    pub fn corners(&self) -> &[Point2<T>; 3] {
        &self.corners
    }

    /// Returns `(λ1, λ2, λ3)` with `λ1 + λ2 + λ3 == 1`.
    pub fn barycentric(&self, point: &Point2<T>) -> [T; 3] {
        let [p1, p2, p3] = &self.corners;
        let dx = point.x - p3.x;
        let dy = point.y - p3.y;
        let l1 = ((p2.y - p3.y) * dx + (p3.x - p2.x) * dy) * self.inv_det;
        let l2 = ((p3.y - p1.y) * dx + (p1.x - p3.x) * dy) * self.inv_det;
        [l1, l2, T::one() - l1 - l2]
    }
}

/// Bernstein polynomials of degree `D` on a triangle.
///
/// The `(D + 1)(D + 2) / 2` polynomials `D! / (i! j! k!) λ1^i λ2^j λ3^k`, `i + j + k = D`, are
/// ordered by increasing `i`, then increasing `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangularBernsteinBasis<T: Real> {
    degree: usize,
    triangle: CartesianToBarycentric<T>,
}

impl<T: Real> TriangularBernsteinBasis<T> {
    pub fn new(degree: usize, triangle: CartesianToBarycentric<T>) -> Self {
        Self { degree, triangle }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn nbasis(&self) -> usize {
        (self.degree + 1) * (self.degree + 2) / 2
    }

    pub fn triangle(&self) -> &CartesianToBarycentric<T> {
        &self.triangle
    }

    /// # Panics
    ///
    /// Panics if `values.len() != nbasis()`.
    pub fn eval_basis(&self, point: &Point2<T>, values: &mut [T]) {
        assert_eq!(
            values.len(),
            self.nbasis(),
            "Precondition violated: output buffer must hold {} values",
            self.nbasis()
        );
        let [l1, l2, l3] = self.triangle.barycentric(point);
        let d = self.degree;
        let mut idx = 0;
        for i in 0..=d {
            for j in 0..=d - i {
                let k = d - i - j;
                let multinomial = binomial(d, i) * binomial(d - i, j);
                values[idx] = convert::<f64, T>(multinomial as f64) * pow(l1, i) * pow(l2, j) * pow(l3, k);
                idx += 1;
            }
        }
    }
}
