//! Manufactured solutions of the Poisson-like equation.
//!
//! A [`ManufacturedPoissonTest`] pairs an exact potential with a mapping and a coefficient profile
//! and produces the source term that makes the potential an exact solution of
//!
//! ```text
//! -∇·(α ∇φ) + β φ = ρ.
//! ```
//!
//! In logical coordinates the divergence reads `(1/|J|) ∇_L·(|J| α G⁻¹ ∇_L φ)`. The flux inside the
//! divergence is evaluated from the exact logical gradient and differentiated numerically with a
//! fourth-order central stencil.
use crate::mapping::CurvilinearToCartesian;
use crate::solver::SourceFunction;
use crate::{LogicalCoordinate, Real};
use nalgebra::{convert, Vector2};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// An exact potential on the logical domain.
pub trait PoissonSolution<T: Real>: Debug + Send + Sync {
    fn value(&self, coord: &LogicalCoordinate<T>) -> T;

    /// `(∂φ/∂r, ∂φ/∂θ)`.
    fn logical_gradient(&self, coord: &LogicalCoordinate<T>) -> Vector2<T>;

    /// `(∂φ/∂x, ∂φ/∂y)`, including at the pole.
    fn cartesian_gradient(&self, coord: &LogicalCoordinate<T>) -> Vector2<T>;

    /// The electric field `-∇φ`.
    fn electric_field(&self, coord: &LogicalCoordinate<T>) -> Vector2<T> {
        -self.cartesian_gradient(coord)
    }
}

/// `1e-4 / 0.5¹²`.
const AMPLITUDE: f64 = 1e-4 * 4096.0;

/// `φ = 1e-4 r⁶ (r - 1)⁶ cos(11θ) / 0.5¹²`, a solution defined in the logical coordinates.
#[derive(Debug, Clone, Copy)]
pub struct CurvilinearSolution<M> {
    mapping: M,
}

impl<M> CurvilinearSolution<M> {
    pub fn new(mapping: M) -> Self {
        Self { mapping }
    }
}

impl<T, M> PoissonSolution<T> for CurvilinearSolution<M>
where
    T: Real,
    M: CurvilinearToCartesian<T>,
{
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn value(&self, coord: &LogicalCoordinate<T>) -> T {
        let c: T = convert(AMPLITUDE);
        let r = coord.r;
        c * r.powi(6) * (r - 1.0).powi(6) * (11.0 * coord.theta).cos()
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn logical_gradient(&self, coord: &LogicalCoordinate<T>) -> Vector2<T> {
        let c: T = convert(AMPLITUDE);
        let r = coord.r;
        let (sin, cos) = (11.0 * coord.theta).sin_cos();
        let radial = 6.0 * r.powi(5) * (r - 1.0).powi(6) + 6.0 * r.powi(6) * (r - 1.0).powi(5);
        Vector2::new(c * radial * cos, -11.0 * c * r.powi(6) * (r - 1.0).powi(6) * sin)
    }

    fn cartesian_gradient(&self, coord: &LogicalCoordinate<T>) -> Vector2<T> {
        // r⁵ vanishes at the pole, and so does the gradient
        if coord.r == T::zero() {
            return Vector2::zeros();
        }
        let inverse_jacobian = self.mapping.inv_jacobian_matrix(coord);
        inverse_jacobian.transpose() * self.logical_gradient(coord)
    }
}

/// `φ = 1e-4 (1 + r)⁶ (1 - r)⁶ cos(2πx) sin(2πy) / 0.5¹²`, a solution defined through the
/// Cartesian coordinates of the mapping.
#[derive(Debug, Clone, Copy)]
pub struct CartesianSolution<M> {
    mapping: M,
}

impl<M> CartesianSolution<M> {
    pub fn new(mapping: M) -> Self {
        Self { mapping }
    }
}

impl<M> CartesianSolution<M> {
    /// `∂φ/∂x`.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn derivative_x<T>(&self, coord: &LogicalCoordinate<T>) -> T
    where
        T: Real,
        M: CurvilinearToCartesian<T>,
    {
        let c: T = convert(AMPLITUDE);
        let r = coord.r;
        let point = self.mapping.to_cartesian(coord);
        let (sin_x, cos_x) = (T::two_pi() * point.x).sin_cos();
        let sin_y = (T::two_pi() * point.y).sin();
        let r_dx_r = self.radial_factor(coord, 0);
        let radial = r * r - 1.0;
        c * sin_y * (12.0 * r_dx_r * radial.powi(5) * cos_x - T::two_pi() * radial.powi(6) * sin_x)
    }

    /// `∂φ/∂y`.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn derivative_y<T>(&self, coord: &LogicalCoordinate<T>) -> T
    where
        T: Real,
        M: CurvilinearToCartesian<T>,
    {
        let c: T = convert(AMPLITUDE);
        let r = coord.r;
        let point = self.mapping.to_cartesian(coord);
        let cos_x = (T::two_pi() * point.x).cos();
        let (sin_y, cos_y) = (T::two_pi() * point.y).sin_cos();
        let r_dy_r = self.radial_factor(coord, 1);
        let radial = r * r - 1.0;
        c * cos_x * (12.0 * r_dy_r * radial.powi(5) * sin_y + T::two_pi() * radial.powi(6) * cos_y)
    }

    /// `r ∂r/∂x` (component 0) or `r ∂r/∂y` (component 1), which vanishes at the pole.
    fn radial_factor<T>(&self, coord: &LogicalCoordinate<T>, component: usize) -> T
    where
        T: Real,
        M: CurvilinearToCartesian<T>,
    {
        if coord.r == T::zero() {
            T::zero()
        } else {
            coord.r * self.mapping.inv_jacobian_matrix(coord)[(0, component)]
        }
    }
}

impl<T, M> PoissonSolution<T> for CartesianSolution<M>
where
    T: Real,
    M: CurvilinearToCartesian<T>,
{
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn value(&self, coord: &LogicalCoordinate<T>) -> T {
        let c: T = convert(AMPLITUDE);
        let r = coord.r;
        let point = self.mapping.to_cartesian(coord);
        c * (1.0 + r).powi(6) * (1.0 - r).powi(6) * (T::two_pi() * point.x).cos() * (T::two_pi() * point.y).sin()
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn logical_gradient(&self, coord: &LogicalCoordinate<T>) -> Vector2<T> {
        let c: T = convert(AMPLITUDE);
        let r = coord.r;
        let point = self.mapping.to_cartesian(coord);
        let jacobian = self.mapping.jacobian_matrix(coord);
        let (sin_x, cos_x) = (T::two_pi() * point.x).sin_cos();
        let (sin_y, cos_y) = (T::two_pi() * point.y).sin_cos();
        let radial = 1.0 - r * r;

        // Gradient of cos(2πx) sin(2πy) in Cartesian coordinates, pulled back through J
        let trig_gradient = Vector2::new(-sin_x * sin_y, cos_x * cos_y) * T::two_pi();
        let pulled_back = jacobian.transpose() * trig_gradient;
        let d_radial_dr = -12.0 * r * radial.powi(5);
        Vector2::new(
            c * (d_radial_dr * cos_x * sin_y + radial.powi(6) * pulled_back.x),
            c * radial.powi(6) * pulled_back.y,
        )
    }

    fn cartesian_gradient(&self, coord: &LogicalCoordinate<T>) -> Vector2<T> {
        Vector2::new(self.derivative_x(coord), self.derivative_y(coord))
    }
}

/// The coefficients `α` and `β` of the equation, as functions of `r`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CoefficientProfile {
    /// `α = 1`, `β = 0`.
    Poisson,
    /// `α = exp(-tanh((r - center) / width))` and `β = 1 / α`.
    Tanh { center: f64, width: f64 },
}

impl Default for CoefficientProfile {
    fn default() -> Self {
        Self::Tanh {
            center: 0.7,
            width: 0.05,
        }
    }
}

impl CoefficientProfile {
    pub fn alpha<T: Real>(&self, coord: &LogicalCoordinate<T>) -> T {
        match *self {
            Self::Poisson => T::one(),
            Self::Tanh { center, width } => (-Self::tanh_argument(coord.r, center, width).tanh()).exp(),
        }
    }

    pub fn beta<T: Real>(&self, coord: &LogicalCoordinate<T>) -> T {
        match *self {
            Self::Poisson => T::zero(),
            Self::Tanh { center, width } => Self::tanh_argument(coord.r, center, width).tanh().exp(),
        }
    }

    fn tanh_argument<T: Real>(r: T, center: f64, width: f64) -> T {
        let center: T = convert(center);
        let width: T = convert(width);
        (r - center) / width
    }
}

/// Step of the finite difference stencils.
const DIFFERENCE_STEP: f64 = 1e-4;
/// Spacing of the radial samples extrapolated to the pole.
const POLE_EXTRAPOLATION_STEP: f64 = 1e-3;

/// The source term that turns a [`PoissonSolution`] into an exact solution for a given mapping
/// and coefficient profile.
#[derive(Debug, Clone)]
pub struct ManufacturedPoissonTest<M, S> {
    mapping: M,
    solution: S,
    profile: CoefficientProfile,
}

impl<M, S> ManufacturedPoissonTest<M, S> {
    /// Uses the default [`CoefficientProfile`].
    pub fn new(mapping: M, solution: S) -> Self {
        Self::with_profile(mapping, solution, CoefficientProfile::default())
    }

    pub fn with_profile(mapping: M, solution: S, profile: CoefficientProfile) -> Self {
        Self {
            mapping,
            solution,
            profile,
        }
    }

    pub fn solution(&self) -> &S {
        &self.solution
    }

    pub fn mapping(&self) -> &M {
        &self.mapping
    }

    pub fn profile(&self) -> &CoefficientProfile {
        &self.profile
    }
}

impl<M, S> ManufacturedPoissonTest<M, S> {
    pub fn alpha<T: Real>(&self, coord: LogicalCoordinate<T>) -> T {
        self.profile.alpha(&coord)
    }

    pub fn beta<T: Real>(&self, coord: LogicalCoordinate<T>) -> T {
        self.profile.beta(&coord)
    }

    /// The exact potential.
    pub fn potential<T>(&self, coord: LogicalCoordinate<T>) -> T
    where
        T: Real,
        S: PoissonSolution<T>,
    {
        self.solution.value(&coord)
    }

    /// The source term `ρ`.
    ///
    /// At the pole the flux divergence cannot be formed, so `ρ` is extrapolated along the ray
    /// `θ = const` from four samples at `r = h, 2h, 3h, 4h`.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn rhs<T>(&self, coord: LogicalCoordinate<T>) -> T
    where
        T: Real,
        M: CurvilinearToCartesian<T>,
        S: PoissonSolution<T>,
    {
        if coord.r > T::zero() {
            return self.rhs_away_from_pole(coord);
        }
        let h: T = convert(POLE_EXTRAPOLATION_STEP);
        let sample = |k: T| self.rhs_away_from_pole(LogicalCoordinate::new(k * h, coord.theta));
        4.0 * sample(1.0) - 6.0 * sample(2.0) + 4.0 * sample(3.0) - sample(4.0)
    }

    fn rhs_away_from_pole<T>(&self, coord: LogicalCoordinate<T>) -> T
    where
        T: Real,
        M: CurvilinearToCartesian<T>,
        S: PoissonSolution<T>,
    {
        let step: T = convert(DIFFERENCE_STEP);
        let quarter: T = convert(0.25);
        // The stencil must not reach the pole
        let h_r = step.min(coord.r * quarter);
        let h_theta = step;

        let flux_r = |r: T| self.flux(LogicalCoordinate::new(r, coord.theta)).x;
        let flux_theta = |theta: T| self.flux(LogicalCoordinate::new(coord.r, theta)).y;
        let divergence =
            central_difference(flux_r, coord.r, h_r) + central_difference(flux_theta, coord.theta, h_theta);
        let jacobian = self.mapping.jacobian(&coord).abs();
        -divergence / jacobian + self.profile.beta(&coord) * self.solution.value(&coord)
    }

    /// `|J| α G⁻¹ ∇φ` in logical components.
    fn flux<T>(&self, coord: LogicalCoordinate<T>) -> Vector2<T>
    where
        T: Real,
        M: CurvilinearToCartesian<T>,
        S: PoissonSolution<T>,
    {
        let jacobian = self.mapping.jacobian(&coord).abs();
        let inverse_metric = self.mapping.inverse_metric_tensor(&coord);
        inverse_metric * self.solution.logical_gradient(&coord) * (jacobian * self.profile.alpha(&coord))
    }
}

impl<T, M, S> SourceFunction<T> for ManufacturedPoissonTest<M, S>
where
    T: Real,
    M: CurvilinearToCartesian<T>,
    S: PoissonSolution<T>,
{
    fn evaluate(&self, coord: LogicalCoordinate<T>) -> T {
        self.rhs(coord)
    }
}

/// Fourth-order central difference `f'(x)`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn central_difference<T: Real>(f: impl Fn(T) -> T, x: T, h: T) -> T {
    (f(x - 2.0 * h) - 8.0 * f(x - h) + 8.0 * f(x + h) - f(x + 2.0 * h)) / (12.0 * h)
}
