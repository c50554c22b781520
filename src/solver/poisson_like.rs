use crate::assembly::global::{CsrParAssembler, VectorParAssembler};
use crate::assembly::local::{
    ElementConnectivityAssembler, PolarElementConnectivity, PolarEllipticAssembler, PolarQuadratureTable,
    PolarSourceAssembler,
};
use crate::mapping::CurvilinearToCartesian;
use crate::polar::{PolarBSplines, PolarDerivative, PolarSpline, PolarSplineEvaluator};
use crate::quadrature::PolarQuadrature;
use crate::solver::LinearSolver;
use crate::spline::{ExtrapolationRule, Spline2D, SplineEvaluator2D};
use crate::{ExecutionContext, LogicalCoordinate, Real};
use log::debug;
use nalgebra_sparse::CsrMatrix;
use std::sync::{Arc, Mutex, PoisonError};

/// A source term `ρ(r, θ)` of the Poisson-like equation.
pub trait SourceFunction<T: Real>: Sync {
    fn evaluate(&self, coord: LogicalCoordinate<T>) -> T;
}

impl<T, F> SourceFunction<T> for F
where
    T: Real,
    F: Fn(LogicalCoordinate<T>) -> T + Sync,
{
    fn evaluate(&self, coord: LogicalCoordinate<T>) -> T {
        self(coord)
    }
}

/// A source given as a 2D tensor-product spline.
#[derive(Debug, Clone, Copy)]
pub struct SplineSource<'a, T: Real> {
    evaluator: &'a SplineEvaluator2D<T>,
    spline: &'a Spline2D<T>,
}

impl<'a, T: Real> SplineSource<'a, T> {
    pub fn new(evaluator: &'a SplineEvaluator2D<T>, spline: &'a Spline2D<T>) -> Self {
        Self { evaluator, spline }
    }
}

impl<'a, T: Real> SourceFunction<T> for SplineSource<'a, T> {
    fn evaluate(&self, coord: LogicalCoordinate<T>) -> T {
        self.evaluator.evaluate(coord, self.spline)
    }
}

/// A source given as a spline on the polar basis.
#[derive(Debug, Clone, Copy)]
pub struct PolarSplineSource<'a, T: Real> {
    evaluator: &'a PolarSplineEvaluator<T>,
    spline: &'a PolarSpline<T>,
}

impl<'a, T: Real> PolarSplineSource<'a, T> {
    pub fn new(evaluator: &'a PolarSplineEvaluator<T>, spline: &'a PolarSpline<T>) -> Self {
        Self { evaluator, spline }
    }
}

impl<'a, T: Real> SourceFunction<T> for PolarSplineSource<'a, T> {
    fn evaluate(&self, coord: LogicalCoordinate<T>) -> T {
        self.evaluator.evaluate(coord, self.spline)
    }
}

/// Finite element solver for `-∇·(α ∇φ) + β φ = ρ` with `φ = 0` at the outer radius.
///
/// The stiffness matrix is assembled and factored once, at construction. Every solve assembles
/// the load vector `bᵢ = ∫ ρ Bᵢ |J|`, solves for the coefficients of `φ` and stores them in an
/// internal buffer, from which `φ` and its logical derivatives are evaluated.
///
/// The coefficient buffer is overwritten by each solve, so concurrent solves on one instance are
/// serialized.
#[derive(Debug)]
pub struct PolarSplineFemPoissonLikeSolver<T: Real> {
    basis: Arc<PolarBSplines<T>>,
    connectivity: PolarElementConnectivity,
    table: PolarQuadratureTable<T>,
    matrix: CsrMatrix<T>,
    linear_solver: LinearSolver<T>,
    evaluator: PolarSplineEvaluator<T>,
    solution: Mutex<PolarSpline<T>>,
}

impl<T: Real> PolarSplineFemPoissonLikeSolver<T> {
    /// Assembles and factors the system for the coefficient functions `alpha` and `beta`.
    ///
    /// Fails if the mapping is singular at a quadrature point or if the factorization fails, the
    /// latter with [`PolarError::SingularSystemError`](crate::PolarError::SingularSystemError).
    pub fn new<M>(
        basis: Arc<PolarBSplines<T>>,
        mapping: &M,
        alpha: impl Fn(LogicalCoordinate<T>) -> T + Sync + Send,
        beta: impl Fn(LogicalCoordinate<T>) -> T + Sync + Send,
        context: &ExecutionContext,
    ) -> eyre::Result<Self>
    where
        M: CurvilinearToCartesian<T> + ?Sized,
    {
        let quadrature = PolarQuadrature::for_bsplines(basis.bsplines_r(), basis.bsplines_theta())?;
        let table = PolarQuadratureTable::new(quadrature, mapping, context)?;
        let connectivity = PolarElementConnectivity::with_outer_dirichlet(&basis);
        debug!(
            "Polar FEM system: {} unknowns, {} elements, {} quadrature points",
            connectivity.num_nodes(),
            table.quadrature().num_cells(),
            table.num_points()
        );

        let matrix = {
            let element_assembler = PolarEllipticAssembler::new(&basis, &connectivity, &table, alpha, beta, context);
            CsrParAssembler::default().assemble(&element_assembler, context)?
        };
        debug!("Assembled stiffness matrix with {} non-zeros", matrix.nnz());
        let linear_solver = LinearSolver::factor(&matrix)?;

        let evaluator = PolarSplineEvaluator::new(basis.clone(), ExtrapolationRule::Null);
        let solution = Mutex::new(PolarSpline::zeros(&basis));
        Ok(Self {
            basis,
            connectivity,
            table,
            matrix,
            linear_solver,
            evaluator,
            solution,
        })
    }

    /// The Poisson equation `-Δφ = ρ`, i.e. `α = 1` and `β = 0`.
    pub fn poisson<M>(basis: Arc<PolarBSplines<T>>, mapping: &M, context: &ExecutionContext) -> eyre::Result<Self>
    where
        M: CurvilinearToCartesian<T> + ?Sized,
    {
        Self::new(basis, mapping, |_| T::one(), |_| T::zero(), context)
    }

    /// Uses coefficient functions given as 2D splines.
    pub fn with_spline_coefficients<M>(
        basis: Arc<PolarBSplines<T>>,
        mapping: &M,
        coefficient_evaluator: &SplineEvaluator2D<T>,
        alpha: &Spline2D<T>,
        beta: &Spline2D<T>,
        context: &ExecutionContext,
    ) -> eyre::Result<Self>
    where
        M: CurvilinearToCartesian<T> + ?Sized,
    {
        Self::new(
            basis,
            mapping,
            |coord| coefficient_evaluator.evaluate(coord, alpha),
            |coord| coefficient_evaluator.evaluate(coord, beta),
            context,
        )
    }

    pub fn basis(&self) -> &Arc<PolarBSplines<T>> {
        &self.basis
    }

    /// The evaluator for solutions. Solutions vanish beyond the outer radius.
    pub fn evaluator(&self) -> &PolarSplineEvaluator<T> {
        &self.evaluator
    }

    /// The assembled stiffness matrix.
    pub fn matrix(&self) -> &CsrMatrix<T> {
        &self.matrix
    }

    pub fn quadrature_table(&self) -> &PolarQuadratureTable<T> {
        &self.table
    }

    /// Number of unknowns: all basis functions except the outer ring.
    pub fn num_unknowns(&self) -> usize {
        self.linear_solver.dim()
    }

    /// Solves for the spline coefficients of `φ`.
    ///
    /// # Panics
    ///
    /// Panics if `spline` was not created for the basis of the solver.
    pub fn solve_into<S>(&self, rhs: &S, spline: &mut PolarSpline<T>, context: &ExecutionContext) -> eyre::Result<()>
    where
        S: SourceFunction<T> + ?Sized,
    {
        let points = self.table.points();
        let mut source_values = vec![T::zero(); points.len()];
        context.fill_indexed(&mut source_values, |i| rhs.evaluate(points[i].coord));

        let element_assembler = PolarSourceAssembler::new(&self.basis, &self.connectivity, &self.table, &source_values);
        let load = VectorParAssembler.assemble_vector(&element_assembler, context)?;
        let coefficients = self.linear_solver.solve(&load);

        assert_eq!(
            spline.len(),
            self.basis.nbasis(),
            "Precondition violated: the spline does not belong to the basis of the solver"
        );
        spline.copy_from_global(&self.basis, coefficients.as_slice());
        Ok(())
    }

    /// Solves and returns the spline coefficients of `φ`.
    pub fn solve_spline<S>(&self, rhs: &S, context: &ExecutionContext) -> eyre::Result<PolarSpline<T>>
    where
        S: SourceFunction<T> + ?Sized,
    {
        let mut spline = PolarSpline::zeros(&self.basis);
        self.solve_into(rhs, &mut spline, context)?;
        Ok(spline)
    }

    /// Solves and evaluates `φ` at `coords`.
    ///
    /// # Panics
    ///
    /// Panics if `coords` and `result` differ in length.
    pub fn solve<S>(
        &self,
        rhs: &S,
        coords: &[LogicalCoordinate<T>],
        result: &mut [T],
        context: &ExecutionContext,
    ) -> eyre::Result<()>
    where
        S: SourceFunction<T> + ?Sized,
    {
        let mut solution = self.lock_solution();
        self.solve_into(rhs, &mut solution, context)?;
        self.evaluator
            .evaluate_batch(PolarDerivative::Value, coords, &solution, result, context);
        Ok(())
    }

    /// Solves and evaluates `φ`, `∂φ/∂r` and `∂φ/∂θ` at `coords`.
    ///
    /// # Panics
    ///
    /// Panics if an output slice differs in length from `coords`.
    pub fn solve_with_derivatives<S>(
        &self,
        rhs: &S,
        coords: &[LogicalCoordinate<T>],
        values: &mut [T],
        deriv_r: &mut [T],
        deriv_theta: &mut [T],
        context: &ExecutionContext,
    ) -> eyre::Result<()>
    where
        S: SourceFunction<T> + ?Sized,
    {
        let mut solution = self.lock_solution();
        self.solve_into(rhs, &mut solution, context)?;
        self.evaluator
            .evaluate_batch(PolarDerivative::Value, coords, &solution, values, context);
        self.evaluator
            .evaluate_batch(PolarDerivative::DerivR, coords, &solution, deriv_r, context);
        self.evaluator
            .evaluate_batch(PolarDerivative::DerivTheta, coords, &solution, deriv_theta, context);
        Ok(())
    }

    /// The coefficients computed by the most recent call to [`solve`](Self::solve) or
    /// [`solve_with_derivatives`](Self::solve_with_derivatives).
    pub fn last_solution(&self) -> PolarSpline<T> {
        self.lock_solution().clone()
    }

    fn lock_solution(&self) -> std::sync::MutexGuard<'_, PolarSpline<T>> {
        // Every solve overwrites the whole buffer before reading it
        self.solution
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
