use crate::mapping::{try_inverse_jacobian_matrix, CurvilinearToCartesian};
use crate::polar::{PolarBSplines, MAX_SINGULAR, MAX_TENSOR_SUPPORT};
use crate::quadrature::PolarQuadrature;
use crate::workspace::{with_thread_local_buffer, ThreadLocalWorkspace};
use crate::{ExecutionContext, LogicalCoordinate, Real};
use eyre::eyre;
use itertools::izip;
use nalgebra::{DMatrixViewMut, DVectorViewMut, Matrix2, Scalar, Vector2};

/// Describes which degrees of freedom every element couples.
///
/// Degrees of freedom are scalar: the "nodes" of an element are the global indices of the basis
/// functions supported on it.
pub trait ElementConnectivityAssembler {
    fn num_elements(&self) -> usize;

    fn num_nodes(&self) -> usize;

    fn element_node_count(&self, element_index: usize) -> usize;

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize);
}

pub trait ElementMatrixAssembler<T: Scalar>: ElementConnectivityAssembler {
    fn assemble_element_matrix_into(&self, element_index: usize, output: DMatrixViewMut<T>) -> eyre::Result<()>;
}

pub trait ElementVectorAssembler<T: Scalar>: ElementConnectivityAssembler {
    fn assemble_element_vector_into(&self, element_index: usize, output: DVectorViewMut<T>) -> eyre::Result<()>;
}

/// The elements of the polar grid and the basis functions they couple.
///
/// Element `i_r * n_cells_θ + i_θ` is the cell `(i_r, i_θ)` of the logical grid. Only functions with
/// a global index below `num_nodes()` are unknowns; the others are fixed to zero and left out of
/// the element.
#[derive(Debug, Clone)]
pub struct PolarElementConnectivity {
    ncells_r: usize,
    ncells_theta: usize,
    n_rings: usize,
    n_singular: usize,
    num_nodes: usize,
    offsets: Vec<usize>,
    nodes: Vec<usize>,
    // Position of every node in the list of functions supported on its cell
    local_functions: Vec<usize>,
}

impl PolarElementConnectivity {
    /// Connectivity for the unknowns `0..num_nodes` of the polar basis.
    ///
    /// # Panics
    ///
    /// Panics if `num_nodes` exceeds the size of the basis.
    pub fn new<T: Real>(basis: &PolarBSplines<T>, num_nodes: usize) -> Self {
        assert!(
            num_nodes <= basis.nbasis(),
            "cannot have {num_nodes} unknowns on a basis of size {}",
            basis.nbasis()
        );
        let (ncells_r, ncells_theta) = basis.ncells();
        let mut offsets = Vec::with_capacity(ncells_r * ncells_theta + 1);
        let mut nodes = Vec::new();
        let mut local_functions = Vec::new();
        let mut functions = Vec::new();
        offsets.push(0);
        for ir in 0..ncells_r {
            for itheta in 0..ncells_theta {
                basis.functions_on_cell(ir, itheta, &mut functions);
                for (local, &global) in functions.iter().enumerate() {
                    if global < num_nodes {
                        nodes.push(global);
                        local_functions.push(local);
                    }
                }
                offsets.push(nodes.len());
            }
        }

        Self {
            ncells_r,
            ncells_theta,
            n_rings: basis.n_rings(),
            n_singular: basis.n_singular(),
            num_nodes,
            offsets,
            nodes,
            local_functions,
        }
    }

    /// Connectivity with a homogeneous Dirichlet condition at the outer radius.
    ///
    /// The functions of the last radial ring are the only ones that do not vanish at `r_max`, so
    /// they are removed from the unknowns.
    pub fn with_outer_dirichlet<T: Real>(basis: &PolarBSplines<T>) -> Self {
        Self::new(basis, basis.nbasis() - basis.nbasis_theta())
    }

    /// The cell `(i_r, i_θ)` of an element.
    pub fn cell(&self, element_index: usize) -> (usize, usize) {
        (element_index / self.ncells_theta, element_index % self.ncells_theta)
    }

    pub fn element_index(&self, ir: usize, itheta: usize) -> usize {
        ir * self.ncells_theta + itheta
    }

    pub fn element_nodes(&self, element_index: usize) -> &[usize] {
        &self.nodes[self.offsets[element_index]..self.offsets[element_index + 1]]
    }

    /// For every node of the element, its position among the functions supported on the cell.
    ///
    /// Positions follow [`PolarBSplines::functions_on_cell`]: singular functions first, then the
    /// tensor-product functions.
    pub fn element_local_functions(&self, element_index: usize) -> &[usize] {
        &self.local_functions[self.offsets[element_index]..self.offsets[element_index + 1]]
    }

    /// Number of singular functions among the functions supported on the element's cell.
    pub fn element_singular_count(&self, element_index: usize) -> usize {
        let (ir, _) = self.cell(element_index);
        if ir < self.n_rings {
            self.n_singular
        } else {
            0
        }
    }

    /// Largest number of nodes of any element.
    pub fn max_element_node_count(&self) -> usize {
        self.offsets
            .windows(2)
            .map(|range| range[1] - range[0])
            .max()
            .unwrap_or(0)
    }
}

impl ElementConnectivityAssembler for PolarElementConnectivity {
    fn num_elements(&self) -> usize {
        self.ncells_r * self.ncells_theta
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn element_node_count(&self, element_index: usize) -> usize {
        self.offsets[element_index + 1] - self.offsets[element_index]
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        output.copy_from_slice(self.element_nodes(element_index));
    }
}

/// Geometric data at a quadrature point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraturePointData<T: Scalar> {
    pub coord: LogicalCoordinate<T>,
    /// The quadrature weight times `|det J|`.
    pub weight: T,
    /// `G⁻¹`, the inverse metric tensor.
    pub inverse_metric: Matrix2<T>,
}

/// The quadrature points of every cell together with the mapping data the weak form needs.
#[derive(Debug, Clone)]
pub struct PolarQuadratureTable<T: Real> {
    quadrature: PolarQuadrature<T>,
    data: Vec<QuadraturePointData<T>>,
}

impl<T: Real> PolarQuadratureTable<T> {
    /// Evaluates the mapping at every quadrature point, in parallel.
    ///
    /// Fails if the Jacobian is singular at a quadrature point.
    pub fn new<M>(quadrature: PolarQuadrature<T>, mapping: &M, context: &ExecutionContext) -> eyre::Result<Self>
    where
        M: CurvilinearToCartesian<T> + ?Sized,
    {
        let data = context.map_collect(quadrature.num_points(), |idx| {
            let (weight, coord) = quadrature.point(idx);
            let jacobian = mapping.jacobian_matrix(&coord);
            let inverse = try_inverse_jacobian_matrix(&jacobian).map_err(|err| {
                eyre!("Invalid mapping at quadrature point (r = {}, θ = {}): {err}", coord.r, coord.theta)
            })?;
            Ok(QuadraturePointData {
                coord,
                weight: weight * jacobian.determinant().abs(),
                inverse_metric: inverse * inverse.transpose(),
            })
        });
        let data = data.into_iter().collect::<eyre::Result<Vec<_>>>()?;
        Ok(Self { quadrature, data })
    }

    pub fn quadrature(&self) -> &PolarQuadrature<T> {
        &self.quadrature
    }

    pub fn num_points(&self) -> usize {
        self.data.len()
    }

    /// Data at all quadrature points, in the order of [`PolarQuadrature`].
    pub fn points(&self) -> &[QuadraturePointData<T>] {
        &self.data
    }

    pub fn coords(&self) -> Vec<LogicalCoordinate<T>> {
        self.data.iter().map(|point| point.coord).collect()
    }

    /// The range of global quadrature indices belonging to cell `(i_r, i_θ)`.
    pub fn cell_range(&self, ir: usize, itheta: usize) -> std::ops::Range<usize> {
        let offset = self.quadrature.cell_offset(ir, itheta);
        offset..offset + self.quadrature.points_per_cell()
    }

    pub fn cell_points(&self, ir: usize, itheta: usize) -> &[QuadraturePointData<T>] {
        &self.data[self.cell_range(ir, itheta)]
    }
}

/// Values and logical gradients of the polar basis functions of one element at one point.
#[derive(Debug)]
struct ElementBasisBuffer<T: Scalar> {
    values: Vec<T>,
    gradients: Vec<Vector2<T>>,
}

impl<T: Real> ElementBasisBuffer<T> {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            gradients: Vec::new(),
        }
    }

    /// Evaluates the element's functions at `coord`, and their gradients if requested.
    fn populate(
        &mut self,
        basis: &PolarBSplines<T>,
        coord: &LogicalCoordinate<T>,
        local_functions: &[usize],
        singular_count: usize,
        with_gradients: bool,
    ) {
        let n_singular = basis.n_singular();
        let tensor_len = basis.tensor_buffer_len();
        let mut singular = [T::zero(); MAX_SINGULAR];
        let mut tensor = [T::zero(); MAX_TENSOR_SUPPORT];
        let (singular, tensor) = (&mut singular[..n_singular], &mut tensor[..tensor_len]);

        let support = basis.eval_basis(coord, singular, tensor);
        debug_assert!(
            local_functions.len() <= singular_count + support.nr * support.ntheta,
            "quadrature point does not lie in the element"
        );
        self.values.clear();
        self.values.extend(
            local_functions
                .iter()
                .map(|&p| local_value(p, singular_count, singular, tensor)),
        );
        if !with_gradients {
            return;
        }

        self.gradients.clear();
        self.gradients
            .resize(local_functions.len(), Vector2::zeros());
        basis.eval_deriv_r(coord, singular, tensor);
        for (gradient, &p) in self.gradients.iter_mut().zip(local_functions) {
            gradient.x = local_value(p, singular_count, singular, tensor);
        }
        basis.eval_deriv_theta(coord, singular, tensor);
        for (gradient, &p) in self.gradients.iter_mut().zip(local_functions) {
            gradient.y = local_value(p, singular_count, singular, tensor);
        }
    }
}

fn local_value<T: Real>(position: usize, singular_count: usize, singular: &[T], tensor: &[T]) -> T {
    if position < singular_count {
        singular[position]
    } else {
        tensor[position - singular_count]
    }
}

/// Element matrices of the bilinear form `∫ (α ∇Bᵢ·G⁻¹∇Bⱼ + β BᵢBⱼ) |J| dr dθ`.
///
/// The coefficients `α` and `β` are sampled once per quadrature point at construction.
#[derive(Debug)]
pub struct PolarEllipticAssembler<'a, T: Real> {
    basis: &'a PolarBSplines<T>,
    connectivity: &'a PolarElementConnectivity,
    table: &'a PolarQuadratureTable<T>,
    alpha: Vec<T>,
    beta: Vec<T>,
    workspace: ThreadLocalWorkspace,
}

impl<'a, T: Real> PolarEllipticAssembler<'a, T> {
    pub fn new(
        basis: &'a PolarBSplines<T>,
        connectivity: &'a PolarElementConnectivity,
        table: &'a PolarQuadratureTable<T>,
        alpha: impl Fn(LogicalCoordinate<T>) -> T + Sync + Send,
        beta: impl Fn(LogicalCoordinate<T>) -> T + Sync + Send,
        context: &ExecutionContext,
    ) -> Self {
        let points = table.points();
        let alpha = context.map_collect(points.len(), |i| alpha(points[i].coord));
        let beta = context.map_collect(points.len(), |i| beta(points[i].coord));
        Self {
            basis,
            connectivity,
            table,
            alpha,
            beta,
            workspace: ThreadLocalWorkspace::new(),
        }
    }
}

impl<'a, T: Real> ElementConnectivityAssembler for PolarEllipticAssembler<'a, T> {
    fn num_elements(&self) -> usize {
        self.connectivity.num_elements()
    }

    fn num_nodes(&self) -> usize {
        self.connectivity.num_nodes()
    }

    fn element_node_count(&self, element_index: usize) -> usize {
        self.connectivity.element_node_count(element_index)
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        self.connectivity
            .populate_element_nodes(output, element_index)
    }
}

impl<'a, T: Real> ElementMatrixAssembler<T> for PolarEllipticAssembler<'a, T> {
    fn assemble_element_matrix_into(&self, element_index: usize, mut output: DMatrixViewMut<T>) -> eyre::Result<()> {
        let n = self.connectivity.element_node_count(element_index);
        assert_eq!(output.shape(), (n, n), "Output matrix dimension mismatch");
        let (ir, itheta) = self.connectivity.cell(element_index);
        let local_functions = self.connectivity.element_local_functions(element_index);
        let singular_count = self.connectivity.element_singular_count(element_index);
        let range = self.table.cell_range(ir, itheta);

        with_thread_local_buffer(&self.workspace, ElementBasisBuffer::<T>::new, |buffer| {
            for (point, &alpha, &beta) in izip!(
                &self.table.points()[range.clone()],
                &self.alpha[range.clone()],
                &self.beta[range.clone()]
            ) {
                buffer.populate(self.basis, &point.coord, local_functions, singular_count, true);
                for i in 0..n {
                    let flux = point.inverse_metric * buffer.gradients[i] * alpha;
                    let mass = buffer.values[i] * beta;
                    for j in 0..n {
                        output[(i, j)] += point.weight * (flux.dot(&buffer.gradients[j]) + mass * buffer.values[j]);
                    }
                }
            }
        });
        Ok(())
    }
}

/// Element vectors of the linear form `∫ ρ Bᵢ |J| dr dθ`.
///
/// The source `ρ` is given by its values at the quadrature points of the table.
#[derive(Debug)]
pub struct PolarSourceAssembler<'a, T: Real> {
    basis: &'a PolarBSplines<T>,
    connectivity: &'a PolarElementConnectivity,
    table: &'a PolarQuadratureTable<T>,
    source_values: &'a [T],
    workspace: ThreadLocalWorkspace,
}

impl<'a, T: Real> PolarSourceAssembler<'a, T> {
    /// # Panics
    ///
    /// Panics if there is not exactly one source value per quadrature point.
    pub fn new(
        basis: &'a PolarBSplines<T>,
        connectivity: &'a PolarElementConnectivity,
        table: &'a PolarQuadratureTable<T>,
        source_values: &'a [T],
    ) -> Self {
        assert_eq!(
            source_values.len(),
            table.num_points(),
            "Precondition violated: one source value per quadrature point is required"
        );
        Self {
            basis,
            connectivity,
            table,
            source_values,
            workspace: ThreadLocalWorkspace::new(),
        }
    }
}

impl<'a, T: Real> ElementConnectivityAssembler for PolarSourceAssembler<'a, T> {
    fn num_elements(&self) -> usize {
        self.connectivity.num_elements()
    }

    fn num_nodes(&self) -> usize {
        self.connectivity.num_nodes()
    }

    fn element_node_count(&self, element_index: usize) -> usize {
        self.connectivity.element_node_count(element_index)
    }

    fn populate_element_nodes(&self, output: &mut [usize], element_index: usize) {
        self.connectivity
            .populate_element_nodes(output, element_index)
    }
}

impl<'a, T: Real> ElementVectorAssembler<T> for PolarSourceAssembler<'a, T> {
    fn assemble_element_vector_into(&self, element_index: usize, mut output: DVectorViewMut<T>) -> eyre::Result<()> {
        let n = self.connectivity.element_node_count(element_index);
        assert_eq!(output.len(), n, "Output vector dimension mismatch");
        let (ir, itheta) = self.connectivity.cell(element_index);
        let local_functions = self.connectivity.element_local_functions(element_index);
        let singular_count = self.connectivity.element_singular_count(element_index);
        let range = self.table.cell_range(ir, itheta);

        with_thread_local_buffer(&self.workspace, ElementBasisBuffer::<T>::new, |buffer| {
            for (point, &rho) in self.table.points()[range.clone()]
                .iter()
                .zip(&self.source_values[range.clone()])
            {
                buffer.populate(self.basis, &point.coord, local_functions, singular_count, false);
                for (out, &value) in output.iter_mut().zip(&buffer.values) {
                    *out += point.weight * rho * value;
                }
            }
        });
        Ok(())
    }
}
