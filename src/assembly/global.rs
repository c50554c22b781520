use crate::assembly::local::{ElementConnectivityAssembler, ElementMatrixAssembler, ElementVectorAssembler};
use crate::ExecutionContext;
use eyre::eyre;
use nalgebra::storage::Storage;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut, Dyn, Matrix, RealField, Scalar, U1};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::slice::ParallelSliceMut;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::ops::Range;

/// Number of elements whose local contributions are computed together in one parallel stage.
const PARALLEL_BATCH_SIZE: usize = 512;

/// An assembler for CSR matrices.
#[derive(Debug, Clone)]
pub struct CsrAssembler<T: Scalar> {
    // All members are buffers that help prevent unnecessary allocations
    // when assembling multiple matrices with the same assembler
    workspace: RefCell<CsrAssemblerWorkspace<T>>,
}

impl<T: Scalar> Default for CsrAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(CsrAssemblerWorkspace::default()),
        }
    }
}

#[derive(Debug, Clone)]
struct CsrAssemblerWorkspace<T: Scalar> {
    connectivity_permutation: Vec<usize>,
    element_global_nodes: Vec<usize>,
    element_matrix: DMatrix<T>,
}

impl<T: Scalar> Default for CsrAssemblerWorkspace<T> {
    fn default() -> Self {
        Self {
            connectivity_permutation: Vec::new(),
            element_global_nodes: Vec::new(),
            element_matrix: DMatrix::from_row_slice(0, 0, &[]),
        }
    }
}

impl<T: Scalar> CsrAssembler<T> {
    /// The sparsity pattern coupling every pair of nodes that share an element.
    pub fn assemble_pattern<A>(&self, element_assembler: &A) -> eyre::Result<SparsityPattern>
    where
        A: ElementConnectivityAssembler + ?Sized,
    {
        // Collecting into a BTreeSet stores each entry once, however many elements share it
        let mut matrix_entries = BTreeSet::new();
        let mut element_global_nodes = Vec::new();
        for i in 0..element_assembler.num_elements() {
            let element_node_count = element_assembler.element_node_count(i);
            element_global_nodes.resize(element_node_count, usize::MAX);
            element_assembler.populate_element_nodes(&mut element_global_nodes, i);

            for &node_i in &element_global_nodes {
                for &node_j in &element_global_nodes {
                    matrix_entries.insert((node_i, node_j));
                }
            }
        }

        pattern_from_sorted_entries(element_assembler.num_nodes(), matrix_entries)
    }
}

/// Builds a square pattern from sorted, duplicate-free `(row, column)` entries.
fn pattern_from_sorted_entries(
    num_rows: usize,
    entries: impl IntoIterator<Item = (usize, usize)>,
) -> eyre::Result<SparsityPattern> {
    let mut offsets = Vec::with_capacity(num_rows + 1);
    let mut column_indices = Vec::new();

    offsets.push(0);
    for (i, j) in entries {
        // A while loop, so that consecutive empty rows are handled
        while i + 1 > offsets.len() {
            offsets.push(column_indices.len());
        }
        column_indices.push(j);
    }

    // Trailing empty rows
    while offsets.len() < (num_rows + 1) {
        offsets.push(column_indices.len());
    }

    SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
        .map_err(|err| eyre!("Failed to construct sparsity pattern: {err}"))
}

impl<T: RealField> CsrAssembler<T> {
    pub fn assemble<A>(&self, element_assembler: &A) -> eyre::Result<CsrMatrix<T>>
    where
        A: ElementMatrixAssembler<T> + ?Sized,
    {
        let pattern = self.assemble_pattern(element_assembler)?;
        let initial_matrix_values = vec![T::zero(); pattern.nnz()];
        let mut matrix = CsrMatrix::try_from_pattern_and_values(pattern, initial_matrix_values)
            .map_err(|err| eyre!("Failed to construct CSR matrix: {err}"))?;
        self.assemble_into_csr(&mut matrix, element_assembler)?;
        Ok(matrix)
    }

    /// Adds the element matrices to an existing matrix.
    ///
    /// The sparsity pattern of `csr` must contain every entry coupled by an element.
    pub fn assemble_into_csr<A>(&self, csr: &mut CsrMatrix<T>, element_assembler: &A) -> eyre::Result<()>
    where
        A: ElementMatrixAssembler<T> + ?Sized,
    {
        let ws = &mut *self.workspace.borrow_mut();
        let connectivity_permutation = &mut ws.connectivity_permutation;
        let element_global_nodes = &mut ws.element_global_nodes;
        let element_matrix = &mut ws.element_matrix;

        for i in 0..element_assembler.num_elements() {
            let element_node_count = element_assembler.element_node_count(i);

            element_global_nodes.resize(element_node_count, 0);
            element_matrix.resize_mut(element_node_count, element_node_count, T::zero());
            element_matrix.fill(T::zero());

            let matrix_view = DMatrixViewMut::from(&mut *element_matrix);
            element_assembler.assemble_element_matrix_into(i, matrix_view)?;
            element_assembler.populate_element_nodes(element_global_nodes, i);
            add_element_matrix_to_csr(csr, element_global_nodes, element_matrix, connectivity_permutation)?;
        }

        Ok(())
    }
}

fn add_element_matrix_to_csr<T: RealField>(
    csr: &mut CsrMatrix<T>,
    element_global_nodes: &[usize],
    element_matrix: &DMatrix<T>,
    connectivity_permutation: &mut Vec<usize>,
) -> eyre::Result<()> {
    connectivity_permutation.clear();
    connectivity_permutation.extend(0..element_global_nodes.len());
    connectivity_permutation.sort_unstable_by_key(|i| element_global_nodes[*i]);

    for (local_row, &global_row) in element_global_nodes.iter().enumerate() {
        let mut csr_row = csr.row_mut(global_row);
        let (column_indices, values) = csr_row.cols_and_values_mut();
        add_element_row_to_csr_row(
            column_indices,
            values,
            element_global_nodes,
            connectivity_permutation,
            &element_matrix.row(local_row),
        )?;
    }
    Ok(())
}

/// Add a row of a local element matrix to a row of a CSR matrix.
///
/// `node_connectivity`: The global indices of the element's nodes.
/// `sorted_permutation`: The local indices of nodes in the element, ordered such that the
///    corresponding global indices are sorted.
/// `local_row`: The local row of the element matrix.
fn add_element_row_to_csr_row<T, S>(
    column_indices: &[usize],
    values: &mut [T],
    node_connectivity: &[usize],
    sorted_permutation: &[usize],
    local_row: &Matrix<T, U1, Dyn, S>,
) -> eyre::Result<()>
where
    T: RealField,
    S: Storage<T, U1, Dyn>,
{
    assert_eq!(node_connectivity.len(), sorted_permutation.len());
    assert_eq!(node_connectivity.len(), local_row.ncols());

    let mut csr_col_idx_iter = column_indices.iter().copied().enumerate();
    for &node_local_idx in sorted_permutation {
        let global_col_index = node_connectivity[node_local_idx];
        let (local_csr_col_idx, _) = csr_col_idx_iter
            .find(|&(_, csr_col_idx)| csr_col_idx == global_col_index)
            .ok_or_else(|| eyre!("Column {global_col_index} is missing from the sparsity pattern"))?;
        values[local_csr_col_idx] += local_row[node_local_idx].clone();
    }
    Ok(())
}

/// Splits `0..num_elements` into consecutive batches of at most [`PARALLEL_BATCH_SIZE`] elements.
fn element_batches(num_elements: usize) -> impl Iterator<Item = Range<usize>> {
    (0..num_elements)
        .step_by(PARALLEL_BATCH_SIZE)
        .map(move |start| start..num_elements.min(start + PARALLEL_BATCH_SIZE))
}

fn element_nodes<A>(element_assembler: &A, element_index: usize) -> Vec<usize>
where
    A: ElementConnectivityAssembler + ?Sized,
{
    let mut nodes = vec![usize::MAX; element_assembler.element_node_count(element_index)];
    element_assembler.populate_element_nodes(&mut nodes, element_index);
    nodes
}

/// A parallel assembler for CSR matrices.
///
/// Element matrices are computed in parallel batches on the threads of an [`ExecutionContext`].
/// They are added to the global matrix in element order, so the result does not depend on the
/// number of threads.
#[derive(Debug)]
pub struct CsrParAssembler<T: Scalar> {
    connectivity_permutation: RefCell<Vec<usize>>,
    marker: std::marker::PhantomData<T>,
}

impl<T: Scalar> Default for CsrParAssembler<T> {
    fn default() -> Self {
        Self {
            connectivity_permutation: RefCell::new(Vec::new()),
            marker: Default::default(),
        }
    }
}

impl<T: Scalar> CsrParAssembler<T> {
    pub fn assemble_pattern<A>(
        &self,
        element_assembler: &A,
        context: &ExecutionContext,
    ) -> eyre::Result<SparsityPattern>
    where
        A: ElementConnectivityAssembler + Sync + ?Sized,
    {
        let mut entries = Vec::new();
        for batch in element_batches(element_assembler.num_elements()) {
            let element_entries = context.map_collect(batch.len(), |k| {
                let nodes = element_nodes(element_assembler, batch.start + k);
                let mut element_entries = Vec::with_capacity(nodes.len() * nodes.len());
                for &node_i in &nodes {
                    element_entries.extend(nodes.iter().map(|&node_j| (node_i, node_j)));
                }
                element_entries
            });
            let mut batch_entries: Vec<_> = element_entries.into_iter().flatten().collect();
            // Entries shared by elements of one batch are kept once
            context.install(|| batch_entries.par_sort_unstable());
            batch_entries.dedup();
            entries.append(&mut batch_entries);
        }
        context.install(|| entries.par_sort_unstable());
        entries.dedup();
        pattern_from_sorted_entries(element_assembler.num_nodes(), entries)
    }
}

impl<T: RealField> CsrParAssembler<T> {
    pub fn assemble<A>(&self, element_assembler: &A, context: &ExecutionContext) -> eyre::Result<CsrMatrix<T>>
    where
        A: ElementMatrixAssembler<T> + Sync + ?Sized,
    {
        let pattern = self.assemble_pattern(element_assembler, context)?;
        let initial_matrix_values = vec![T::zero(); pattern.nnz()];
        let mut matrix = CsrMatrix::try_from_pattern_and_values(pattern, initial_matrix_values)
            .map_err(|err| eyre!("Failed to construct CSR matrix: {err}"))?;
        self.assemble_into_csr(&mut matrix, element_assembler, context)?;
        Ok(matrix)
    }

    /// Adds the element matrices to an existing matrix.
    ///
    /// The sparsity pattern of `csr` must contain every entry coupled by an element.
    pub fn assemble_into_csr<A>(
        &self,
        csr: &mut CsrMatrix<T>,
        element_assembler: &A,
        context: &ExecutionContext,
    ) -> eyre::Result<()>
    where
        A: ElementMatrixAssembler<T> + Sync + ?Sized,
    {
        let connectivity_permutation = &mut *self.connectivity_permutation.borrow_mut();
        for batch in element_batches(element_assembler.num_elements()) {
            let contributions = context.map_collect(batch.len(), |k| -> eyre::Result<(Vec<usize>, DMatrix<T>)> {
                let element_index = batch.start + k;
                let nodes = element_nodes(element_assembler, element_index);
                let mut element_matrix = DMatrix::zeros(nodes.len(), nodes.len());
                let matrix_view = DMatrixViewMut::from(&mut element_matrix);
                element_assembler.assemble_element_matrix_into(element_index, matrix_view)?;
                Ok((nodes, element_matrix))
            });
            for contribution in contributions {
                let (nodes, element_matrix) = contribution?;
                add_element_matrix_to_csr(csr, &nodes, &element_matrix, connectivity_permutation)?;
            }
        }
        Ok(())
    }
}

/// An assembler for dense global vectors.
#[derive(Debug, Clone)]
pub struct VectorAssembler<T: Scalar> {
    workspace: RefCell<VectorAssemblerWorkspace<T>>,
}

impl<T: Scalar> Default for VectorAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(VectorAssemblerWorkspace::default()),
        }
    }
}

#[derive(Debug, Clone)]
struct VectorAssemblerWorkspace<T: Scalar> {
    element_global_nodes: Vec<usize>,
    element_vector: DVector<T>,
}

impl<T: Scalar> Default for VectorAssemblerWorkspace<T> {
    fn default() -> Self {
        Self {
            element_global_nodes: Vec::new(),
            element_vector: DVector::from_vec(Vec::new()),
        }
    }
}

impl<T: RealField> VectorAssembler<T> {
    pub fn assemble_vector<A>(&self, element_assembler: &A) -> eyre::Result<DVector<T>>
    where
        A: ElementVectorAssembler<T> + ?Sized,
    {
        let mut output = DVector::zeros(element_assembler.num_nodes());
        self.assemble_vector_into(DVectorViewMut::from(&mut output), element_assembler)?;
        Ok(output)
    }

    /// Adds the element vectors to `output`.
    ///
    /// # Panics
    ///
    /// Panics if `output` does not have one entry per node.
    pub fn assemble_vector_into<A>(&self, mut output: DVectorViewMut<T>, element_assembler: &A) -> eyre::Result<()>
    where
        A: ElementVectorAssembler<T> + ?Sized,
    {
        assert_eq!(
            output.len(),
            element_assembler.num_nodes(),
            "Output vector dimension mismatch"
        );
        let ws = &mut *self.workspace.borrow_mut();
        let element_global_nodes = &mut ws.element_global_nodes;
        let element_vector = &mut ws.element_vector;

        for i in 0..element_assembler.num_elements() {
            let element_node_count = element_assembler.element_node_count(i);
            element_global_nodes.resize(element_node_count, 0);
            element_vector.resize_vertically_mut(element_node_count, T::zero());
            element_vector.fill(T::zero());

            element_assembler.assemble_element_vector_into(i, DVectorViewMut::from(&mut *element_vector))?;
            element_assembler.populate_element_nodes(element_global_nodes, i);

            for (local, &global) in element_global_nodes.iter().enumerate() {
                output[global] += element_vector[local].clone();
            }
        }
        Ok(())
    }
}

/// A parallel assembler for dense global vectors.
///
/// Element vectors are computed in parallel batches and summed in element order.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorParAssembler;

impl VectorParAssembler {
    pub fn assemble_vector<T, A>(&self, element_assembler: &A, context: &ExecutionContext) -> eyre::Result<DVector<T>>
    where
        T: RealField,
        A: ElementVectorAssembler<T> + Sync + ?Sized,
    {
        let mut output = DVector::zeros(element_assembler.num_nodes());
        self.assemble_vector_into(DVectorViewMut::from(&mut output), element_assembler, context)?;
        Ok(output)
    }

    /// Adds the element vectors to `output`.
    ///
    /// # Panics
    ///
    /// Panics if `output` does not have one entry per node.
    pub fn assemble_vector_into<T, A>(
        &self,
        mut output: DVectorViewMut<T>,
        element_assembler: &A,
        context: &ExecutionContext,
    ) -> eyre::Result<()>
    where
        T: RealField,
        A: ElementVectorAssembler<T> + Sync + ?Sized,
    {
        assert_eq!(
            output.len(),
            element_assembler.num_nodes(),
            "Output vector dimension mismatch"
        );
        for batch in element_batches(element_assembler.num_elements()) {
            let contributions = context.map_collect(batch.len(), |k| -> eyre::Result<(Vec<usize>, DVector<T>)> {
                let element_index = batch.start + k;
                let nodes = element_nodes(element_assembler, element_index);
                let mut element_vector = DVector::zeros(nodes.len());
                let vector_view = DVectorViewMut::from(&mut element_vector);
                element_assembler.assemble_element_vector_into(element_index, vector_view)?;
                Ok((nodes, element_vector))
            });
            for contribution in contributions {
                let (nodes, element_vector) = contribution?;
                for (local, &global) in nodes.iter().enumerate() {
                    output[global] += element_vector[local].clone();
                }
            }
        }
        Ok(())
    }
}
