//! Assembly of the finite element system on the polar basis.
//!
//! An *element* is a cell `(i_r, i_θ)` of the logical grid. [`local`] computes element matrices
//! and vectors from the polar basis and a quadrature table, [`global`] scatters them into a sparse
//! matrix or a dense vector.

pub mod global;
pub mod local;
