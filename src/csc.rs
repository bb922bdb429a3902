//! Sparse storage for the QP matrices.
//!
//! `P` travels upper-triangular and `A` in full, both as
//! [`nalgebra_sparse::CscMatrix`]. The solver expands them back to dense once
//! per structural change.

use nalgebra::{DMatrix, RealField, Scalar, SimdRealField};
use nalgebra_sparse::CooMatrix;

pub use nalgebra_sparse::CscMatrix;

/// Compress the upper triangle (diagonal included) of a square dense matrix.
pub fn upper_triangular<F>(m: &DMatrix<F>) -> CscMatrix<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    let (nrows, ncols) = m.shape();
    let mut coo = CooMatrix::new(nrows, ncols);
    for j in 0..ncols {
        for i in 0..(j + 1).min(nrows) {
            let v = m[(i, j)];
            if v != F::zero() {
                coo.push(i, j, v);
            }
        }
    }
    CscMatrix::from(&coo)
}

/// True when no entry is stored below the diagonal.
pub fn is_upper_triangular<F>(m: &CscMatrix<F>) -> bool
where
    F: Scalar,
{
    m.triplet_iter().all(|(i, j, _)| i <= j)
}

/// Rebuild the full symmetric matrix from upper-triangular storage.
pub fn symmetric_to_dense<F>(m: &CscMatrix<F>) -> DMatrix<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    let mut out = DMatrix::zeros(m.nrows(), m.ncols());
    for (i, j, &v) in m.triplet_iter() {
        out[(i, j)] = v;
        out[(j, i)] = v;
    }
    out
}
