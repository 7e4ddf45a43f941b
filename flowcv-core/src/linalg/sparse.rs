//! Sparse matrix types and operations.
//!
//! Measurement and basis matrices are stored with `sprs`. Observation
//! matrices are kept in CSR so that row subsets (cross-validation folds) can
//! be cut cheaply; the products below work for either storage order.

use sprs::{CsMat, TriMat};

/// Sparse matrix (CSR or CSC).
pub type SparseMat = CsMat<f64>;

/// Triplet format sparse matrix builder.
pub type SparseTriMat = TriMat<f64>;

/// Build a sparse CSR matrix from triplets (row, col, value).
///
/// Duplicate entries are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseMat
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csr()
}

/// Create an identity matrix in CSR format.
pub fn identity(n: usize) -> SparseMat {
    from_triplets(n, n, (0..n).map(|i| (i, i, 1.0)))
}

/// Sparse matrix-vector product: y = alpha * A * x + beta * y
pub fn spmv(a: &SparseMat, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());

    scale_in_place(y, beta);

    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[row] += alpha * (*val) * x[col];
        }
    }
}

/// Transpose-vector product: y = alpha * A^T * x + beta * y
///
/// Never materializes A^T.
pub fn spmv_transpose(a: &SparseMat, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.rows(), x.len());
    assert_eq!(a.cols(), y.len());

    scale_in_place(y, beta);

    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[col] += alpha * (*val) * x[row];
        }
    }
}

fn scale_in_place(y: &mut [f64], beta: f64) {
    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }
}

/// Extract the rows listed in `rows` (in that order) as a new CSR matrix.
pub fn select_rows(a: &SparseMat, rows: &[usize]) -> SparseMat {
    let csr;
    let a = if a.is_csr() {
        a
    } else {
        csr = a.to_csr();
        &csr
    };

    let mut tri = TriMat::new((rows.len(), a.cols()));
    for (new_row, &row) in rows.iter().enumerate() {
        if let Some(view) = a.outer_view(row) {
            for (col, &val) in view.iter() {
                tri.add_triplet(new_row, col, val);
            }
        }
    }
    tri.to_csr()
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(ai, bi)| ai * bi).sum()
}

#[inline]
pub fn norm2(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

#[inline]
pub fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, &x| acc.max(x.abs()))
}

/// y += alpha * x
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}
