//! Problem data structures and validation.
//!
//! A problem instance estimates a block-simplex constrained vector `x` from
//! linear observations `b ≈ A x`. Optimization happens in reduced
//! coordinates `z`, with the full solution recovered as
//!
//! ```text
//! x = x0 + N z
//! ```
//!
//! where `N` spans the feasible subspace and `x0` is a feasible anchor with a
//! single unit entry per block.
//!
//! # Dimensions
//!
//! - `m`: number of observations (rows of A, length of b)
//! - `n`: full solution dimension (cols of A, rows of N, Σ block_sizes)
//! - `r`: reduced dimension (cols of N)

use crate::error::{CvError, CvResult};
use crate::linalg::sparse::{self, SparseMat};

/// Immutable per-run problem data.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    /// Measurement matrix A (m × n, CSR)
    pub a: SparseMat,

    /// Observations b (length m)
    pub b: Vec<f64>,

    /// Basis N of the feasible subspace (n × r)
    pub basis: SparseMat,

    /// Sizes of the contiguous simplex blocks of x (sum to n)
    pub block_sizes: Vec<usize>,

    /// Reference solution, used for evaluation only (length n)
    pub x_true: Vec<f64>,

    /// Feasible anchor point (length n)
    pub x0: Vec<f64>,
}

impl ProblemInstance {
    /// Assemble and validate a problem instance.
    ///
    /// The anchor point is derived from `block_sizes`.
    pub fn new(
        a: SparseMat,
        b: Vec<f64>,
        basis: SparseMat,
        block_sizes: Vec<usize>,
        x_true: Vec<f64>,
    ) -> CvResult<Self> {
        let x0 = anchor_point(&block_sizes);
        let a = if a.is_csr() { a } else { a.to_csr() };
        let prob = Self { a, b, basis, block_sizes, x_true, x0 };
        prob.validate()?;
        Ok(prob)
    }

    /// Number of observations (m)
    pub fn num_obs(&self) -> usize {
        self.b.len()
    }

    /// Full solution dimension (n)
    pub fn full_dim(&self) -> usize {
        self.x0.len()
    }

    /// Reduced coordinate dimension (r)
    pub fn reduced_dim(&self) -> usize {
        self.basis.cols()
    }

    /// Validate dimensions of A, b, N and the block partition.
    pub fn validate(&self) -> CvResult<()> {
        let m = self.num_obs();
        let n: usize = self.block_sizes.iter().sum();

        if self.block_sizes.is_empty() {
            return Err(CvError::DataShapeMismatch("block_sizes is empty".to_string()));
        }
        if let Some(pos) = self.block_sizes.iter().position(|&s| s == 0) {
            return Err(CvError::DataShapeMismatch(format!("block {} has size 0", pos)));
        }
        if m == 0 {
            return Err(CvError::DataShapeMismatch("b is empty".to_string()));
        }
        if self.a.rows() != m {
            return Err(CvError::DataShapeMismatch(format!(
                "A has {} rows, b has length {}",
                self.a.rows(),
                m
            )));
        }
        if self.a.cols() != n {
            return Err(CvError::DataShapeMismatch(format!(
                "A has {} cols, block sizes sum to {}",
                self.a.cols(),
                n
            )));
        }
        if self.basis.rows() != n {
            return Err(CvError::DataShapeMismatch(format!(
                "N has {} rows, block sizes sum to {}",
                self.basis.rows(),
                n
            )));
        }
        let r: usize = self.block_sizes.iter().map(|&s| s - 1).sum();
        if self.basis.cols() != r {
            return Err(CvError::DataShapeMismatch(format!(
                "N has {} cols, blocks leave {} free coordinates",
                self.basis.cols(),
                r
            )));
        }
        if self.x_true.len() != n {
            return Err(CvError::DataShapeMismatch(format!(
                "x_true has length {}, expected {}",
                self.x_true.len(),
                n
            )));
        }
        if self.x0.len() != n {
            return Err(CvError::DataShapeMismatch(format!(
                "x0 has length {}, expected {}",
                self.x0.len(),
                n
            )));
        }
        Ok(())
    }

    /// Recover the full solution x = x0 + N z.
    pub fn lift(&self, z: &[f64]) -> Vec<f64> {
        let mut x = self.x0.clone();
        sparse::spmv(&self.basis, z, &mut x, 1.0, 1.0);
        x
    }

    /// Release the large matrices, keeping the block structure.
    pub(crate) fn release(&mut self) {
        self.a = SparseMat::zero((0, 0));
        self.basis = SparseMat::zero((0, 0));
        self.b = Vec::new();
        self.x_true = Vec::new();
    }
}

/// Feasible anchor: 1 at the last coordinate of each block, 0 elsewhere.
pub fn anchor_point(block_sizes: &[usize]) -> Vec<f64> {
    let n: usize = block_sizes.iter().sum();
    let mut x0 = vec![0.0; n];
    let mut end = 0;
    for &size in block_sizes {
        end += size;
        if size > 0 {
            x0[end - 1] = 1.0;
        }
    }
    x0
}

/// Canonical basis of the block-simplex subspace.
///
/// Each block of size `k` contributes a `k × (k-1)` block `[I; -1ᵀ]`, so that
/// moving along a reduced coordinate transfers mass from the block's last
/// entry to another entry.
pub fn block_basis(block_sizes: &[usize]) -> SparseMat {
    let n: usize = block_sizes.iter().sum();
    let r: usize = block_sizes.iter().map(|&s| s.saturating_sub(1)).sum();

    let mut triplets = Vec::with_capacity(2 * r);
    let mut row0 = 0;
    let mut col0 = 0;
    for &size in block_sizes {
        if size == 0 {
            continue;
        }
        let last = row0 + size - 1;
        for j in 0..size.saturating_sub(1) {
            triplets.push((row0 + j, col0 + j, 1.0));
            triplets.push((last, col0 + j, -1.0));
        }
        row0 += size;
        col0 += size.saturating_sub(1);
    }
    sparse::from_triplets(n, r, triplets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_block_problem() -> ProblemInstance {
        let block_sizes = vec![2, 2];
        ProblemInstance::new(
            sparse::identity(4),
            vec![0.3, 0.7, 0.6, 0.4],
            block_basis(&block_sizes),
            block_sizes,
            vec![0.3, 0.7, 0.6, 0.4],
        )
        .unwrap()
    }

    #[test]
    fn test_anchor_point() {
        assert_eq!(anchor_point(&[2, 3, 1]), vec![0.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_block_basis_shape() {
        let n = block_basis(&[3, 1, 2]);
        assert_eq!(n.rows(), 6);
        assert_eq!(n.cols(), 3);
        assert_eq!(n.nnz(), 6);
    }

    #[test]
    fn test_lift_keeps_block_mass() {
        let prob = two_block_problem();
        let x = prob.lift(&[0.25, 0.5]);
        assert_eq!(x, vec![0.25, 0.75, 0.5, 0.5]);
        assert_eq!(prob.reduced_dim(), 2);
        assert_eq!(prob.full_dim(), 4);
    }

    #[test]
    fn test_shape_mismatch_detected() {
        let block_sizes = vec![2, 2];
        let err = ProblemInstance::new(
            sparse::identity(4),
            vec![1.0, 2.0, 3.0],
            block_basis(&block_sizes),
            block_sizes,
            vec![0.0; 4],
        )
        .unwrap_err();
        assert!(matches!(err, CvError::DataShapeMismatch(_)));

        let err = ProblemInstance::new(
            sparse::identity(4),
            vec![1.0; 4],
            block_basis(&[3, 2]),
            vec![2, 2],
            vec![0.0; 4],
        )
        .unwrap_err();
        assert!(matches!(err, CvError::DataShapeMismatch(_)));
    }

    #[test]
    fn test_basis_width_must_match_blocks() {
        // 4 x 1 basis for two blocks of size 2, which need 2 columns
        let n = sparse::from_triplets(4, 1, vec![(0, 0, 1.0), (1, 0, -1.0)]);
        let err = ProblemInstance::new(sparse::identity(4), vec![1.0; 4], n, vec![2, 2], vec![0.5; 4]).unwrap_err();
        match err {
            CvError::DataShapeMismatch(msg) => assert!(msg.contains("N has 1 cols"), "{}", msg),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_zero_block_rejected() {
        let err = ProblemInstance::new(
            sparse::identity(2),
            vec![1.0; 2],
            block_basis(&[2]),
            vec![2, 0],
            vec![0.0; 2],
        )
        .unwrap_err();
        assert!(matches!(err, CvError::DataShapeMismatch(_)));
    }
}
