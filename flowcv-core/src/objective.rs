//! Least-squares objectives in reduced coordinates.
//!
//! For a fold with training rows `A_t`, `b_t` the objective is
//!
//! ```text
//! f(z) = ½ ‖A_t (N z) + c‖²,   c = A_t x0 − b_t
//! ∇f(z) = Nᵀ A_tᵀ (A_t (N z) + c)
//! ```
//!
//! Residuals are evaluated on demand; neither `A_t N` nor any transpose is
//! ever materialized.

use crate::linalg::sparse::{self, SparseMat};

/// Smooth objective seen by gradient-based solvers.
pub trait Objective {
    /// Dimension of the optimization variable.
    fn dim(&self) -> usize;

    fn value(&self, z: &[f64]) -> f64;

    /// Write ∇f(z) into `grad`.
    fn gradient(&self, z: &[f64], grad: &mut [f64]);
}

/// Affine residual map `r(z) = M z + c` seen by operator-splitting solvers.
pub trait ResidualOperator {
    /// Number of residual entries (rows of M).
    fn rows(&self) -> usize;

    /// Dimension of the optimization variable (cols of M).
    fn cols(&self) -> usize;

    /// out = M z
    fn apply(&self, z: &[f64], out: &mut [f64]);

    /// out = Mᵀ r
    fn adjoint(&self, r: &[f64], out: &mut [f64]);

    /// Constant offset c.
    fn offset(&self) -> &[f64];

    /// out = M z + c
    fn residual(&self, z: &[f64], out: &mut [f64]) {
        self.apply(z, out);
        sparse::axpy(1.0, self.offset(), out);
    }
}

impl<O: ResidualOperator + ?Sized> ResidualOperator for &O {
    fn rows(&self) -> usize {
        (**self).rows()
    }

    fn cols(&self) -> usize {
        (**self).cols()
    }

    fn apply(&self, z: &[f64], out: &mut [f64]) {
        (**self).apply(z, out)
    }

    fn adjoint(&self, r: &[f64], out: &mut [f64]) {
        (**self).adjoint(r, out)
    }

    fn offset(&self) -> &[f64] {
        (**self).offset()
    }
}

/// Training objective of a single fold.
///
/// Borrows the fold's training rows, the shared basis and the fold offset;
/// owns nothing.
#[derive(Debug, Clone, Copy)]
pub struct FoldObjective<'a> {
    a: &'a SparseMat,
    basis: &'a SparseMat,
    offset: &'a [f64],
}

impl<'a> FoldObjective<'a> {
    pub fn new(a: &'a SparseMat, basis: &'a SparseMat, offset: &'a [f64]) -> Self {
        debug_assert_eq!(a.rows(), offset.len());
        debug_assert_eq!(a.cols(), basis.rows());
        Self { a, basis, offset }
    }

    /// Rescale the operator and offset by `scale` without copying the data.
    pub fn scaled(self, scale: f64) -> ScaledOperator<Self> {
        ScaledOperator::new(self, scale)
    }
}

impl ResidualOperator for FoldObjective<'_> {
    fn rows(&self) -> usize {
        self.a.rows()
    }

    fn cols(&self) -> usize {
        self.basis.cols()
    }

    fn apply(&self, z: &[f64], out: &mut [f64]) {
        let mut x = vec![0.0; self.basis.rows()];
        sparse::spmv(self.basis, z, &mut x, 1.0, 0.0);
        sparse::spmv(self.a, &x, out, 1.0, 0.0);
    }

    fn adjoint(&self, r: &[f64], out: &mut [f64]) {
        let mut x = vec![0.0; self.basis.rows()];
        sparse::spmv_transpose(self.a, r, &mut x, 1.0, 0.0);
        sparse::spmv_transpose(self.basis, &x, out, 1.0, 0.0);
    }

    fn offset(&self) -> &[f64] {
        self.offset
    }
}

impl Objective for FoldObjective<'_> {
    fn dim(&self) -> usize {
        self.basis.cols()
    }

    fn value(&self, z: &[f64]) -> f64 {
        least_squares_value(self, z)
    }

    fn gradient(&self, z: &[f64], grad: &mut [f64]) {
        least_squares_gradient(self, z, grad)
    }
}

/// `α·M` and `α·c` for an inner operator, used for spectral normalization.
#[derive(Debug, Clone)]
pub struct ScaledOperator<O> {
    inner: O,
    scale: f64,
    offset: Vec<f64>,
}

impl<O: ResidualOperator> ScaledOperator<O> {
    pub fn new(inner: O, scale: f64) -> Self {
        let offset = inner.offset().iter().map(|c| scale * c).collect();
        Self { inner, scale, offset }
    }
}

impl<O: ResidualOperator> ResidualOperator for ScaledOperator<O> {
    fn rows(&self) -> usize {
        self.inner.rows()
    }

    fn cols(&self) -> usize {
        self.inner.cols()
    }

    fn apply(&self, z: &[f64], out: &mut [f64]) {
        self.inner.apply(z, out);
        for v in out.iter_mut() {
            *v *= self.scale;
        }
    }

    fn adjoint(&self, r: &[f64], out: &mut [f64]) {
        self.inner.adjoint(r, out);
        for v in out.iter_mut() {
            *v *= self.scale;
        }
    }

    fn offset(&self) -> &[f64] {
        &self.offset
    }
}

impl<O: ResidualOperator> Objective for ScaledOperator<O> {
    fn dim(&self) -> usize {
        self.cols()
    }

    fn value(&self, z: &[f64]) -> f64 {
        least_squares_value(self, z)
    }

    fn gradient(&self, z: &[f64], grad: &mut [f64]) {
        least_squares_gradient(self, z, grad)
    }
}

/// ½ ‖M z + c‖²
pub fn least_squares_value<O: ResidualOperator + ?Sized>(op: &O, z: &[f64]) -> f64 {
    let mut r = vec![0.0; op.rows()];
    op.residual(z, &mut r);
    0.5 * sparse::dot(&r, &r)
}

/// Mᵀ (M z + c)
pub fn least_squares_gradient<O: ResidualOperator + ?Sized>(op: &O, z: &[f64], grad: &mut [f64]) {
    let mut r = vec![0.0; op.rows()];
    op.residual(z, &mut r);
    op.adjoint(&r, grad);
}
