//! Projection oracles onto the feasible region.
//!
//! Solvers only see the [`Projection`] trait. Every implementation must be
//! idempotent (`P(P(v)) == P(v)`) and length-preserving.

pub mod simplex;

pub use simplex::{project_simplex, SimplexBlocks};

/// Maps an arbitrary vector onto a feasible set, in place.
pub trait Projection {
    fn project(&self, v: &mut [f64]);

    /// Convenience wrapper returning a projected copy.
    fn projected(&self, v: &[f64]) -> Vec<f64> {
        let mut out = v.to_vec();
        self.project(&mut out);
        out
    }
}

/// Projected gradient `z − P(z − g)` at a feasible `z`, written to `out`.
///
/// Equals `g` without constraints and vanishes exactly at constrained
/// stationary points, where `g` itself may stay large.
pub fn projected_gradient<P: Projection + ?Sized>(proj: &P, z: &[f64], g: &[f64], out: &mut [f64]) {
    for i in 0..z.len() {
        out[i] = z[i] - g[i];
    }
    proj.project(out);
    for i in 0..z.len() {
        out[i] = z[i] - out[i];
    }
}

/// Unconstrained problems.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Projection for Identity {
    #[inline]
    fn project(&self, _v: &mut [f64]) {}
}

impl<P: Projection + ?Sized> Projection for &P {
    fn project(&self, v: &mut [f64]) {
        (**self).project(v)
    }
}
