//! Largest singular value estimate by power iteration.
//!
//! Used to normalize an operator `M` so that `‖α M / σ_max‖ < 1` before
//! running an operator-splitting solver on it.

use crate::error::{SolverError, SolverResult};
use crate::linalg::sparse::{dot, norm2};
use crate::objective::ResidualOperator;

/// Estimate σ_max(M) by power iteration on MᵀM.
///
/// Starts from the all-ones vector (deterministic) and stops when the
/// relative change of the estimate drops below `tol` or after `max_iter`
/// iterations.
pub fn largest_singular_value<O: ResidualOperator + ?Sized>(
    op: &O,
    max_iter: usize,
    tol: f64,
) -> SolverResult<f64> {
    let n = op.cols();
    if n == 0 {
        return Err(SolverError::DegenerateOperator { value: 0.0 });
    }

    let mut v = vec![1.0 / (n as f64).sqrt(); n];
    let mut mv = vec![0.0; op.rows()];
    let mut w = vec![0.0; n];
    let mut sigma = 0.0;

    for _ in 0..max_iter.max(1) {
        op.apply(&v, &mut mv);
        op.adjoint(&mv, &mut w);

        // Rayleigh quotient of MᵀM at the unit vector v
        let lambda = dot(&v, &w);
        let next = lambda.max(0.0).sqrt();

        let w_norm = norm2(&w);
        if !w_norm.is_finite() || w_norm == 0.0 {
            sigma = next;
            break;
        }
        for (vi, wi) in v.iter_mut().zip(w.iter()) {
            *vi = wi / w_norm;
        }

        let converged = (next - sigma).abs() <= tol * next.max(f64::MIN_POSITIVE);
        sigma = next;
        if converged {
            break;
        }
    }

    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(SolverError::DegenerateOperator { value: sigma });
    }
    Ok(sigma)
}
