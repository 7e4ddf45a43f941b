//! Stopping rules shared by all solver backends.

use crate::linalg::sparse::norm2;

/// Decides whether a solver should stop after an iteration.
///
/// Arguments are the projected gradient `z − P(z − ∇f(z))` at the new
/// iterate, the objective value there, the number of completed iterations,
/// and the step length just taken. Without constraints the projected gradient
/// is the gradient itself.
pub trait StoppingRule {
    fn should_stop(&self, grad: &[f64], value: f64, iteration: usize, step: f64) -> bool;
}

impl<F> StoppingRule for F
where
    F: Fn(&[f64], f64, usize, f64) -> bool,
{
    fn should_stop(&self, grad: &[f64], value: f64, iteration: usize, step: f64) -> bool {
        self(grad, value, iteration, step)
    }
}

/// Default stopping criteria.
#[derive(Debug, Clone, PartialEq)]
pub struct StoppingCriteria {
    /// Hard iteration cap
    pub max_iter: usize,

    /// Stop once the projected gradient norm falls to this value (0 disables)
    pub tol_grad: f64,

    /// Stop once the objective falls to this value
    pub tol_obj: Option<f64>,
}

impl Default for StoppingCriteria {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol_grad: 1e-10,
            tol_obj: None,
        }
    }
}

impl StoppingCriteria {
    /// Iteration cap only.
    pub fn max_iter(max_iter: usize) -> Self {
        Self { max_iter, tol_grad: 0.0, tol_obj: None }
    }
}

impl StoppingRule for StoppingCriteria {
    fn should_stop(&self, grad: &[f64], value: f64, iteration: usize, _step: f64) -> bool {
        if iteration >= self.max_iter {
            return true;
        }
        if self.tol_grad > 0.0 && norm2(grad) <= self.tol_grad {
            return true;
        }
        matches!(self.tol_obj, Some(tol) if value <= tol)
    }
}
