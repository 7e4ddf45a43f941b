//! Projected weak Wolfe line search.
//!
//! Finds a step length `t > 0` along a direction `d` such that the projected
//! trial point `P(x + t d)` satisfies
//!
//! ```text
//! f(P(x + t d)) ≤ f(P(x)) + c1 · t · dᵀ∇f(P(x))        (sufficient decrease)
//! dᵀ∇f(P(x + t d)) ≥ c2 · dᵀ∇f(P(x))                   (curvature)
//! ```
//!
//! by bisection over a bracket `(α, β)`, starting from `α = 0`, `β = ∞`,
//! `t = 1`. A sufficient-decrease failure shrinks the bracket from above, a
//! curvature failure grows it from below (doubling while `β` is unbounded).
//! Objective and gradient are only ever evaluated at projected points.

use crate::error::LineSearchError;
use crate::linalg::sparse::dot;
use crate::objective::Objective;
use crate::projection::Projection;

/// Weak Wolfe constants and safety bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WolfeParams {
    /// Sufficient decrease constant
    pub c1: f64,

    /// Curvature constant
    pub c2: f64,

    /// Maximum number of bracket updates before giving up
    pub max_steps: usize,
}

impl Default for WolfeParams {
    fn default() -> Self {
        Self {
            c1: 1e-3,
            c2: 0.9,
            max_steps: 100,
        }
    }
}

impl WolfeParams {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0 < self.c1 && self.c1 < self.c2 && self.c2 < 1.0) {
            return Err(format!(
                "Wolfe constants must satisfy 0 < c1 < c2 < 1, got c1={}, c2={}",
                self.c1, self.c2
            ));
        }
        if self.max_steps == 0 {
            return Err("line search max_steps must be positive".to_string());
        }
        Ok(())
    }
}

/// Run the projected weak Wolfe line search from `x` along `d`.
///
/// Returns the accepted step length.
pub fn weak_wolfe<F, P>(
    x: &[f64],
    d: &[f64],
    f: &F,
    proj: &P,
    params: &WolfeParams,
) -> Result<f64, LineSearchError>
where
    F: Objective + ?Sized,
    P: Projection + ?Sized,
{
    let n = x.len();
    debug_assert_eq!(d.len(), n);

    let proj_x = proj.projected(x);
    let f_x = f.value(&proj_x);
    let mut grad = vec![0.0; n];
    f.gradient(&proj_x, &mut grad);
    let slope = dot(d, &grad);

    let mut alpha = 0.0;
    let mut beta = f64::INFINITY;
    let mut t = 1.0;
    let mut trial = vec![0.0; n];

    for _ in 0..params.max_steps {
        for i in 0..n {
            trial[i] = x[i] + t * d[i];
        }
        proj.project(&mut trial);

        let f_trial = f.value(&trial);
        if !(f_trial <= f_x + params.c1 * t * slope) {
            // Sufficient decrease violated (or non-finite value)
            beta = t;
            t = 0.5 * (alpha + beta);
            continue;
        }

        f.gradient(&trial, &mut grad);
        if dot(d, &grad) < params.c2 * slope {
            // Curvature violated
            alpha = t;
            t = if beta.is_infinite() { 2.0 * alpha } else { 0.5 * (alpha + beta) };
            continue;
        }

        return Ok(t);
    }

    Err(LineSearchError::BracketNotClosed {
        max_steps: params.max_steps,
        last_step: t,
    })
}

/// Armijo backtracking from `t = 1`, halving on every sufficient-decrease
/// failure.
///
/// No projection is applied: callers pass a direction whose unit segment
/// stays feasible, such as the negative projected gradient.
pub fn backtracking<F>(x: &[f64], d: &[f64], f: &F, params: &WolfeParams) -> Result<f64, LineSearchError>
where
    F: Objective + ?Sized,
{
    let n = x.len();
    debug_assert_eq!(d.len(), n);

    let f_x = f.value(x);
    let mut grad = vec![0.0; n];
    f.gradient(x, &mut grad);
    let slope = dot(d, &grad);

    let mut t = 1.0;
    let mut trial = vec![0.0; n];
    for _ in 0..params.max_steps {
        for i in 0..n {
            trial[i] = x[i] + t * d[i];
        }
        if f.value(&trial) <= f_x + params.c1 * t * slope {
            return Ok(t);
        }
        t *= 0.5;
    }

    Err(LineSearchError::BracketNotClosed {
        max_steps: params.max_steps,
        last_step: t,
    })
}
