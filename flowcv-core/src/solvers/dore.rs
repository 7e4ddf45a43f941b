//! Double over-relaxation (DORE) projected Landweber iteration.
//!
//! Works on `½‖M z + c‖²` after normalizing `M` and `c` by `α / σ_max(M)`,
//! so that the unit Landweber step is stable. Each iteration:
//!
//! ```text
//! x̂  = P(z_k − Mᵀ(M z_k + c))
//! x̄  = P(x̂ + a₁ (x̂ − z_k))          a₁ exact line minimizer
//! x̃  = P(x̄ + a₂ (x̄ − z_{k−1}))      a₂ exact line minimizer
//! z_{k+1} = x̃ if f(x̃) < f(x̂), else x̂
//! ```
//!
//! Values and projected gradients handed to the stopping rule are rescaled
//! back to the un-normalized objective.

use tracing::{info, trace};

use super::stopping::StoppingRule;
use super::{Checkpoints, Observer, SolveOutcome};
use crate::error::{SolverError, SolverResult};
use crate::linalg::sparse::dot;
use crate::linalg::spectral::largest_singular_value;
use crate::objective::{ResidualOperator, ScaledOperator};
use crate::projection::{projected_gradient, Projection};

/// DORE settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DoreSettings {
    /// Damping factor α < 1 on the normalized operator
    pub alpha: f64,

    /// Power iterations for the σ_max estimate
    pub power_iters: usize,

    /// Relative tolerance of the σ_max estimate
    pub power_tol: f64,
}

impl Default for DoreSettings {
    fn default() -> Self {
        Self {
            alpha: 0.99,
            power_iters: 500,
            power_tol: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dore {
    pub settings: DoreSettings,
}

/// Scratch state for one relaxation: the point, its residual and value.
struct Point {
    z: Vec<f64>,
    r: Vec<f64>,
    value: f64,
}

impl Point {
    fn evaluate<O: ResidualOperator + ?Sized>(op: &O, z: Vec<f64>) -> Self {
        let mut r = vec![0.0; op.rows()];
        op.residual(&z, &mut r);
        let value = 0.5 * dot(&r, &r);
        Self { z, r, value }
    }
}

impl Dore {
    pub fn new(settings: DoreSettings) -> Self {
        Self { settings }
    }

    pub fn solve<O, S, P>(
        &self,
        z0: Vec<f64>,
        op: &O,
        stopping: &S,
        proj: &P,
        record_every: usize,
        observer: &mut dyn Observer,
    ) -> SolverResult<SolveOutcome>
    where
        O: ResidualOperator + ?Sized,
        S: StoppingRule + ?Sized,
        P: Projection + ?Sized,
    {
        let n = op.cols();
        if z0.len() != n {
            return Err(SolverError::DimensionMismatch { expected: n, actual: z0.len() });
        }

        let sigma = largest_singular_value(op, self.settings.power_iters, self.settings.power_tol)?;
        info!(sigma, alpha = self.settings.alpha, "largest singular value");
        let scale = self.settings.alpha / sigma;
        let m = ScaledOperator::new(op, scale);
        // f = f_scaled / scale², ∇ likewise
        let unscale = 1.0 / (scale * scale);

        let mut z = z0;
        proj.project(&mut z);

        let mut checkpoints = Checkpoints::new(record_every);
        checkpoints.start(&z, observer);

        let mut current = Point::evaluate(&m, z);
        if !current.value.is_finite() {
            return Err(SolverError::NonFiniteObjective { iteration: 0, value: current.value });
        }
        let mut previous = current.z.clone();
        let mut grad = vec![0.0; n];
        let mut pg = vec![0.0; n];
        let mut m_delta = vec![0.0; m.rows()];

        let mut iter = 0;
        loop {
            iter += 1;

            // Projected Landweber step
            m.adjoint(&current.r, &mut grad);
            let mut landweber: Vec<f64> = current.z.iter().zip(grad.iter()).map(|(zi, gi)| zi - gi).collect();
            proj.project(&mut landweber);
            let x_hat = Point::evaluate(&m, landweber);

            let x_bar = relax(&m, proj, &x_hat, &current.z, &mut m_delta);
            let x_tilde = relax(&m, proj, &x_bar, &previous, &mut m_delta);

            let next = if x_tilde.value < x_hat.value { x_tilde } else { x_hat };
            if !next.value.is_finite() {
                return Err(SolverError::NonFiniteObjective { iteration: iter, value: next.value * unscale });
            }

            previous = std::mem::replace(&mut current, next).z;

            m.adjoint(&current.r, &mut grad);
            for gi in grad.iter_mut() {
                *gi *= unscale;
            }
            projected_gradient(proj, &current.z, &grad, &mut pg);
            let value = current.value * unscale;
            trace!(iteration = iter, value, "dore iteration");

            let stop = stopping.should_stop(&pg, value, iter, 1.0);
            checkpoints.record(iter, &current.z, observer);
            if stop {
                break;
            }
        }

        checkpoints.finish(iter, &current.z, observer);
        let value = current.value * unscale;
        Ok(SolveOutcome { z: current.z, iterations: iter, value })
    }
}

/// Over-relax `base` along `base − anchor` with the exact line minimizer,
/// then project. Returns `base` unchanged when the direction vanishes.
fn relax<O, P>(op: &O, proj: &P, base: &Point, anchor: &[f64], m_delta: &mut [f64]) -> Point
where
    O: ResidualOperator + ?Sized,
    P: Projection + ?Sized,
{
    let delta: Vec<f64> = base.z.iter().zip(anchor.iter()).map(|(b, a)| b - a).collect();
    op.apply(&delta, m_delta);
    let denom = dot(m_delta, m_delta);
    if !(denom > 0.0 && denom.is_finite()) {
        return Point { z: base.z.clone(), r: base.r.clone(), value: base.value };
    }

    let a = -dot(&base.r, m_delta) / denom;
    let mut z: Vec<f64> = base.z.iter().zip(delta.iter()).map(|(b, d)| b + a * d).collect();
    proj.project(&mut z);
    Point::evaluate(op, z)
}
