//! Projected limited-memory BFGS.
//!
//! Each iteration:
//! 1. two-loop recursion over the stored curvature pairs, with the initial
//!    inverse Hessian scaled by the newest pair `H0 = yᵀs / yᵀy`;
//! 2. the newest pair enters the history (FIFO, capacity `history_size`);
//! 3. projected weak Wolfe line search along the direction;
//! 4. `z ← P(z + t d)`, new gradient, new pair `s = t d`, `y = g⁺ − g`;
//! 5. stopping rule on the projected gradient `z − P(z − g)`, checkpoint at
//!    the configured cadence.
//!
//! When the direction is not a descent direction or the Wolfe search fails,
//! the run either ends (projected gradient vanished relative to its starting
//! size, the iteration does not count) or restarts: the history is dropped and
//! an Armijo step is taken along the negative projected gradient. Pairs from
//! restart steps are kept only when their curvature is positive.
//!
//! The newest pair only scales `H0` in the iteration after it was formed and
//! takes part in the recursion from the following one. The first iteration
//! has no pair and uses `H0 = 1`, i.e. steepest descent.

use tracing::{debug, trace};

use super::history::{CurvatureHistory, CurvaturePair};
use super::line_search::{backtracking, weak_wolfe, WolfeParams};
use super::stopping::StoppingRule;
use super::{Checkpoints, Observer, SolveOutcome};
use crate::error::{SolverError, SolverResult};
use crate::linalg::sparse::{dot, inf_norm, norm2};
use crate::objective::Objective;
use crate::projection::{projected_gradient, Projection};

/// Relative threshold on |yᵀs| / (‖y‖‖s‖) below which a pair is degenerate.
const CURVATURE_EPS: f64 = 1e-12;

/// Projected gradient size, relative to the starting one, below which a
/// failed line search counts as convergence.
const STATIONARY_RTOL: f64 = 1e-6;

/// L-BFGS settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LbfgsSettings {
    /// Number of curvature pairs kept (m)
    pub history_size: usize,

    /// Line search parameters
    pub line_search: WolfeParams,
}

impl Default for LbfgsSettings {
    fn default() -> Self {
        let history_size = std::env::var("FLOWCV_HISTORY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(10);
        let max_steps = std::env::var("FLOWCV_LS_MAX_STEPS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(100);

        Self {
            history_size,
            line_search: WolfeParams { max_steps, ..Default::default() },
        }
    }
}

/// Projected L-BFGS solver.
#[derive(Debug, Clone, Default)]
pub struct Lbfgs {
    pub settings: LbfgsSettings,
}

impl Lbfgs {
    pub fn new(settings: LbfgsSettings) -> Self {
        Self { settings }
    }

    /// Minimize `f` over the feasible set of `proj`, starting from `z0`.
    ///
    /// Checkpoints are reported to `observer` at iteration 0, every
    /// `record_every` iterations, and at termination.
    pub fn solve<F, S, P>(
        &self,
        z0: Vec<f64>,
        f: &F,
        stopping: &S,
        proj: &P,
        record_every: usize,
        observer: &mut dyn Observer,
    ) -> SolverResult<SolveOutcome>
    where
        F: Objective + ?Sized,
        S: StoppingRule + ?Sized,
        P: Projection + ?Sized,
    {
        let n = f.dim();
        if z0.len() != n {
            return Err(SolverError::DimensionMismatch { expected: n, actual: z0.len() });
        }

        let mut z = z0;
        proj.project(&mut z);

        let mut checkpoints = Checkpoints::new(record_every);
        checkpoints.start(&z, observer);

        let mut history = CurvatureHistory::new(self.settings.history_size);
        let mut newest: Option<CurvaturePair> = None;

        let mut fz = f.value(&z);
        if !fz.is_finite() {
            return Err(SolverError::NonFiniteObjective { iteration: 0, value: fz });
        }
        let mut g = vec![0.0; n];
        f.gradient(&z, &mut g);
        let mut pg = vec![0.0; n];
        projected_gradient(proj, &z, &g, &mut pg);
        let pg_scale = inf_norm(&pg).max(1.0);

        let mut g_next = vec![0.0; n];
        let mut z_next = vec![0.0; n];

        let mut iter = 0;
        loop {
            iter += 1;

            let mut d = search_direction(&g, newest.as_ref(), &history);
            if let Some(pair) = newest.take() {
                history.push(pair);
            }

            let wolfe = if dot(&d, &g) > 0.0 {
                None
            } else {
                weak_wolfe(&z, &d, f, proj, &self.settings.line_search).ok()
            };
            let (t, restarted) = match wolfe {
                Some(t) => (t, false),
                None => {
                    if inf_norm(&pg) <= STATIONARY_RTOL * pg_scale {
                        debug!(iteration = iter, value = fz, "projected gradient vanished");
                        iter -= 1;
                        break;
                    }
                    debug!(iteration = iter, "restarting along the projected gradient");
                    history.clear();
                    for (di, pi) in d.iter_mut().zip(pg.iter()) {
                        *di = -pi;
                    }
                    let t = backtracking(&z, &d, f, &self.settings.line_search)
                        .map_err(|e| SolverError::from_line_search(e, iter))?;
                    (t, true)
                }
            };

            let s: Vec<f64> = d.iter().map(|di| t * di).collect();
            for i in 0..n {
                z_next[i] = z[i] + s[i];
            }
            proj.project(&mut z_next);

            f.gradient(&z_next, &mut g_next);
            let y: Vec<f64> = g_next.iter().zip(g.iter()).map(|(a, b)| a - b).collect();
            let ys = dot(&y, &s);

            std::mem::swap(&mut z, &mut z_next);
            std::mem::swap(&mut g, &mut g_next);
            projected_gradient(proj, &z, &g, &mut pg);

            fz = f.value(&z);
            if !fz.is_finite() {
                return Err(SolverError::NonFiniteObjective { iteration: iter, value: fz });
            }
            trace!(iteration = iter, value = fz, step = t, ys, restarted, "lbfgs iteration");

            let stop = stopping.should_stop(&pg, fz, iter, t);
            checkpoints.record(iter, &z, observer);
            if stop {
                break;
            }

            if is_degenerate(ys, &y, &s) {
                if restarted {
                    continue;
                }
                return Err(SolverError::DegenerateCurvature { iteration: iter, ys });
            }
            if restarted && ys < 0.0 {
                continue;
            }
            newest = Some(CurvaturePair { s, y, rho: 1.0 / ys });
        }

        checkpoints.finish(iter, &z, observer);
        Ok(SolveOutcome { z, iterations: iter, value: fz })
    }
}

fn is_degenerate(ys: f64, y: &[f64], s: &[f64]) -> bool {
    !ys.is_finite() || ys.abs() <= CURVATURE_EPS * norm2(y) * norm2(s)
}

/// Two-loop recursion; returns the descent direction `-H g`.
pub(crate) fn search_direction(
    g: &[f64],
    newest: Option<&CurvaturePair>,
    history: &CurvatureHistory,
) -> Vec<f64> {
    let mut q = g.to_vec();
    let mut alphas = vec![0.0; history.len()];

    // Newest to oldest
    for (k, pair) in history.iter().enumerate().rev() {
        let a = pair.rho * dot(&pair.s, &q);
        alphas[k] = a;
        for (qi, yi) in q.iter_mut().zip(pair.y.iter()) {
            *qi -= a * yi;
        }
    }

    let h0 = match newest {
        Some(pair) => {
            let yy = dot(&pair.y, &pair.y);
            if yy > 0.0 {
                dot(&pair.y, &pair.s) / yy
            } else {
                1.0
            }
        }
        None => 1.0,
    };
    let mut r: Vec<f64> = q.iter().map(|qi| h0 * qi).collect();

    // Oldest to newest
    for (k, pair) in history.iter().enumerate() {
        let beta = pair.rho * dot(&pair.y, &r);
        let coef = alphas[k] - beta;
        for (ri, si) in r.iter_mut().zip(pair.s.iter()) {
            *ri += coef * si;
        }
    }

    for ri in r.iter_mut() {
        *ri = -*ri;
    }
    r
}
