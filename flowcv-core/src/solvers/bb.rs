//! Spectral projected gradient with Barzilai–Borwein steps.
//!
//! ```text
//! d_k     = P(z_k − λ_k g_k) − z_k
//! z_{k+1} = z_k + a_k d_k,   a_k from non-monotone Armijo backtracking
//! λ_{k+1} = clamp(sᵀs / sᵀy, λ_min, λ_max)   (λ_max when sᵀy ≤ 0)
//! ```
//!
//! Since `z_k` is feasible and the feasible set is convex, every trial point
//! `z_k + a d_k` with `a ∈ (0, 1]` is feasible without re-projection.

use tracing::trace;

use super::stopping::StoppingRule;
use super::{Checkpoints, Observer, SolveOutcome};
use crate::error::{SolverError, SolverResult};
use crate::linalg::sparse::{dot, inf_norm};
use crate::objective::Objective;
use crate::projection::{projected_gradient, Projection};

/// Barzilai–Borwein / SPG settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BbSettings {
    /// Lower bound on the spectral step
    pub step_min: f64,

    /// Upper bound on the spectral step
    pub step_max: f64,

    /// Armijo constant
    pub gamma: f64,

    /// Number of past objective values in the non-monotone reference
    pub window: usize,

    /// Maximum halvings per iteration
    pub max_backtracks: usize,
}

impl Default for BbSettings {
    fn default() -> Self {
        Self {
            step_min: 1e-10,
            step_max: 1e10,
            gamma: 1e-4,
            window: 10,
            max_backtracks: 50,
        }
    }
}

impl BbSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.step_min > 0.0 && self.step_min <= self.step_max) {
            return Err(format!(
                "BB step bounds must satisfy 0 < min <= max, got [{}, {}]",
                self.step_min, self.step_max
            ));
        }
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(format!("BB Armijo constant must lie in (0, 1), got {}", self.gamma));
        }
        if self.window == 0 || self.max_backtracks == 0 {
            return Err("BB window and max_backtracks must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bb {
    pub settings: BbSettings,
}

impl Bb {
    pub fn new(settings: BbSettings) -> Self {
        Self { settings }
    }

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
        let cfg = &self.settings;
        let n = f.dim();
        if z0.len() != n {
            return Err(SolverError::DimensionMismatch { expected: n, actual: z0.len() });
        }

        let mut z = z0;
        proj.project(&mut z);

        let mut checkpoints = Checkpoints::new(record_every);
        checkpoints.start(&z, observer);

        let mut g = vec![0.0; n];
        f.gradient(&z, &mut g);
        let mut fz = f.value(&z);
        if !fz.is_finite() {
            return Err(SolverError::NonFiniteObjective { iteration: 0, value: fz });
        }

        // Initial spectral step from the projected gradient
        let mut pg = vec![0.0; n];
        projected_gradient(proj, &z, &g, &mut pg);
        let pg_norm = inf_norm(&pg);
        let mut lambda = if pg_norm > 0.0 { (1.0 / pg_norm).clamp(cfg.step_min, cfg.step_max) } else { 1.0 };
        let mut d = vec![0.0; n];

        let mut recent = vec![fz; cfg.window];
        let mut z_next = vec![0.0; n];
        let mut g_next = vec![0.0; n];

        let mut iter = 0;
        loop {
            iter += 1;

            for i in 0..n {
                d[i] = z[i] - lambda * g[i];
            }
            proj.project(&mut d);
            for (di, zi) in d.iter_mut().zip(z.iter()) {
                *di -= zi;
            }

            let slope = dot(&g, &d);
            let f_ref = recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            let mut a = 1.0;
            let mut accepted = None;
            for _ in 0..cfg.max_backtracks {
                for i in 0..n {
                    z_next[i] = z[i] + a * d[i];
                }
                let f_trial = f.value(&z_next);
                if f_trial <= f_ref + cfg.gamma * a * slope {
                    accepted = Some(f_trial);
                    break;
                }
                a *= 0.5;
            }
            let f_next = accepted.ok_or(SolverError::LineSearchDivergence {
                iteration: iter,
                max_steps: cfg.max_backtracks,
                last_step: a,
            })?;

            f.gradient(&z_next, &mut g_next);

            let mut ss = 0.0;
            let mut sy = 0.0;
            for i in 0..n {
                let s = z_next[i] - z[i];
                ss += s * s;
                sy += s * (g_next[i] - g[i]);
            }
            lambda = if sy <= 0.0 { cfg.step_max } else { (ss / sy).clamp(cfg.step_min, cfg.step_max) };

            std::mem::swap(&mut z, &mut z_next);
            std::mem::swap(&mut g, &mut g_next);
            projected_gradient(proj, &z, &g, &mut pg);
            fz = f_next;
            recent[iter % cfg.window] = fz;
            trace!(iteration = iter, value = fz, step = a, lambda, "bb iteration");

            let stop = stopping.should_stop(&pg, fz, iter, a);
            checkpoints.record(iter, &z, observer);
            if stop {
                break;
            }
        }

        checkpoints.finish(iter, &z, observer);
        Ok(SolveOutcome { z, iterations: iter, value: fz })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse;
    use crate::objective::FoldObjective;
    use crate::problem::{anchor_point, block_basis};
    use crate::projection::{Identity, SimplexBlocks};
    use crate::solvers::stopping::StoppingCriteria;
    use crate::solvers::Checkpoint;

    #[test]
    fn test_unconstrained_least_squares() {
        // Single block of size 3, A = I3, target inside the simplex
        let a = sparse::identity(3);
        let basis = block_basis(&[3]);
        let x0 = anchor_point(&[3]);
        let b = [0.2, 0.3, 0.5];
        let offset: Vec<f64> = x0.iter().zip(b.iter()).map(|(x, b)| x - b).collect();
        let f = FoldObjective::new(&a, &basis, &offset);

        let mut trace: Vec<Checkpoint> = Vec::new();
        let out = Bb::default()
            .solve(vec![0.0; 2], &f, &StoppingCriteria::max_iter(200), &Identity, 10, &mut trace)
            .unwrap();
        assert!((out.z[0] - 0.2).abs() < 1e-8);
        assert!((out.z[1] - 0.3).abs() < 1e-8);
    }

    #[test]
    fn test_projected_iterates_stay_feasible() {
        // Target outside the simplex: optimum on the boundary
        let a = sparse::identity(3);
        let basis = block_basis(&[3]);
        let x0 = anchor_point(&[3]);
        let b = [1.0, 1.0, -1.0];
        let offset: Vec<f64> = x0.iter().zip(b.iter()).map(|(x, b)| x - b).collect();
        let f = FoldObjective::new(&a, &basis, &offset);
        let proj = SimplexBlocks::new(&[3]);

        let mut trace: Vec<Checkpoint> = Vec::new();
        let out = Bb::default()
            .solve(vec![0.0; 2], &f, &StoppingCriteria::max_iter(100), &proj, 1, &mut trace)
            .unwrap();

        for cp in &trace {
            let z = &cp.state;
            assert!(z.iter().all(|&v| v >= -1e-12));
            assert!(z.iter().sum::<f64>() <= 1.0 + 1e-12);
        }
        // Closest simplex point to (1, 1, -1) is (0.5, 0.5, 0)
        assert!((out.z[0] - 0.5).abs() < 1e-6);
        assert!((out.z[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_objective_reference_is_non_monotone_but_bounded() {
        let a = sparse::from_triplets(2, 2, vec![(0, 0, 10.0), (1, 1, 0.1)]);
        let basis = sparse::identity(2);
        let offset = vec![-1.0, -1.0];
        let f = FoldObjective::new(&a, &basis, &offset);

        let mut trace: Vec<Checkpoint> = Vec::new();
        let out = Bb::default()
            .solve(vec![0.0; 2], &f, &StoppingCriteria::max_iter(50), &Identity, 1, &mut trace)
            .unwrap();

        let f0 = f.value(&trace[0].state);
        for cp in &trace {
            assert!(f.value(&cp.state) <= f0 + 1e-12);
        }
        assert!(out.value < f0);
    }

    #[test]
    fn test_settings_validation() {
        assert!(BbSettings::default().validate().is_ok());
        assert!(BbSettings { step_min: 0.0, ..Default::default() }.validate().is_err());
        assert!(BbSettings { window: 0, ..Default::default() }.validate().is_err());
    }
}
