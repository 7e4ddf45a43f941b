//! Solver backends.
//!
//! All backends minimize a smooth least-squares objective in reduced
//! coordinates over the feasible set of a [`Projection`], report
//! checkpoints through an [`Observer`] and stop on a [`StoppingRule`].
//!
//! - [`Lbfgs`]: projected limited-memory BFGS with weak Wolfe line search
//! - [`Bb`]: spectral projected gradient (Barzilai–Borwein steps)
//! - [`Dore`]: double over-relaxation on a spectrally normalized operator

pub mod bb;
pub mod dore;
pub mod history;
pub mod lbfgs;
pub mod line_search;
pub mod stopping;

use std::fmt;
use std::str::FromStr;

pub use bb::{Bb, BbSettings};
pub use dore::{Dore, DoreSettings};
pub use lbfgs::{Lbfgs, LbfgsSettings};
pub use line_search::{weak_wolfe, WolfeParams};
pub use stopping::{StoppingCriteria, StoppingRule};

pub use crate::objective::{Objective, ResidualOperator};
use crate::projection::Projection;

/// Backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverKind {
    Lbfgs,
    Bb,
    Dore,
}

impl SolverKind {
    pub const ALL: [SolverKind; 3] = [SolverKind::Lbfgs, SolverKind::Bb, SolverKind::Dore];

    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::Lbfgs => "LBFGS",
            SolverKind::Bb => "BB",
            SolverKind::Dore => "DORE",
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LBFGS" => Ok(SolverKind::Lbfgs),
            "BB" => Ok(SolverKind::Bb),
            "DORE" => Ok(SolverKind::Dore),
            other => Err(format!("unknown solver '{}', expected LBFGS, BB or DORE", other)),
        }
    }
}

/// Receives iterate snapshots from a running solver.
///
/// Solvers report `(iteration, state)` by reference and never measure time
/// themselves; the observer owns any clock.
pub trait Observer {
    fn checkpoint(&mut self, iteration: usize, state: &[f64]);
}

/// A recorded iterate.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub iteration: usize,
    pub state: Vec<f64>,
}

impl Observer for Vec<Checkpoint> {
    fn checkpoint(&mut self, iteration: usize, state: &[f64]) {
        self.push(Checkpoint { iteration, state: state.to_vec() });
    }
}

/// Discards all checkpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn checkpoint(&mut self, _iteration: usize, _state: &[f64]) {}
}

/// Checkpoint cadence shared by the backends: iteration 0, every
/// `record_every` iterations, and the final iterate exactly once.
#[derive(Debug, Clone)]
pub(crate) struct Checkpoints {
    record_every: usize,
    last: Option<usize>,
}

impl Checkpoints {
    pub(crate) fn new(record_every: usize) -> Self {
        Self { record_every: record_every.max(1), last: None }
    }

    pub(crate) fn start(&mut self, z: &[f64], observer: &mut dyn Observer) {
        observer.checkpoint(0, z);
        self.last = Some(0);
    }

    pub(crate) fn record(&mut self, iteration: usize, z: &[f64], observer: &mut dyn Observer) {
        if iteration % self.record_every == 0 {
            observer.checkpoint(iteration, z);
            self.last = Some(iteration);
        }
    }

    pub(crate) fn finish(&mut self, iteration: usize, z: &[f64], observer: &mut dyn Observer) {
        if self.last != Some(iteration) {
            observer.checkpoint(iteration, z);
            self.last = Some(iteration);
        }
    }
}

/// Result of a successful solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    /// Final iterate (reduced coordinates)
    pub z: Vec<f64>,

    /// Number of completed iterations
    pub iterations: usize,

    /// Objective value at `z`
    pub value: f64,
}

/// Configured backend, ready to run.
#[derive(Debug, Clone)]
pub enum Backend {
    Lbfgs(Lbfgs),
    Bb(Bb),
    Dore(Dore),
}

impl Backend {
    pub fn kind(&self) -> SolverKind {
        match self {
            Backend::Lbfgs(_) => SolverKind::Lbfgs,
            Backend::Bb(_) => SolverKind::Bb,
            Backend::Dore(_) => SolverKind::Dore,
        }
    }

    /// Run the backend on a least-squares operator.
    ///
    /// DORE works on the operator directly and normalizes it internally;
    /// the gradient methods see it as an [`Objective`].
    pub fn solve<O, S, P>(
        &self,
        z0: Vec<f64>,
        op: &O,
        stopping: &S,
        proj: &P,
        record_every: usize,
        observer: &mut dyn Observer,
    ) -> crate::error::SolverResult<SolveOutcome>
    where
        O: Objective + ResidualOperator,
        S: StoppingRule + ?Sized,
        P: Projection + ?Sized,
    {
        match self {
            Backend::Lbfgs(s) => s.solve(z0, op, stopping, proj, record_every, observer),
            Backend::Bb(s) => s.solve(z0, op, stopping, proj, record_every, observer),
            Backend::Dore(s) => s.solve(z0, op, stopping, proj, record_every, observer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_kind_parse_and_display() {
        assert_eq!("LBFGS".parse::<SolverKind>().unwrap(), SolverKind::Lbfgs);
        assert_eq!("bb".parse::<SolverKind>().unwrap(), SolverKind::Bb);
        assert_eq!("Dore".parse::<SolverKind>().unwrap(), SolverKind::Dore);
        assert!("newton".parse::<SolverKind>().is_err());

        for kind in SolverKind::ALL {
            assert_eq!(kind.to_string().parse::<SolverKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_checkpoint_cadence_no_duplicate_final() {
        let mut trace: Vec<Checkpoint> = Vec::new();
        let mut cp = Checkpoints::new(2);
        cp.start(&[0.0], &mut trace);
        for it in 1..=4 {
            cp.record(it, &[it as f64], &mut trace);
        }
        cp.finish(4, &[4.0], &mut trace);

        let iters: Vec<usize> = trace.iter().map(|c| c.iteration).collect();
        assert_eq!(iters, vec![0, 2, 4]);
    }

    #[test]
    fn test_backends_ignore_observer_choice() {
        use crate::linalg::sparse;
        use crate::objective::FoldObjective;
        use crate::problem::block_basis;
        use crate::projection::SimplexBlocks;

        let a = sparse::identity(3);
        let basis = block_basis(&[3]);
        let offset = vec![-0.2, -0.3, 0.5];
        let f = FoldObjective::new(&a, &basis, &offset);
        let proj = SimplexBlocks::new(&[3]);
        let stopping = StoppingCriteria::max_iter(5);

        for backend in [
            Backend::Lbfgs(Lbfgs::default()),
            Backend::Bb(Bb::default()),
            Backend::Dore(Dore::default()),
        ] {
            let mut trace: Vec<Checkpoint> = Vec::new();
            let recorded = backend.solve(vec![0.0; 2], &f, &stopping, &proj, 1, &mut trace);
            let silent = backend.solve(vec![0.0; 2], &f, &stopping, &proj, 1, &mut NullObserver);
            assert_eq!(recorded, silent, "{}", backend.kind());
            if recorded.is_ok() {
                assert_eq!(trace.first().map(|c| c.iteration), Some(0));
            }
        }
    }
}
