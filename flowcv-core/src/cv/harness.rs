//! K-fold cross-validation driver.

use tracing::{debug, error, info, warn};

use super::folds::{Fold, KFold};
use super::trace::{IterationTrace, TraceRecorder};
use crate::error::{CvError, CvResult};
use crate::linalg::sparse;
use crate::metrics::MetricsRecord;
use crate::objective::FoldObjective;
use crate::problem::ProblemInstance;
use crate::projection::SimplexBlocks;
use crate::settings::CvSettings;
use crate::solvers::{Backend, Bb, Dore, Lbfgs, SolverKind};

/// Runs one solver backend over k folds of a problem and post-processes
/// the traces into metrics.
///
/// Lifecycle: `run` / `run_fold`, then `post_process`, then optionally
/// `cleanup`. Metrics survive cleanup; traces and problem data do not.
#[derive(Debug)]
pub struct CrossValidation {
    problem: ProblemInstance,
    solver: SolverKind,
    settings: CvSettings,
    folds: Vec<Fold>,
    traces: Vec<Option<IterationTrace>>,
    metrics: Option<MetricsRecord>,
    released: bool,
}

impl CrossValidation {
    pub fn new(problem: ProblemInstance, solver: SolverKind, settings: CvSettings) -> CvResult<Self> {
        settings.validate()?;
        problem.validate()?;

        let mut kfold = KFold::new(problem.num_obs(), settings.k)?;
        if let Some(seed) = settings.shuffle_seed {
            kfold = kfold.shuffled(seed);
        }
        let folds = kfold.split();
        let traces = vec![None; folds.len()];

        Ok(Self {
            problem,
            solver,
            settings,
            folds,
            traces,
            metrics: None,
            released: false,
        })
    }

    pub fn solver(&self) -> SolverKind {
        self.solver
    }

    pub fn settings(&self) -> &CvSettings {
        &self.settings
    }

    pub fn problem(&self) -> &ProblemInstance {
        &self.problem
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    pub fn num_folds(&self) -> usize {
        self.folds.len()
    }

    /// Trace of fold `i`, if it ran successfully and data was not released.
    pub fn trace(&self, i: usize) -> Option<&IterationTrace> {
        self.traces.get(i).and_then(|t| t.as_ref())
    }

    pub fn metrics(&self) -> Option<&MetricsRecord> {
        self.metrics.as_ref()
    }

    fn backend(&self) -> Backend {
        match self.solver {
            SolverKind::Lbfgs => Backend::Lbfgs(Lbfgs::new(self.settings.lbfgs.clone())),
            SolverKind::Bb => Backend::Bb(Bb::new(self.settings.bb.clone())),
            SolverKind::Dore => Backend::Dore(Dore::new(self.settings.dore.clone())),
        }
    }

    /// Run every fold in order, stopping at the first failure.
    pub fn run(&mut self) -> CvResult<()> {
        for i in 0..self.folds.len() {
            self.run_fold(i)?;
        }
        Ok(())
    }

    /// Run a single fold and store its trace.
    ///
    /// On failure any partial trace is discarded (and logged) and the
    /// previous trace of the fold, if any, is cleared.
    pub fn run_fold(&mut self, i: usize) -> CvResult<&IterationTrace> {
        if self.released {
            return Err(CvError::DataReleased);
        }
        let fold = self.folds.get(i).ok_or_else(|| {
            CvError::InvalidSettings(format!("fold index {} out of range (k = {})", i, self.folds.len()))
        })?;
        self.traces[i] = None;

        let prob = &self.problem;
        let a_train = sparse::select_rows(&prob.a, &fold.train);
        let mut offset = vec![0.0; fold.train.len()];
        sparse::spmv(&a_train, &prob.x0, &mut offset, 1.0, 0.0);
        for (o, &row) in offset.iter_mut().zip(fold.train.iter()) {
            *o -= prob.b[row];
        }

        let objective = FoldObjective::new(&a_train, &prob.basis, &offset);
        let proj = SimplexBlocks::new(&prob.block_sizes);
        let z0 = vec![0.0; prob.reduced_dim()];
        let backend = self.backend();

        debug!(fold = i, solver = %backend.kind(), train = fold.train.len(), test = fold.test.len(), "starting solver");
        let mut recorder = TraceRecorder::new();
        let result = backend.solve(
            z0,
            &objective,
            &self.settings.stopping,
            &proj,
            self.settings.record_every,
            &mut recorder,
        );

        match result {
            Ok(outcome) => {
                let trace = recorder.finish();
                info!(
                    fold = i,
                    solver = %self.solver,
                    iterations = outcome.iterations,
                    value = outcome.value,
                    seconds = trace.total_time().as_secs_f64(),
                    "solver finished"
                );
                Ok(self.traces[i].insert(trace))
            }
            Err(source) => {
                let iteration = source.iteration();
                if !recorder.is_empty() {
                    warn!(fold = i, solver = %self.solver, entries = recorder.len(), "discarding partial trace");
                }
                error!(fold = i, solver = %self.solver, iteration = ?iteration, error = %source, "solver failed");
                Err(CvError::FoldFailed { fold: i, solver: self.solver, iteration, source })
            }
        }
    }

    /// Compute metrics from the stored traces.
    pub fn post_process(&mut self) -> CvResult<&MetricsRecord> {
        if self.released {
            return Err(CvError::DataReleased);
        }
        let record = MetricsRecord::compute(
            &self.problem,
            &self.folds,
            &self.traces,
            self.solver,
            self.settings.nbins,
        )?;
        Ok(self.metrics.insert(record))
    }

    /// Release problem matrices and traces, keeping metrics.
    pub fn cleanup(&mut self) {
        if self.released {
            return;
        }
        let dropped = self.traces.iter().filter(|t| t.is_some()).count();
        if self.metrics.is_none() && dropped > 0 {
            warn!(solver = %self.solver, traces = dropped, "cleanup before post_process discards traces");
        }
        self.problem.release();
        self.traces.iter_mut().for_each(|t| *t = None);
        self.released = true;
    }
}
