//! Error types for solvers and the cross-validation harness.

use thiserror::Error;

use crate::solvers::SolverKind;

/// Failure of the weak Wolfe line search.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineSearchError {
    /// The bisection bracket did not close within the step budget.
    #[error("bracket did not close within {max_steps} steps (last t = {last_step:e})")]
    BracketNotClosed { max_steps: usize, last_step: f64 },
}

/// Numerical failures inside a single solver run.
#[derive(Debug, Clone, PartialEq, Error)]
#[allow(missing_docs)]
pub enum SolverError {
    #[error("degenerate curvature at iteration {iteration}: y·s = {ys:e}")]
    DegenerateCurvature { iteration: usize, ys: f64 },

    #[error("line search diverged at iteration {iteration}: no Wolfe step within {max_steps} steps (last t = {last_step:e})")]
    LineSearchDivergence {
        iteration: usize,
        max_steps: usize,
        last_step: f64,
    },

    #[error("operator norm estimate is degenerate: {value:e}")]
    DegenerateOperator { value: f64 },

    #[error("non-finite objective {value} at iteration {iteration}")]
    NonFiniteObjective { iteration: usize, value: f64 },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl SolverError {
    /// Iteration at which the failure happened, when it belongs to one.
    pub fn iteration(&self) -> Option<usize> {
        match self {
            SolverError::DegenerateCurvature { iteration, .. }
            | SolverError::LineSearchDivergence { iteration, .. }
            | SolverError::NonFiniteObjective { iteration, .. } => Some(*iteration),
            SolverError::DegenerateOperator { .. } | SolverError::DimensionMismatch { .. } => None,
        }
    }

    pub(crate) fn from_line_search(err: LineSearchError, iteration: usize) -> Self {
        match err {
            LineSearchError::BracketNotClosed { max_steps, last_step } => {
                SolverError::LineSearchDivergence { iteration, max_steps, last_step }
            }
        }
    }
}

/// Errors surfaced by the cross-validation harness.
#[derive(Debug, Error)]
pub enum CvError {
    /// Dimensions of `A`, `b`, `N`, `block_sizes` are inconsistent.
    #[error("data shape mismatch: {0}")]
    DataShapeMismatch(String),

    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A solver run failed; the fold's trace was discarded.
    #[error("fold {fold} ({solver}) failed{}: {source}", fmt_iteration(.iteration))]
    FoldFailed {
        fold: usize,
        solver: SolverKind,
        iteration: Option<usize>,
        #[source]
        source: SolverError,
    },

    /// Problem data and traces were released by `cleanup`.
    #[error("problem data already released by cleanup")]
    DataReleased,

    /// No fold has produced a trace yet.
    #[error("no fold has been run")]
    NotRun,
}

fn fmt_iteration(iteration: &Option<usize>) -> String {
    iteration.map(|i| format!(" at iteration {}", i)).unwrap_or_default()
}

/// Result type for solver runs.
pub type SolverResult<T> = Result<T, SolverError>;

/// Result type for harness operations.
pub type CvResult<T> = Result<T, CvError>;
