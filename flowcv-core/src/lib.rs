//! flowcv: projected quasi-Newton solvers with k-fold cross-validation
//!
//! Estimates a block-simplex constrained vector `x` (e.g. route flow
//! proportions) from linear measurements `b ≈ A x`. The problem is solved in
//! reduced coordinates `z`, with `x = x0 + N z`, and evaluated by k-fold
//! cross-validation over the rows of `A`.
//!
//! # Solvers
//!
//! - **LBFGS**: projected limited-memory BFGS with a weak Wolfe line search
//! - **BB**: spectral projected gradient with Barzilai–Borwein steps
//! - **DORE**: double over-relaxation on a spectrally normalized operator
//!
//! # Example
//!
//! ```ignore
//! use flowcv_core::{block_basis, CrossValidation, CvSettings, ProblemInstance, SolverKind};
//!
//! let block_sizes = vec![2, 2];
//! let prob = ProblemInstance::new(a, b, block_basis(&block_sizes), block_sizes, x_true)?;
//!
//! let mut cv = CrossValidation::new(prob, SolverKind::Lbfgs, CvSettings::default())?;
//! cv.run()?;
//! let metrics = cv.post_process()?;
//! println!("mean test RMSE: {}", metrics.summary.mean_rmse);
//! cv.cleanup();
//! ```

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod cv;
pub mod error;
pub mod linalg;
pub mod metrics;
pub mod objective;
pub mod problem;
pub mod projection;
pub mod settings;
pub mod solvers;

pub use cv::{CrossValidation, Fold, IterationTrace, KFold, TraceRecorder};
pub use error::{CvError, CvResult, LineSearchError, SolverError, SolverResult};
pub use metrics::{BinAggregate, FoldMetrics, MetricCurves, MetricKind, MetricsRecord, Subset, Summary, VolumeBins};
pub use objective::{FoldObjective, Objective, ResidualOperator};
pub use problem::{anchor_point, block_basis, ProblemInstance};
pub use projection::{projected_gradient, Identity, Projection, SimplexBlocks};
pub use settings::{CvSettings, LogLevel};
pub use solvers::{
    Backend, Bb, BbSettings, Checkpoint, Dore, DoreSettings, Lbfgs, LbfgsSettings, Observer, SolveOutcome,
    SolverKind, StoppingCriteria, StoppingRule, WolfeParams,
};
