//! Error metrics over iteration traces.
//!
//! For every recorded iterate `x̂ = x0 + N z` of a fold:
//!
//! ```text
//! error = ½ ‖A x̂ − b‖²
//! RMSE  = sqrt(error / n)
//! pRMSE = RMSE / mean(b)
//! ```
//!
//! on the train and test rows of the fold, and again per volume bin. A bin
//! without train or test rows yields `None` for both subsets.

pub mod bins;

pub use bins::VolumeBins;

use tracing::{debug, warn};

use crate::cv::{Fold, IterationTrace};
use crate::error::{CvError, CvResult};
use crate::linalg::sparse;
use crate::problem::ProblemInstance;
use crate::solvers::SolverKind;

/// Which metric curve to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Error,
    Rmse,
    Prmse,
}

/// Which rows of a fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subset {
    Train,
    Test,
}

/// Metric values along a trace, one entry per recorded iterate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricCurves {
    pub error: Vec<f64>,
    pub rmse: Vec<f64>,
    pub prmse: Vec<f64>,
}

impl MetricCurves {
    /// Metrics of the iterates `xs` against `A`, `b`.
    pub fn evaluate(a: &sparse::SparseMat, b: &[f64], xs: &[Vec<f64>]) -> Self {
        let residuals = residuals(a, b, xs);
        let rows: Vec<usize> = (0..b.len()).collect();
        Self::from_residuals(&residuals, &rows, b)
    }

    /// Metrics restricted to `rows`, from full residual vectors `A x̂ − b`.
    pub fn from_residuals(residuals: &[Vec<f64>], rows: &[usize], b: &[f64]) -> Self {
        let n = rows.len() as f64;
        let mean_b = rows.iter().map(|&i| b[i]).sum::<f64>() / n;

        let mut curves = Self {
            error: Vec::with_capacity(residuals.len()),
            rmse: Vec::with_capacity(residuals.len()),
            prmse: Vec::with_capacity(residuals.len()),
        };
        for r in residuals {
            let error = 0.5 * rows.iter().map(|&i| r[i] * r[i]).sum::<f64>();
            let rmse = (error / n).sqrt();
            curves.error.push(error);
            curves.rmse.push(rmse);
            curves.prmse.push(rmse / mean_b);
        }
        curves
    }

    pub fn get(&self, kind: MetricKind) -> &[f64] {
        match kind {
            MetricKind::Error => &self.error,
            MetricKind::Rmse => &self.rmse,
            MetricKind::Prmse => &self.prmse,
        }
    }

    pub fn len(&self) -> usize {
        self.error.len()
    }

    pub fn is_empty(&self) -> bool {
        self.error.is_empty()
    }
}

/// `A x − b` for each iterate.
fn residuals(a: &sparse::SparseMat, b: &[f64], xs: &[Vec<f64>]) -> Vec<Vec<f64>> {
    xs.iter()
        .map(|x| {
            let mut r: Vec<f64> = b.iter().map(|bi| -bi).collect();
            sparse::spmv(a, x, &mut r, 1.0, 1.0);
            r
        })
        .collect()
}

/// Metrics of one fold.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldMetrics {
    pub fold: usize,

    /// Iteration number of each trace entry
    pub iterations: Vec<usize>,

    /// Cumulative seconds at each trace entry
    pub cumulative_time: Vec<f64>,

    pub train: MetricCurves,
    pub test: MetricCurves,

    /// Per volume group; `None` when the group has no train or no test rows
    pub train_bins: Vec<Option<MetricCurves>>,
    pub test_bins: Vec<Option<MetricCurves>>,
}

impl FoldMetrics {
    pub fn curves(&self, subset: Subset) -> &MetricCurves {
        match subset {
            Subset::Train => &self.train,
            Subset::Test => &self.test,
        }
    }

    pub fn bin_curves(&self, subset: Subset) -> &[Option<MetricCurves>] {
        match subset {
            Subset::Train => &self.train_bins,
            Subset::Test => &self.test_bins,
        }
    }

    pub fn total_time(&self) -> f64 {
        self.cumulative_time.last().copied().unwrap_or(0.0)
    }
}

/// Cross-fold means of final-iterate scalars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Mean total elapsed seconds
    pub mean_time: f64,

    /// Mean final test error
    pub mean_error: f64,

    /// Mean final test RMSE
    pub mean_rmse: f64,
}

/// Mean and standard deviation of a bin metric across folds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinAggregate {
    /// Number of folds with data in this bin
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

/// Post-processed metrics of a cross-validation run.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub solver: SolverKind,
    pub bins: VolumeBins,
    pub folds: Vec<FoldMetrics>,

    /// Mean cumulative time across folds, truncated to the shortest trace
    pub mean_times: Vec<f64>,

    pub summary: Summary,
}

impl MetricsRecord {
    /// Compute metrics for every fold that has a trace.
    ///
    /// Folds without a trace are skipped with a warning; `NotRun` when no
    /// fold has one.
    pub fn compute(
        problem: &ProblemInstance,
        folds: &[Fold],
        traces: &[Option<IterationTrace>],
        solver: SolverKind,
        nbins: usize,
    ) -> CvResult<Self> {
        let bins = VolumeBins::new(&problem.b, nbins);
        let mut out = Vec::new();

        for (i, (fold, trace)) in folds.iter().zip(traces.iter()).enumerate() {
            let trace = match trace {
                Some(t) if !t.is_empty() => t,
                _ => {
                    warn!(fold = i, solver = %solver, "no trace for fold, skipping metrics");
                    continue;
                }
            };
            out.push(fold_metrics(problem, i, fold, trace, &bins));
        }

        if out.is_empty() {
            return Err(CvError::NotRun);
        }

        let shortest = out.iter().map(|f| f.cumulative_time.len()).min().unwrap_or(0);
        let mean_times = (0..shortest)
            .map(|t| mean(out.iter().map(|f| f.cumulative_time[t])))
            .collect();

        let summary = Summary {
            mean_time: mean(out.iter().map(|f| f.total_time())),
            mean_error: mean(out.iter().filter_map(|f| f.test.error.last().copied())),
            mean_rmse: mean(out.iter().filter_map(|f| f.test.rmse.last().copied())),
        };
        debug!(
            solver = %solver,
            mean_time = summary.mean_time,
            mean_error = summary.mean_error,
            "summary"
        );

        Ok(Self { solver, bins, folds: out, mean_times, summary })
    }

    /// Number of volume groups reported per fold.
    pub fn num_groups(&self) -> usize {
        self.bins.num_groups()
    }

    /// Aggregate a bin metric at trace entry `index` across folds.
    ///
    /// Folds without data in a bin are excluded, not counted as zero. A
    /// fold whose trace is shorter than `index` contributes its last entry.
    pub fn bin_aggregate(&self, kind: MetricKind, subset: Subset, index: usize) -> Vec<BinAggregate> {
        (0..self.num_groups())
            .map(|j| {
                let values: Vec<f64> = self
                    .folds
                    .iter()
                    .filter_map(|f| f.bin_curves(subset)[j].as_ref())
                    .filter_map(|c| {
                        let curve = c.get(kind);
                        curve.get(index).or_else(|| curve.last()).copied()
                    })
                    .collect();
                aggregate(&values)
            })
            .collect()
    }

    /// Last trace index whose mean cumulative time is within `time_max`.
    pub fn index_within_time(&self, time_max: f64) -> Option<usize> {
        self.mean_times.iter().rposition(|&t| t <= time_max)
    }
}

fn fold_metrics(
    problem: &ProblemInstance,
    index: usize,
    fold: &Fold,
    trace: &IterationTrace,
    bins: &VolumeBins,
) -> FoldMetrics {
    let xs: Vec<Vec<f64>> = trace.states.iter().map(|z| problem.lift(z)).collect();
    let residuals = residuals(&problem.a, &problem.b, &xs);

    let train = MetricCurves::from_residuals(&residuals, &fold.train, &problem.b);
    let test = MetricCurves::from_residuals(&residuals, &fold.test, &problem.b);
    if let (Some(tr0), Some(tr1), Some(te0), Some(te1)) =
        (train.rmse.first(), train.rmse.last(), test.rmse.first(), test.rmse.last())
    {
        debug!(fold = index, "train RMSE {:.5e} to {:.5e}", tr0, tr1);
        debug!(fold = index, "test RMSE {:.5e} to {:.5e}", te0, te1);
    }

    if let Some(x_last) = xs.last() {
        if problem.x_true.len() == x_last.len() {
            let dist = max_abs_diff(x_last, &problem.x_true);
            let start = max_abs_diff(&problem.x0, &problem.x_true);
            debug!(fold = index, dist_from_true = dist, start_dist_from_true = start, "max|x - x_true|");
        }
    }

    let train_groups = bins.partition(&fold.train, &problem.b);
    let test_groups = bins.partition(&fold.test, &problem.b);
    let mut train_bins = Vec::with_capacity(bins.num_groups());
    let mut test_bins = Vec::with_capacity(bins.num_groups());
    for (tr, te) in train_groups.iter().zip(test_groups.iter()) {
        if tr.is_empty() || te.is_empty() {
            train_bins.push(None);
            test_bins.push(None);
            continue;
        }
        train_bins.push(Some(MetricCurves::from_residuals(&residuals, tr, &problem.b)));
        test_bins.push(Some(MetricCurves::from_residuals(&residuals, te, &problem.b)));
    }

    FoldMetrics {
        fold: index,
        iterations: trace.iterations.clone(),
        cumulative_time: trace.cumulative_seconds(),
        train,
        test,
        train_bins,
        test_bins,
    }
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

fn mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation, like `numpy.std`.
fn aggregate(values: &[f64]) -> BinAggregate {
    if values.is_empty() {
        return BinAggregate { count: 0, mean: None, std: None };
    }
    let m = mean(values.iter().copied());
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    BinAggregate { count: values.len(), mean: Some(m), std: Some(var.sqrt()) }
}
