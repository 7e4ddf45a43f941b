//! Serializable reports and console tables for cross-validation runs.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use flowcv_core::{MetricKind, MetricsRecord, Subset};

/// Cross-fold summary of one solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub mean_time: f64,
    pub mean_error: f64,
    pub mean_rmse: f64,
}

/// Final-iterate numbers of one fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldReport {
    pub fold: usize,
    pub iterations: usize,
    pub total_time: f64,
    pub train_rmse: f64,
    pub test_rmse: f64,
    pub test_prmse: f64,
}

/// RMSE of one volume group at the reported trace index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinReport {
    pub lower_edge: f64,
    pub folds_with_data: usize,
    pub train_rmse_mean: Option<f64>,
    pub train_rmse_std: Option<f64>,
    pub test_rmse_mean: Option<f64>,
    pub test_rmse_std: Option<f64>,
}

/// Failed fold, as reported by the harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub fold: usize,
    pub message: String,
}

/// Everything recorded for one solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    pub solver: String,
    pub max_iter: usize,
    pub summary: Option<SummaryReport>,
    pub folds: Vec<FoldReport>,
    pub failures: Vec<FailureReport>,
    /// Trace index the bin table was taken at
    pub bin_index: Option<usize>,
    pub bins: Vec<BinReport>,
}

impl SolverReport {
    /// Report for a solver whose every fold failed.
    pub fn failed(solver: String, max_iter: usize, failures: Vec<FailureReport>) -> Self {
        Self {
            solver,
            max_iter,
            summary: None,
            folds: Vec::new(),
            failures,
            bin_index: None,
            bins: Vec::new(),
        }
    }

    /// Build from post-processed metrics, with bins read at `bin_index`
    /// (the last entry when `None`).
    pub fn from_metrics(
        metrics: &MetricsRecord,
        max_iter: usize,
        failures: Vec<FailureReport>,
        bin_index: Option<usize>,
    ) -> Self {
        let folds = metrics
            .folds
            .iter()
            .map(|f| FoldReport {
                fold: f.fold,
                iterations: f.iterations.last().copied().unwrap_or(0),
                total_time: f.total_time(),
                train_rmse: f.train.rmse.last().copied().unwrap_or(f64::NAN),
                test_rmse: f.test.rmse.last().copied().unwrap_or(f64::NAN),
                test_prmse: f.test.prmse.last().copied().unwrap_or(f64::NAN),
            })
            .collect();

        let index = bin_index.unwrap_or(usize::MAX);
        let train = metrics.bin_aggregate(MetricKind::Rmse, Subset::Train, index);
        let test = metrics.bin_aggregate(MetricKind::Rmse, Subset::Test, index);
        let bins = metrics
            .bins
            .edges()
            .iter()
            .zip(train.iter().zip(test.iter()))
            .map(|(&lower_edge, (tr, te))| BinReport {
                lower_edge,
                folds_with_data: te.count,
                train_rmse_mean: tr.mean,
                train_rmse_std: tr.std,
                test_rmse_mean: te.mean,
                test_rmse_std: te.std,
            })
            .collect();

        Self {
            solver: metrics.solver.to_string(),
            max_iter,
            summary: Some(SummaryReport {
                mean_time: metrics.summary.mean_time,
                mean_error: metrics.summary.mean_error,
                mean_rmse: metrics.summary.mean_rmse,
            }),
            folds,
            failures,
            bin_index,
            bins,
        }
    }
}

/// Full benchmark output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    pub source: String,
    pub observations: usize,
    pub routes: usize,
    pub blocks: usize,
    pub folds: usize,
    /// Shared time cap used to pick the bin table index
    pub time_cap: Option<f64>,
    pub solvers: Vec<SolverReport>,
}

impl BenchReport {
    /// Save to JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create file {}", path.as_ref().display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Failed to write JSON to {}", path.as_ref().display()))?;
        Ok(())
    }
}

/// Smallest mean total time among solvers, so bins compare equal budgets.
pub fn common_time_cap(records: &[MetricsRecord]) -> Option<f64> {
    records
        .iter()
        .map(|r| r.summary.mean_time)
        .filter(|t| t.is_finite())
        .reduce(f64::min)
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.4e}", x)).unwrap_or_else(|| "-".to_string())
}

/// Print the per-solver summary table.
pub fn print_summary(report: &BenchReport) {
    println!("\n{}", "=".repeat(72));
    println!(
        "Cross-validation: {} ({} obs, {} routes, {} blocks, k = {})",
        report.source, report.observations, report.routes, report.blocks, report.folds
    );
    println!("{}", "=".repeat(72));
    println!(
        "{:<8} {:>8} {:>6} {:>7} {:>12} {:>12} {:>12}",
        "Solver", "MaxIter", "Folds", "Failed", "Time (s)", "Test error", "Test RMSE"
    );
    println!("{}", "-".repeat(72));
    for s in &report.solvers {
        match &s.summary {
            Some(sum) => println!(
                "{:<8} {:>8} {:>6} {:>7} {:>12.4} {:>12.4e} {:>12.4e}",
                s.solver,
                s.max_iter,
                s.folds.len(),
                s.failures.len(),
                sum.mean_time,
                sum.mean_error,
                sum.mean_rmse
            ),
            None => println!(
                "{:<8} {:>8} {:>6} {:>7} {:>12} {:>12} {:>12}",
                s.solver,
                s.max_iter,
                0,
                s.failures.len(),
                "-",
                "-",
                "-"
            ),
        }
    }
    println!("{}", "=".repeat(72));
}

/// Print test RMSE by volume bin for every solver.
pub fn print_bin_table(report: &BenchReport) {
    for s in report.solvers.iter().filter(|s| !s.bins.is_empty()) {
        let at = match (s.bin_index, report.time_cap) {
            (Some(i), Some(cap)) => format!("entry {} (t <= {:.3}s)", i, cap),
            _ => "final entry".to_string(),
        };
        println!("\n{} RMSE by volume bin, {}", s.solver, at);
        println!(
            "{:>12} {:>6} {:>12} {:>12} {:>12} {:>12}",
            "Volume >=", "Folds", "Train mean", "Train std", "Test mean", "Test std"
        );
        for bin in &s.bins {
            println!(
                "{:>12.3} {:>6} {:>12} {:>12} {:>12} {:>12}",
                bin.lower_edge,
                bin.folds_with_data,
                fmt_opt(bin.train_rmse_mean),
                fmt_opt(bin.train_rmse_std),
                fmt_opt(bin.test_rmse_mean),
                fmt_opt(bin.test_rmse_std)
            );
        }
    }
}
