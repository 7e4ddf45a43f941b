//! Cross-validation CLI: runs the flowcv solvers over k folds of a problem
//! and compares their test error.

mod matparser;
mod report;
mod solver_choice;
mod synthetic;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use flowcv_core::{CrossValidation, CvSettings, LogLevel, MetricsRecord, ProblemInstance, SolverKind, StoppingCriteria};

use report::{BenchReport, FailureReport, SolverReport};
use solver_choice::SolverChoice;
use synthetic::SyntheticConfig;

#[derive(Parser, Debug)]
#[command(name = "flowcv-bench", about = "K-fold cross-validation of block-simplex flow solvers")]
struct Args {
    /// Problem file (.mat or .mat.gz) with A, b, block_sizes, x_true and optional N
    #[arg(long, conflicts_with = "synthetic")]
    file: Option<PathBuf>,

    /// Generate a synthetic problem with this many blocks instead of loading a file
    #[arg(long)]
    synthetic: Option<usize>,

    /// Relative noise on synthetic observations
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// Solvers to run (repeatable); defaults to bb, dore, lbfgs
    #[arg(long, value_enum)]
    solver: Vec<SolverChoice>,

    /// Number of folds
    #[arg(long, default_value_t = 3)]
    folds: usize,

    /// Scale every solver's base iteration budget
    #[arg(long, default_value_t = 1)]
    multiplier: usize,

    /// Same iteration budget for every solver (overrides the multiplier)
    #[arg(long)]
    max_iter: Option<usize>,

    /// Record a checkpoint every this many iterations
    #[arg(long)]
    record_every: Option<usize>,

    /// Seed for synthetic data and shuffling
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Shuffle observations before splitting into folds
    #[arg(long)]
    shuffle: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: LogLevel,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn init_logging(level: LogLevel) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(level).into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load(args: &Args) -> Result<(String, ProblemInstance)> {
    match &args.file {
        Some(path) => Ok((path.display().to_string(), matparser::load_problem(path)?)),
        None => {
            let config = SyntheticConfig {
                blocks: args.synthetic.unwrap_or(SyntheticConfig::default().blocks),
                noise: args.noise,
                seed: args.seed,
                ..Default::default()
            };
            info!(blocks = config.blocks, links = config.links, seed = config.seed, "generating synthetic problem");
            Ok((format!("synthetic(seed = {})", args.seed), synthetic::generate(&config)?))
        }
    }
}

/// Run every fold of one solver, keeping going past fold failures.
fn run_solver(
    problem: ProblemInstance,
    kind: SolverKind,
    settings: CvSettings,
) -> Result<(Option<MetricsRecord>, Vec<FailureReport>)> {
    let mut cv = CrossValidation::new(problem, kind, settings)?;
    let mut failures = Vec::new();

    for i in 0..cv.num_folds() {
        if let Err(e) = cv.run_fold(i) {
            warn!(fold = i, solver = %kind, "fold failed, continuing");
            failures.push(FailureReport { fold: i, message: e.to_string() });
        }
    }

    let metrics = match cv.post_process() {
        Ok(m) => Some(m.clone()),
        Err(e) => {
            error!(solver = %kind, error = %e, "no metrics");
            None
        }
    };
    cv.cleanup();
    Ok((metrics, failures))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log);

    let (source, problem) = load(&args)?;
    let choices = if args.solver.is_empty() {
        vec![SolverChoice::Bb, SolverChoice::Dore, SolverChoice::Lbfgs]
    } else {
        args.solver.clone()
    };

    let mut runs = Vec::new();
    for &choice in &choices {
        let kind = SolverKind::from(choice);
        let max_iter = args
            .max_iter
            .unwrap_or_else(|| choice.base_iterations() * args.multiplier.max(1));

        let defaults = CvSettings::default();
        let settings = CvSettings {
            k: args.folds,
            shuffle_seed: args.shuffle.then_some(args.seed),
            log_level: args.log,
            record_every: args.record_every.unwrap_or(defaults.record_every),
            stopping: StoppingCriteria { max_iter, ..Default::default() },
            ..defaults
        };

        info!(solver = %kind, max_iter, folds = args.folds, "running cross-validation");
        let (metrics, failures) = run_solver(problem.clone(), kind, settings)?;
        runs.push((kind, max_iter, metrics, failures));
    }

    let records: Vec<MetricsRecord> = runs.iter().filter_map(|(_, _, m, _)| m.clone()).collect();
    let time_cap = report::common_time_cap(&records);

    let solvers = runs
        .into_iter()
        .map(|(kind, max_iter, metrics, failures)| match metrics {
            Some(m) => {
                let index = time_cap.and_then(|cap| m.index_within_time(cap));
                SolverReport::from_metrics(&m, max_iter, failures, index)
            }
            None => SolverReport::failed(kind.to_string(), max_iter, failures),
        })
        .collect();

    let bench = BenchReport {
        source,
        observations: problem.num_obs(),
        routes: problem.full_dim(),
        blocks: problem.block_sizes.len(),
        folds: args.folds,
        time_cap,
        solvers,
    };

    report::print_summary(&bench);
    report::print_bin_table(&bench);

    if let Some(path) = &args.json {
        bench.save_json(path)?;
        info!(path = %path.display(), "wrote report");
    }

    Ok(())
}
