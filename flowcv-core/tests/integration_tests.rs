//! End-to-end tests for the solvers and the cross-validation harness.
//!
//! These build small block-simplex problems with known solutions and run
//! them through the public API only.

use flowcv_core::linalg::sparse;
use flowcv_core::solvers::Checkpoint;
use flowcv_core::{
    block_basis, CrossValidation, CvError, CvSettings, FoldObjective, Lbfgs, LbfgsSettings, MetricKind,
    Objective, ProblemInstance, SimplexBlocks, SolverError, SolverKind, StoppingCriteria, Subset,
    WolfeParams,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Two blocks of size 2, A = I4, b inside the feasible set.
fn two_block_identity() -> ProblemInstance {
    let block_sizes = vec![2, 2];
    let b = vec![0.3, 0.7, 0.6, 0.4];
    ProblemInstance::new(sparse::identity(4), b.clone(), block_basis(&block_sizes), block_sizes, b).unwrap()
}

/// Route-link style problem: random non-negative A, x_true on the simplex blocks.
fn random_problem(seed: u64, block_sizes: &[usize], m: usize) -> ProblemInstance {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n: usize = block_sizes.iter().sum();

    let mut x_true = Vec::with_capacity(n);
    for &size in block_sizes {
        let w: Vec<f64> = (0..size).map(|_| rng.gen_range(0.1..1.0)).collect();
        let total: f64 = w.iter().sum();
        x_true.extend(w.iter().map(|v| v / total));
    }

    let mut triplets = Vec::new();
    for i in 0..m {
        for j in 0..n {
            if rng.gen_bool(0.4) {
                triplets.push((i, j, rng.gen_range(1.0..10.0)));
            }
        }
        // Every row observes at least one route
        triplets.push((i, i % n, 1.0));
    }
    let a = sparse::from_triplets(m, n, triplets);
    let mut b = vec![0.0; m];
    sparse::spmv(&a, &x_true, &mut b, 1.0, 0.0);

    ProblemInstance::new(a, b, block_basis(block_sizes), block_sizes.to_vec(), x_true).unwrap()
}

/// Multiplicative noise on the observations, so the data are no longer
/// explained by any feasible point.
fn with_noise(mut prob: ProblemInstance, seed: u64, level: f64) -> ProblemInstance {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for bi in prob.b.iter_mut() {
        *bi *= 1.0 + level * rng.gen_range(-1.0..1.0);
    }
    prob
}

fn full_data_objective(prob: &ProblemInstance) -> (Vec<f64>, sparse::SparseMat) {
    let mut offset = vec![0.0; prob.num_obs()];
    sparse::spmv(&prob.a, &prob.x0, &mut offset, 1.0, 0.0);
    for (o, bi) in offset.iter_mut().zip(prob.b.iter()) {
        *o -= bi;
    }
    (offset, prob.a.clone())
}

#[test]
fn test_lbfgs_recovers_two_block_target() {
    let prob = two_block_identity();
    let (offset, a) = full_data_objective(&prob);
    let f = FoldObjective::new(&a, &prob.basis, &offset);
    let proj = SimplexBlocks::new(&prob.block_sizes);
    let stopping = StoppingCriteria { max_iter: 100, tol_grad: 1e-8, tol_obj: None };

    let mut trace: Vec<Checkpoint> = Vec::new();
    let out = Lbfgs::default()
        .solve(vec![0.0; prob.reduced_dim()], &f, &stopping, &proj, 1, &mut trace)
        .expect("LBFGS failed");

    let x = prob.lift(&out.z);
    let mut r = vec![0.0; 4];
    sparse::spmv(&prob.a, &x, &mut r, 1.0, 0.0);
    let error: f64 = 0.5 * r.iter().zip(prob.b.iter()).map(|(ri, bi)| (ri - bi).powi(2)).sum::<f64>();

    println!("iterations = {}, error = {:e}, x = {:?}", out.iterations, error, x);
    assert!(error < 1e-6);
    for (xi, bi) in x.iter().zip(prob.b.iter()) {
        assert!((xi - bi).abs() < 1e-4);
    }
    assert_eq!(trace.first().map(|c| c.iteration), Some(0));
    assert_eq!(trace.last().map(|c| c.iteration), Some(out.iterations));
}

#[test]
fn test_lbfgs_is_deterministic() {
    let prob = random_problem(11, &[3, 2, 4], 12);
    let (offset, a) = full_data_objective(&prob);
    let f = FoldObjective::new(&a, &prob.basis, &offset);
    let proj = SimplexBlocks::new(&prob.block_sizes);
    let stopping = StoppingCriteria::max_iter(15);

    let run = || {
        let mut trace: Vec<Checkpoint> = Vec::new();
        let result = Lbfgs::default().solve(vec![0.0; prob.reduced_dim()], &f, &stopping, &proj, 2, &mut trace);
        (result, trace)
    };

    let (r1, t1) = run();
    let (r2, t2) = run();
    assert_eq!(r1, r2);
    assert_eq!(t1, t2);
}

#[test]
fn test_lbfgs_iterates_are_feasible_and_improve() {
    let prob = random_problem(3, &[4, 3, 3], 20);
    let (offset, a) = full_data_objective(&prob);
    let f = FoldObjective::new(&a, &prob.basis, &offset);
    let proj = SimplexBlocks::new(&prob.block_sizes);

    let mut trace: Vec<Checkpoint> = Vec::new();
    let out = Lbfgs::default()
        .solve(vec![0.0; prob.reduced_dim()], &f, &StoppingCriteria::max_iter(30), &proj, 1, &mut trace)
        .expect("LBFGS failed");

    for cp in &trace {
        let x = prob.lift(&cp.state);
        assert!(x.iter().all(|&v| v >= -1e-9), "negative entry in {:?}", x);
        let mut start = 0;
        for &size in &prob.block_sizes {
            let mass: f64 = x[start..start + size].iter().sum();
            assert!((mass - 1.0).abs() < 1e-9);
            start += size;
        }
    }
    assert!(out.value < f.value(&trace[0].state));
}

#[test]
fn test_lbfgs_iteration_cap_only_on_two_block_identity() {
    // No gradient tolerance: the run has to recognise convergence on its own
    let prob = two_block_identity();
    let (offset, a) = full_data_objective(&prob);
    let f = FoldObjective::new(&a, &prob.basis, &offset);
    let proj = SimplexBlocks::new(&prob.block_sizes);

    let mut trace: Vec<Checkpoint> = Vec::new();
    let out = Lbfgs::default()
        .solve(vec![0.0; prob.reduced_dim()], &f, &StoppingCriteria::max_iter(100), &proj, 1, &mut trace)
        .expect("LBFGS failed");

    assert!(out.iterations <= 100);
    assert!(out.value < 1e-10, "value = {:e}", out.value);
    let x = prob.lift(&out.z);
    for (xi, bi) in x.iter().zip(prob.b.iter()) {
        assert!((xi - bi).abs() < 1e-6);
    }
    assert_eq!(trace.last().map(|c| c.iteration), Some(out.iterations));
}

#[test]
fn test_lbfgs_boundary_optimum() {
    // Target (1.2, -0.1, 0) lies outside the simplex; the optimum is the
    // vertex (1, 0, 0) where the gradient does not vanish.
    let block_sizes = vec![3];
    let prob = ProblemInstance::new(
        sparse::identity(3),
        vec![1.2, -0.1, 0.0],
        block_basis(&block_sizes),
        block_sizes,
        vec![1.0, 0.0, 0.0],
    )
    .unwrap();
    let (offset, a) = full_data_objective(&prob);
    let f = FoldObjective::new(&a, &prob.basis, &offset);
    let proj = SimplexBlocks::new(&prob.block_sizes);

    for stopping in [StoppingCriteria::max_iter(100), StoppingCriteria::default()] {
        let mut trace: Vec<Checkpoint> = Vec::new();
        let out = Lbfgs::default()
            .solve(vec![0.0; prob.reduced_dim()], &f, &stopping, &proj, 1, &mut trace)
            .expect("LBFGS failed");

        let x = prob.lift(&out.z);
        for (xi, ei) in x.iter().zip(prob.x_true.iter()) {
            assert!((xi - ei).abs() < 1e-6, "x = {:?}", x);
        }
        assert!(out.iterations < 100);
    }
}

#[test]
fn test_cross_validation_all_solvers() {
    for kind in SolverKind::ALL {
        let prob = random_problem(42, &[3, 3, 2], 18);
        let settings = CvSettings {
            k: 3,
            record_every: 2,
            stopping: StoppingCriteria { max_iter: 40, tol_grad: 1e-10, tol_obj: None },
            ..Default::default()
        };

        let mut cv = CrossValidation::new(prob, kind, settings).unwrap();
        for i in 0..cv.num_folds() {
            if let Err(e) = cv.run_fold(i) {
                panic!("{} failed: {}", kind, e);
            }
        }

        let metrics = cv.post_process().unwrap();
        assert_eq!(metrics.solver, kind);
        assert_eq!(metrics.folds.len(), 3);
        for fm in &metrics.folds {
            assert_eq!(fm.iterations[0], 0);
            assert_eq!(fm.test.rmse.len(), fm.iterations.len());
            assert_eq!(fm.train_bins.len(), 7);
            // Training error does not increase from the start
            let first = fm.train.error[0];
            let last = *fm.train.error.last().unwrap();
            assert!(last <= first + 1e-9, "{}: {} -> {}", kind, first, last);
        }
        assert!(metrics.summary.mean_rmse.is_finite());
        assert!(metrics.summary.mean_time >= 0.0);

        let bars = metrics.bin_aggregate(MetricKind::Rmse, Subset::Test, 0);
        assert_eq!(bars.len(), 7);
        assert!(bars.iter().all(|b| b.mean.map_or(true, f64::is_finite)));
    }
}

#[test]
fn test_cross_validation_noisy_observations() {
    // Noisy counts push the fold optima onto faces of the simplex
    for kind in SolverKind::ALL {
        let prob = with_noise(random_problem(7, &[4, 3, 2, 3], 24), 99, 0.3);
        let settings = CvSettings {
            k: 4,
            stopping: StoppingCriteria::max_iter(150),
            ..Default::default()
        };

        let mut cv = CrossValidation::new(prob, kind, settings).unwrap();
        cv.run().unwrap_or_else(|e| panic!("{} failed: {}", kind, e));

        let metrics = cv.post_process().unwrap();
        assert_eq!(metrics.folds.len(), 4);
        for fm in &metrics.folds {
            let first = fm.train.error[0];
            let last = *fm.train.error.last().unwrap();
            assert!(last <= first + 1e-9, "{}: {} -> {}", kind, first, last);
        }
    }
}

#[test]
fn test_harness_on_two_block_identity() {
    let settings = CvSettings {
        k: 2,
        stopping: StoppingCriteria { max_iter: 200, tol_grad: 1e-8, tol_obj: None },
        ..Default::default()
    };
    let mut cv = CrossValidation::new(two_block_identity(), SolverKind::Lbfgs, settings).unwrap();
    cv.run().unwrap();

    for i in 0..2 {
        let trace = cv.trace(i).unwrap();
        assert_eq!(trace.iterations[0], 0);
        assert_eq!(trace.durations.len(), trace.states.len());
    }

    let metrics = cv.post_process().unwrap();
    // Each fold observes one block only; training data is fit exactly
    for fm in &metrics.folds {
        assert!(*fm.train.error.last().unwrap() < 1e-12);
    }
}

#[test]
fn test_fold_failure_carries_context() {
    let block_sizes = vec![2, 2];
    // Both the quasi-Newton step and the projected-gradient restart overshoot
    // to the opposite vertex, which is no better than the start
    let b = vec![30.0, 70.0, 50.0, 50.0];
    let a = sparse::from_triplets(4, 4, (0..4).map(|i| (i, i, 100.0)));
    let prob = ProblemInstance::new(a, b, block_basis(&block_sizes), block_sizes, vec![0.3, 0.7, 0.5, 0.5]).unwrap();

    let settings = CvSettings {
        k: 2,
        lbfgs: LbfgsSettings {
            history_size: 10,
            line_search: WolfeParams { max_steps: 1, ..Default::default() },
        },
        ..Default::default()
    };
    let mut cv = CrossValidation::new(prob, SolverKind::Lbfgs, settings).unwrap();

    let err = cv.run_fold(0).unwrap_err();
    match err {
        CvError::FoldFailed { fold, solver, iteration, source } => {
            assert_eq!(fold, 0);
            assert_eq!(solver, SolverKind::Lbfgs);
            assert_eq!(iteration, Some(1));
            assert!(matches!(source, SolverError::LineSearchDivergence { max_steps: 1, .. }));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(cv.trace(0).is_none());
    assert!(matches!(cv.post_process(), Err(CvError::NotRun)));
}

#[test]
fn test_cleanup_ordering() {
    let settings = CvSettings { k: 2, ..Default::default() };
    let mut cv = CrossValidation::new(two_block_identity(), SolverKind::Bb, settings).unwrap();

    assert!(matches!(cv.post_process(), Err(CvError::NotRun)));

    cv.run().unwrap();
    let rmse = cv.post_process().unwrap().summary.mean_rmse;
    cv.cleanup();

    // Metrics survive cleanup, data does not
    assert_eq!(cv.metrics().map(|m| m.summary.mean_rmse), Some(rmse));
    assert!(cv.trace(0).is_none());
    assert!(matches!(cv.post_process(), Err(CvError::DataReleased)));
    assert!(matches!(cv.run_fold(0), Err(CvError::DataReleased)));
}

#[test]
fn test_invalid_inputs() {
    let block_sizes = vec![2, 2];
    let err = ProblemInstance::new(
        sparse::identity(3),
        vec![0.1, 0.2, 0.3],
        block_basis(&block_sizes),
        block_sizes,
        vec![0.0; 4],
    )
    .unwrap_err();
    assert!(matches!(err, CvError::DataShapeMismatch(_)));

    // Basis too narrow for the blocks: rejected before any fold runs
    let narrow = sparse::from_triplets(4, 1, vec![(0, 0, 1.0), (1, 0, -1.0)]);
    let err = ProblemInstance::new(sparse::identity(4), vec![0.5; 4], narrow, vec![2, 2], vec![0.5; 4]).unwrap_err();
    assert!(matches!(err, CvError::DataShapeMismatch(_)));

    let settings = CvSettings { k: 5, ..Default::default() };
    let err = CrossValidation::new(two_block_identity(), SolverKind::Dore, settings).unwrap_err();
    assert!(matches!(err, CvError::InvalidSettings(_)));
}
