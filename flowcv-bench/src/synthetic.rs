//! Seeded synthetic route-link problems.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use anyhow::{Context, Result};
use flowcv_core::linalg::sparse;
use flowcv_core::{block_basis, ProblemInstance};

/// Shape of a generated problem.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Number of origin-destination blocks
    pub blocks: usize,
    /// Maximum routes per block (sizes are drawn from 1..=max_routes)
    pub max_routes: usize,
    /// Number of link observations
    pub links: usize,
    /// Probability that a route uses a given link
    pub density: f64,
    /// Relative multiplicative noise on b (0 for exact data)
    pub noise: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            blocks: 20,
            max_routes: 4,
            links: 60,
            density: 0.15,
            noise: 0.0,
            seed: 0,
        }
    }
}

/// Generate a problem with a known block-simplex solution.
///
/// Each block carries a random demand that scales its columns of `A`, so
/// observations span a range of volumes and every volume bin gets rows.
pub fn generate(config: &SyntheticConfig) -> Result<ProblemInstance> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let max_routes = config.max_routes.max(1);

    let block_sizes: Vec<usize> = (0..config.blocks.max(1)).map(|_| rng.gen_range(1..=max_routes)).collect();
    let n: usize = block_sizes.iter().sum();

    let mut x_true = Vec::with_capacity(n);
    let mut demand = Vec::with_capacity(n);
    for &size in &block_sizes {
        let volume = rng.gen_range(10.0..1000.0);
        let w: Vec<f64> = (0..size).map(|_| rng.gen_range(0.05..1.0)).collect();
        let total: f64 = w.iter().sum();
        x_true.extend(w.iter().map(|v| v / total));
        demand.extend(std::iter::repeat(volume).take(size));
    }

    let m = config.links.max(1);
    let mut triplets = Vec::new();
    for i in 0..m {
        let mut any = false;
        for j in 0..n {
            if rng.gen_bool(config.density.clamp(0.0, 1.0)) {
                triplets.push((i, j, demand[j]));
                any = true;
            }
        }
        if !any {
            let j = rng.gen_range(0..n);
            triplets.push((i, j, demand[j]));
        }
    }
    let a = sparse::from_triplets(m, n, triplets);

    let mut b = vec![0.0; m];
    sparse::spmv(&a, &x_true, &mut b, 1.0, 0.0);
    if config.noise > 0.0 {
        for bi in b.iter_mut() {
            *bi *= 1.0 + rng.gen_range(-config.noise..config.noise);
        }
    }

    let basis = block_basis(&block_sizes);
    ProblemInstance::new(a, b, basis, block_sizes, x_true).context("Generated inconsistent problem")
}
