//! Block-simplex projection.
//!
//! The full solution is partitioned into contiguous blocks, each constrained
//! to the probability simplex `{x ≥ 0, Σ x = 1}`. In reduced coordinates a
//! block of size `k` owns `k - 1` entries `z_b`, with the block's last entry
//! implied as `1 - Σ z_b` (see [`crate::problem::block_basis`]). Projection
//! lifts each block to full space, projects there, and maps back.

use super::Projection;

/// Euclidean projection of `v` onto `{x ≥ 0, Σ x = mass}`, in place.
///
/// Sort-based threshold algorithm, O(k log k).
pub fn project_simplex(v: &mut [f64], mass: f64) {
    if v.is_empty() {
        return;
    }

    let mut sorted = v.to_vec();
    sorted.sort_unstable_by(|a, b| b.total_cmp(a));

    let mut cumsum = 0.0;
    let mut theta = 0.0;
    for (j, &u) in sorted.iter().enumerate() {
        cumsum += u;
        let candidate = (cumsum - mass) / (j + 1) as f64;
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }

    for vi in v.iter_mut() {
        *vi = (*vi - theta).max(0.0);
    }
}

/// Projection onto the block simplex, expressed in reduced coordinates.
#[derive(Debug, Clone)]
pub struct SimplexBlocks {
    /// Reduced size of each block (full size minus one)
    reduced_sizes: Vec<usize>,
}

impl SimplexBlocks {
    /// Build from the full block sizes of the problem.
    pub fn new(block_sizes: &[usize]) -> Self {
        Self {
            reduced_sizes: block_sizes.iter().map(|&s| s.saturating_sub(1)).collect(),
        }
    }

    /// Total reduced dimension.
    pub fn dim(&self) -> usize {
        self.reduced_sizes.iter().sum()
    }
}

impl Projection for SimplexBlocks {
    fn project(&self, z: &mut [f64]) {
        debug_assert_eq!(z.len(), self.dim());

        let mut full = Vec::new();
        let mut start = 0;
        for &size in &self.reduced_sizes {
            if size == 0 {
                continue;
            }
            let block = &mut z[start..start + size];

            full.clear();
            full.extend_from_slice(block);
            full.push(1.0 - block.iter().sum::<f64>());
            project_simplex(&mut full, 1.0);
            block.copy_from_slice(&full[..size]);

            start += size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_simplex_interior_point_unchanged() {
        let mut v = vec![0.2, 0.3, 0.5];
        project_simplex(&mut v, 1.0);
        assert!((v[0] - 0.2).abs() < 1e-15);
        assert!((v[1] - 0.3).abs() < 1e-15);
        assert!((v[2] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_simplex_known_projection() {
        // (2, 0) projects to the vertex (1, 0)
        let mut v = vec![2.0, 0.0];
        project_simplex(&mut v, 1.0);
        assert_eq!(v, vec![1.0, 0.0]);

        // (1, 1) projects to the midpoint
        let mut v = vec![1.0, 1.0];
        project_simplex(&mut v, 1.0);
        assert!((v[0] - 0.5).abs() < 1e-15);
        assert!((v[1] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_simplex_mass_conservation_random() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let k = rng.gen_range(1..12);
            let mass = rng.gen_range(0.1..5.0);
            let mut v: Vec<f64> = (0..k).map(|_| rng.gen_range(-3.0..3.0)).collect();
            project_simplex(&mut v, mass);

            let sum: f64 = v.iter().sum();
            assert!((sum - mass).abs() < 1e-10, "sum {} != mass {}", sum, mass);
            assert!(v.iter().all(|&x| x >= 0.0));
        }
    }

    #[test]
    fn test_blocks_idempotent_and_feasible() {
        let proj = SimplexBlocks::new(&[3, 1, 4, 2]);
        assert_eq!(proj.dim(), 6);

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..100 {
            let mut z: Vec<f64> = (0..6).map(|_| rng.gen_range(-2.0..2.0)).collect();
            proj.project(&mut z);
            assert_eq!(z.len(), 6);

            // Lifted blocks are non-negative with unit mass
            for block in [&z[0..2], &z[2..5], &z[5..6]] {
                assert!(block.iter().all(|&x| x >= 0.0));
                assert!(block.iter().sum::<f64>() <= 1.0 + 1e-12);
            }

            let again = proj.projected(&z);
            for (a, b) in z.iter().zip(again.iter()) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }
}
