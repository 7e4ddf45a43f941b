//! K-fold partitioning of observation indices.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{CvError, CvResult};

/// One train/test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Contiguous k-fold splitter.
///
/// Test sets are consecutive runs of the (optionally shuffled) index order;
/// the first `n mod k` folds hold one extra index. Index lists are sorted.
#[derive(Debug, Clone)]
pub struct KFold {
    n: usize,
    k: usize,
    seed: Option<u64>,
}

impl KFold {
    pub fn new(n: usize, k: usize) -> CvResult<Self> {
        if k < 2 {
            return Err(CvError::InvalidSettings(format!("k must be at least 2, got {}", k)));
        }
        if k > n {
            return Err(CvError::InvalidSettings(format!(
                "cannot split {} observations into {} folds",
                n, k
            )));
        }
        Ok(Self { n, k, seed: None })
    }

    /// Shuffle indices deterministically before splitting.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn num_folds(&self) -> usize {
        self.k
    }

    pub fn split(&self) -> Vec<Fold> {
        let mut order: Vec<usize> = (0..self.n).collect();
        if let Some(seed) = self.seed {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            order.shuffle(&mut rng);
        }

        let base = self.n / self.k;
        let extra = self.n % self.k;

        let mut folds = Vec::with_capacity(self.k);
        let mut start = 0;
        for i in 0..self.k {
            let size = base + usize::from(i < extra);
            let stop = start + size;

            let mut test = order[start..stop].to_vec();
            let mut train: Vec<usize> = order[..start].iter().chain(order[stop..].iter()).copied().collect();
            test.sort_unstable();
            train.sort_unstable();

            folds.push(Fold { train, test });
            start = stop;
        }
        folds
    }
}
