//! Fixed-capacity curvature-pair history for L-BFGS.
//!
//! Stores the `m` most recent `(s, y, ρ)` triples in a ring buffer. Slots are
//! allocated once and overwritten in place; pushing into a full buffer
//! evicts the oldest pair.

/// One curvature pair with ρ = 1 / (yᵀs).
#[derive(Debug, Clone, PartialEq)]
pub struct CurvaturePair {
    pub s: Vec<f64>,
    pub y: Vec<f64>,
    pub rho: f64,
}

#[derive(Debug, Clone)]
pub struct CurvatureHistory {
    slots: Vec<CurvaturePair>,
    capacity: usize,
    /// Index of the oldest pair
    head: usize,
    len: usize,
}

impl CurvatureHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a pair, evicting the oldest one when full.
    pub fn push(&mut self, pair: CurvaturePair) {
        if self.capacity == 0 {
            return;
        }

        if self.slots.len() < self.capacity {
            self.slots.push(pair);
            self.len += 1;
            return;
        }

        let slot = &mut self.slots[self.head];
        if slot.s.len() == pair.s.len() {
            slot.s.copy_from_slice(&pair.s);
            slot.y.copy_from_slice(&pair.y);
            slot.rho = pair.rho;
        } else {
            *slot = pair;
        }
        self.head = (self.head + 1) % self.capacity;
    }

    /// Pair at logical position `k` (0 = oldest).
    pub fn get(&self, k: usize) -> &CurvaturePair {
        debug_assert!(k < self.len);
        &self.slots[(self.head + k) % self.capacity]
    }

    /// Pairs from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &CurvaturePair> + ExactSizeIterator + '_ {
        (0..self.len).map(move |k| self.get(k))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
        self.len = 0;
    }
}
