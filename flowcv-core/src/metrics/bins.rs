//! Volume bins over the observation vector.

/// Equally spaced histogram edges over the range of `b`.
///
/// Observations are assigned like `numpy.digitize`: group `j` (0-based)
/// holds values with `edges[j] ≤ v < edges[j + 1]`, and the extra group
/// `nbins` holds values at or above the last edge (in practice the maximum
/// of `b`). Values below the first edge belong to no group.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeBins {
    edges: Vec<f64>,
}

impl VolumeBins {
    pub fn new(b: &[f64], nbins: usize) -> Self {
        let nbins = nbins.max(1);
        let (mut lo, mut hi) = b
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if lo > hi {
            lo = 0.0;
            hi = 1.0;
        } else if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / nbins as f64;
        let mut edges: Vec<f64> = (0..nbins).map(|i| lo + width * i as f64).collect();
        edges.push(hi);
        Self { edges }
    }

    /// Build from explicit edges (must be non-decreasing).
    pub fn from_edges(edges: Vec<f64>) -> Self {
        debug_assert!(edges.windows(2).all(|w| w[0] <= w[1]));
        Self { edges }
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of reported groups (`nbins + 1`).
    pub fn num_groups(&self) -> usize {
        self.edges.len()
    }

    /// Group index of value `v`, if any.
    pub fn group(&self, v: f64) -> Option<usize> {
        if v.is_nan() {
            return None;
        }
        let j = self.edges.partition_point(|&e| e <= v);
        j.checked_sub(1)
    }

    /// Split `rows` by the group of `b[row]`.
    pub fn partition(&self, rows: &[usize], b: &[f64]) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.num_groups()];
        for &row in rows {
            if let Some(j) = self.group(b[row]) {
                groups[j].push(row);
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_match_histogram() {
        let bins = VolumeBins::new(&[0.0, 3.0, 6.0], 6);
        assert_eq!(bins.edges(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(bins.num_groups(), 7);
    }

    #[test]
    fn test_digitize_semantics() {
        let bins = VolumeBins::from_edges(vec![0.0, 1.0, 2.0]);
        assert_eq!(bins.group(-0.1), None);
        assert_eq!(bins.group(0.0), Some(0));
        assert_eq!(bins.group(0.99), Some(0));
        assert_eq!(bins.group(1.0), Some(1));
        // The maximum lands in the overflow group
        assert_eq!(bins.group(2.0), Some(2));
        assert_eq!(bins.group(f64::NAN), None);
    }

    #[test]
    fn test_constant_observations_are_widened() {
        let bins = VolumeBins::new(&[2.0, 2.0], 2);
        assert_eq!(bins.edges(), &[1.5, 2.0, 2.5]);
        assert_eq!(bins.group(2.0), Some(1));
    }

    #[test]
    fn test_partition() {
        let bins = VolumeBins::from_edges(vec![0.0, 1.0, 2.0]);
        let b = [0.5, 1.5, 2.0, 0.2];
        let groups = bins.partition(&[0, 1, 2, 3], &b);
        assert_eq!(groups, vec![vec![0, 3], vec![1], vec![2]]);
    }
}
