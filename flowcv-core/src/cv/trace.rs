//! Iteration traces recorded from solver checkpoints.

use std::time::{Duration, Instant};

use crate::solvers::Observer;

/// Checkpoints of one fold run, in recording order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationTrace {
    /// Iteration number of each entry
    pub iterations: Vec<usize>,

    /// Wall-clock time since the previous entry (or since recording started)
    pub durations: Vec<Duration>,

    /// Reduced-coordinate iterate of each entry
    pub states: Vec<Vec<f64>>,
}

impl IterationTrace {
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Cumulative elapsed seconds at each entry.
    pub fn cumulative_seconds(&self) -> Vec<f64> {
        self.durations
            .iter()
            .scan(0.0, |acc, d| {
                *acc += d.as_secs_f64();
                Some(*acc)
            })
            .collect()
    }

    pub fn total_time(&self) -> Duration {
        self.durations.iter().sum()
    }

    pub fn last_iteration(&self) -> Option<usize> {
        self.iterations.last().copied()
    }
}

/// Observer that builds an [`IterationTrace`].
///
/// Owns the clock: each checkpoint stores the time elapsed since the
/// previous one, and the baseline is reset after the state is copied, so
/// recording overhead is not charged to the solver.
#[derive(Debug)]
pub struct TraceRecorder {
    trace: IterationTrace,
    mark: Instant,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self { trace: IterationTrace::default(), mark: Instant::now() }
    }

    pub fn len(&self) -> usize {
        self.trace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace.is_empty()
    }

    pub fn finish(self) -> IterationTrace {
        self.trace
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for TraceRecorder {
    fn checkpoint(&mut self, iteration: usize, state: &[f64]) {
        let elapsed = self.mark.elapsed();
        self.trace.iterations.push(iteration);
        self.trace.durations.push(elapsed);
        self.trace.states.push(state.to_vec());
        self.mark = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_collects_entries_in_order() {
        let mut rec = TraceRecorder::new();
        rec.checkpoint(0, &[1.0, 2.0]);
        rec.checkpoint(5, &[3.0, 4.0]);
        assert_eq!(rec.len(), 2);

        let trace = rec.finish();
        assert_eq!(trace.iterations, vec![0, 5]);
        assert_eq!(trace.states[1], vec![3.0, 4.0]);
        assert_eq!(trace.durations.len(), 2);
        assert_eq!(trace.last_iteration(), Some(5));
    }

    #[test]
    fn test_cumulative_seconds() {
        let trace = IterationTrace {
            iterations: vec![0, 1, 2],
            durations: vec![Duration::from_millis(500), Duration::from_millis(250), Duration::from_millis(250)],
            states: vec![vec![]; 3],
        };
        let cum = trace.cumulative_seconds();
        assert!((cum[0] - 0.5).abs() < 1e-12);
        assert!((cum[2] - 1.0).abs() < 1e-12);
        assert_eq!(trace.total_time(), Duration::from_secs(1));
    }
}
