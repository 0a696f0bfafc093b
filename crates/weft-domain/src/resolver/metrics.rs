//! Counters for guard events during resolution.
//!
//! Cycle and depth truncation collapse to a negative answer at the API
//! boundary; these counters keep the events observable, since repeated
//! occurrences usually point at a modeling problem.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by a resolver across all queries it serves.
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    /// Evaluation steps cut off by the visited-set cycle guard.
    pub cycles_detected: AtomicU64,
    /// Evaluation steps cut off by the depth budget.
    pub depth_exhausted: AtomicU64,
    /// Queries whose overall decision was indeterminate and collapsed to
    /// a negative answer.
    pub indeterminate_results: AtomicU64,
}

impl ResolverMetrics {
    /// Returns a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_detected: self.cycles_detected.load(Ordering::Relaxed),
            depth_exhausted: self.depth_exhausted.load(Ordering::Relaxed),
            indeterminate_results: self.indeterminate_results.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of resolver metrics.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub cycles_detected: u64,
    pub depth_exhausted: u64,
    pub indeterminate_results: u64,
}
