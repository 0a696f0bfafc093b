//! Configuration for the resolvers.

use std::time::Duration;

/// Configuration for the resolvers.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum recursion depth for rewrite evaluation. Exhausting the
    /// budget yields an indeterminate branch, never a hang.
    pub max_depth: u32,
    /// Default per-query deadline; requests may override it.
    pub timeout: Duration,
    /// Cap on candidates enumerated by the list resolvers before the
    /// per-candidate checks run.
    pub max_candidates: usize,
    /// Concurrency width for branch fan-out and list filtering.
    pub fan_out: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 25,
            timeout: Duration::from_secs(30),
            max_candidates: 1000,
            fan_out: 50,
        }
    }
}

impl ResolverConfig {
    /// Sets the maximum recursion depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the default query deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the list-candidate cap.
    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    /// Sets the concurrent fan-out width.
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }
}
