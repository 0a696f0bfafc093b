//! Per-query resolution state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{DomainError, DomainResult};
use crate::model::{ObjectRef, RelationId, SubjectRef};

/// Identity of an evaluation step, used for cycle breaking. Keyed by the
/// full (relation, subject, object) triple: the same relation/object pair
/// may legitimately recur under a different subject during userset
/// membership checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct VisitKey {
    pub(crate) relation: RelationId,
    pub(crate) subject: SubjectRef,
    pub(crate) object: ObjectRef,
}

/// Mutable state owned by a single query: visited set, remaining depth
/// budget, and deadline. Never shared across queries.
#[derive(Debug, Clone)]
pub(crate) struct ResolutionContext {
    pub(crate) remaining_depth: u32,
    /// Wrapped in Arc for cheap cloning; cloned copy-on-write when a key
    /// is added.
    pub(crate) visited: Arc<HashSet<VisitKey>>,
    deadline: Instant,
    timeout: Duration,
}

impl ResolutionContext {
    pub(crate) fn new(max_depth: u32, timeout: Duration) -> Self {
        Self {
            remaining_depth: max_depth,
            visited: Arc::new(HashSet::new()),
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Spends one level of the depth budget.
    pub(crate) fn descend(&self) -> Self {
        Self {
            remaining_depth: self.remaining_depth.saturating_sub(1),
            visited: Arc::clone(&self.visited),
            deadline: self.deadline,
            timeout: self.timeout,
        }
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.remaining_depth == 0
    }

    pub(crate) fn with_visited(&self, key: VisitKey) -> Self {
        let mut visited = (*self.visited).clone();
        visited.insert(key);
        Self {
            remaining_depth: self.remaining_depth,
            visited: Arc::new(visited),
            deadline: self.deadline,
            timeout: self.timeout,
        }
    }

    /// Errors out once the query deadline has passed, so deep traversals
    /// stop between store calls instead of running to completion.
    pub(crate) fn check_deadline(&self) -> DomainResult<()> {
        if Instant::now() >= self.deadline {
            Err(DomainError::DeadlineExceeded {
                timeout_ms: self.timeout.as_millis() as u64,
            })
        } else {
            Ok(())
        }
    }
}
