//! In-memory tuple store.
//!
//! Tuples live in a concurrent map keyed by (object, relation), so the
//! engine's hot path — reading one userset — is a single map lookup, and
//! writes and deletes are O(1) set operations. Filtered reads scan the
//! whole map.
//!
//! Writes are owned by this implementation, not by the store contract:
//! the engine only ever reads.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream;
use tracing::instrument;

use weft_domain::error::{DomainError, DomainResult};
use weft_domain::model::{ObjectRef, Tuple};
use weft_domain::store::{TupleFilter, TupleStore, TupleStream};

/// In-memory implementation of [`TupleStore`].
///
/// # Performance characteristics
///
/// - **Write / delete**: O(1) average (set insert/remove under one shard lock)
/// - **Read userset**: O(K) where K is the userset size (snapshot + stream)
/// - **Filtered read**: O(N) over all tuples
#[derive(Debug, Default)]
pub struct MemoryTupleStore {
    usersets: DashMap<(ObjectRef, String), HashSet<Tuple>>,
}

impl MemoryTupleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Writes a tuple. Idempotent: writing an existing tuple is a no-op.
    #[instrument(skip(self, tuple), fields(tuple = %tuple))]
    pub fn write(&self, tuple: Tuple) {
        self.usersets
            .entry((tuple.object.clone(), tuple.relation.clone()))
            .or_default()
            .insert(tuple);
    }

    /// Deletes a tuple. Returns whether it was present.
    #[instrument(skip(self, tuple), fields(tuple = %tuple))]
    pub fn delete(&self, tuple: &Tuple) -> bool {
        match self
            .usersets
            .get_mut(&(tuple.object.clone(), tuple.relation.clone()))
        {
            Some(mut userset) => userset.remove(tuple),
            None => false,
        }
    }

    /// Total number of stored tuples.
    pub fn len(&self) -> usize {
        self.usersets.iter().map(|entry| entry.value().len()).sum()
    }

    /// Whether the store holds no tuples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TupleStore for MemoryTupleStore {
    async fn read(&self, filter: &TupleFilter) -> DomainResult<TupleStream> {
        if filter.is_empty() {
            return Err(DomainError::InvalidFilter {
                message: "at least one filter field must be set".to_string(),
            });
        }
        // Snapshot matching tuples so the stream does not hold shard locks.
        let matches: Vec<Tuple> = self
            .usersets
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|tuple| filter.matches(tuple))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok(Box::pin(stream::iter(matches.into_iter().map(Ok))))
    }

    async fn read_userset(&self, object: &ObjectRef, relation: &str) -> DomainResult<TupleStream> {
        let matches: Vec<Tuple> = self
            .usersets
            .get(&(object.clone(), relation.to_string()))
            .map(|userset| userset.iter().cloned().collect())
            .unwrap_or_default();
        Ok(Box::pin(stream::iter(matches.into_iter().map(Ok))))
    }
}
