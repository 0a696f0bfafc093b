//! Tuple store contract consumed by the resolvers.
//!
//! The engine needs exactly two read operations from a store. Both return a
//! lazily-consumed stream so high-fan-out objects never force the whole
//! userset into memory; each call produces a fresh, finite stream. Writes
//! belong to the store implementation, not this contract — the engine is
//! read-only over tuples.

use async_trait::async_trait;

use futures::stream::BoxStream;

use crate::error::DomainResult;
use crate::model::{ObjectRef, SubjectRef, Tuple};

/// A finite stream of tuples. Store faults surface as `Err` items and are
/// reported to the caller as [`crate::error::DomainError::StoreUnavailable`];
/// the engine never retries.
pub type TupleStream = BoxStream<'static, DomainResult<Tuple>>;

/// Filter for reading tuples. At least one field must be set.
#[derive(Debug, Clone, Default)]
pub struct TupleFilter {
    /// Filter by object type.
    pub object_type: Option<String>,
    /// Filter by object ID.
    pub object_id: Option<String>,
    /// Filter by relation.
    pub relation: Option<String>,
    /// Filter by subject.
    pub subject: Option<SubjectRef>,
}

impl TupleFilter {
    /// A filter matching every tuple whose object has the given type.
    pub fn objects_of_type(object_type: impl Into<String>) -> Self {
        Self {
            object_type: Some(object_type.into()),
            ..Self::default()
        }
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.object_type.is_none()
            && self.object_id.is_none()
            && self.relation.is_none()
            && self.subject.is_none()
    }

    /// Whether a tuple matches every set field.
    pub fn matches(&self, tuple: &Tuple) -> bool {
        self.object_type
            .as_ref()
            .map_or(true, |t| tuple.object.type_name == *t)
            && self
                .object_id
                .as_ref()
                .map_or(true, |id| tuple.object.id == *id)
            && self.relation.as_ref().map_or(true, |r| tuple.relation == *r)
            && self.subject.as_ref().map_or(true, |s| tuple.subject == *s)
    }
}

/// Abstract read contract over stored relationship facts.
///
/// Implementations must be thread-safe; the engine shares one store across
/// concurrent queries and never locks it.
#[async_trait]
pub trait TupleStore: Send + Sync {
    /// Reads tuples matching the filter. Implementations must reject an
    /// empty filter with [`crate::error::DomainError::InvalidFilter`].
    async fn read(&self, filter: &TupleFilter) -> DomainResult<TupleStream>;

    /// Reads the tuples of a single (object, relation) pair. This is the
    /// hot path for direct and indirect rewrite nodes.
    async fn read_userset(&self, object: &ObjectRef, relation: &str) -> DomainResult<TupleStream>;
}
