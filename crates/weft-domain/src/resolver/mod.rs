//! Rewrite-rule evaluation engine.
//!
//! The resolver answers Check, Expand, and List queries by recursive
//! traversal of a compiled rewrite graph against a tuple store.
//!
//! # Design
//!
//! - **Tri-state evaluation**: every rewrite node resolves to a
//!   [`Decision`]. Branches cut off by the cycle or depth guard are
//!   `Indeterminate`, which collapses to a negative answer at the API
//!   boundary while staying visible in [`ResolverMetrics`]. Errors are
//!   reserved for store faults and deadlines.
//! - **Cycle breaking**: a per-query visited set keyed by
//!   (relation, subject, object) guarantees termination on any rewrite
//!   graph, including deliberately recursive ones.
//! - **Parallel branches**: union and intersection children, and
//!   indirection fan-out, evaluate concurrently with short-circuiting.
//!   Returning early drops the branch set, which cancels still-running
//!   siblings along with their in-flight store reads.
//! - **Deadlines**: the whole query runs under a deadline; exceeding it is
//!   a distinct error, never a silent negative.

mod config;
mod context;
mod expand;
mod list;
mod metrics;
mod types;

#[cfg(test)]
mod tests;

pub use config::ResolverConfig;
pub use metrics::{MetricsSnapshot, ResolverMetrics};
pub use types::{
    CheckRequest, CheckResult, Decision, ExpandNode, ExpandRequest, ListObjectsRequest,
    ListSubjectsRequest, ObjectStream, SubjectStream, UsersetTree,
};

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::TryStreamExt;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{DomainError, DomainResult};
use crate::model::{
    CompiledModel, ObjectRef, RelationId, RewriteNode, SubjectRef, SubjectTypeRestriction,
};
use crate::store::TupleStore;

use context::{ResolutionContext, VisitKey};

/// Type alias for boxed futures, needed for async recursion.
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Resolves queries against one compiled model and one tuple store.
///
/// The model is immutable and shared; per-query state lives in a
/// [`ResolutionContext`] that is discarded when the query completes, so
/// identical queries against an identical store snapshot always resolve to
/// the same answer.
pub struct Resolver<S> {
    model: Arc<CompiledModel>,
    store: Arc<S>,
    config: ResolverConfig,
    metrics: ResolverMetrics,
}

impl<S> Resolver<S>
where
    S: TupleStore + 'static,
{
    /// Creates a resolver with the default configuration.
    pub fn new(model: Arc<CompiledModel>, store: Arc<S>) -> Self {
        Self::with_config(model, store, ResolverConfig::default())
    }

    /// Creates a resolver with a custom configuration.
    pub fn with_config(model: Arc<CompiledModel>, store: Arc<S>, config: ResolverConfig) -> Self {
        Self {
            model,
            store,
            config,
            metrics: ResolverMetrics::default(),
        }
    }

    /// The compiled model this resolver serves.
    pub fn model(&self) -> &CompiledModel {
        &self.model
    }

    /// Guard-event counters for this resolver.
    pub fn metrics(&self) -> &ResolverMetrics {
        &self.metrics
    }

    /// Answers whether the subject holds the relation on the object.
    ///
    /// An indeterminate outcome (cycle or depth truncation) is a negative
    /// answer; a deadline or store fault is an error, so callers can never
    /// mistake "timed out" for "denied".
    pub async fn check(&self, request: &CheckRequest) -> DomainResult<CheckResult> {
        let relation = self.resolve_relation(&request.object, &request.relation)?;
        let budget = request.timeout.unwrap_or(self.config.timeout);
        let ctx = ResolutionContext::new(self.config.max_depth, budget);

        let evaluation = self.evaluate_relation(relation, &request.subject, &request.object, ctx);
        let decision = match timeout(budget, evaluation).await {
            Ok(decision) => decision?,
            Err(_) => {
                return Err(DomainError::DeadlineExceeded {
                    timeout_ms: budget.as_millis() as u64,
                })
            }
        };

        if decision == Decision::Indeterminate {
            self.metrics
                .indeterminate_results
                .fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            subject = %request.subject,
            relation = %request.relation,
            object = %request.object,
            ?decision,
            "check resolved"
        );
        Ok(CheckResult {
            allowed: decision.holds(),
        })
    }

    /// Resolves a relation name against the object's type.
    fn resolve_relation(&self, object: &ObjectRef, relation: &str) -> DomainResult<RelationId> {
        let type_id =
            self.model
                .type_id(&object.type_name)
                .ok_or_else(|| DomainError::UnknownType {
                    type_name: object.type_name.clone(),
                })?;
        self.model
            .relation_id(type_id, relation)
            .ok_or_else(|| DomainError::UnknownRelation {
                type_name: object.type_name.clone(),
                relation: relation.to_string(),
            })
    }

    /// Evaluates a relation for one (subject, object) pair, applying the
    /// depth and cycle guards before touching the rewrite (boxed for
    /// recursion).
    fn evaluate_relation<'a>(
        &'a self,
        relation: RelationId,
        subject: &'a SubjectRef,
        object: &'a ObjectRef,
        ctx: ResolutionContext,
    ) -> BoxFuture<'a, DomainResult<Decision>> {
        Box::pin(async move {
            ctx.check_deadline()?;

            if ctx.exhausted() {
                self.metrics.depth_exhausted.fetch_add(1, Ordering::Relaxed);
                warn!(
                    relation = %self.model.relation(relation).name,
                    object = %object,
                    "depth budget exhausted, branch is indeterminate"
                );
                return Ok(Decision::Indeterminate);
            }

            let key = VisitKey {
                relation,
                subject: subject.clone(),
                object: object.clone(),
            };
            if ctx.visited.contains(&key) {
                self.metrics.cycles_detected.fetch_add(1, Ordering::Relaxed);
                return Ok(Decision::Indeterminate);
            }
            let ctx = ctx.with_visited(key);

            let rewrite = &self.model.relation(relation).rewrite;
            self.evaluate_rewrite(rewrite, relation, subject, object, ctx)
                .await
        })
    }

    /// Dispatches on the rewrite node kind (boxed for recursion).
    fn evaluate_rewrite<'a>(
        &'a self,
        node: &'a RewriteNode,
        relation: RelationId,
        subject: &'a SubjectRef,
        object: &'a ObjectRef,
        ctx: ResolutionContext,
    ) -> BoxFuture<'a, DomainResult<Decision>> {
        Box::pin(async move {
            match node {
                RewriteNode::Direct => self.evaluate_direct(relation, subject, object, ctx).await,

                RewriteNode::Computed { relation: target } => {
                    self.evaluate_relation(*target, subject, object, ctx.descend())
                        .await
                }

                RewriteNode::TupleToUserset { tupleset, target } => {
                    self.evaluate_tuple_to_userset(*tupleset, target, subject, object, ctx)
                        .await
                }

                RewriteNode::Union { children } => {
                    self.evaluate_union(children, relation, subject, object, ctx)
                        .await
                }

                RewriteNode::Intersection { children } => {
                    self.evaluate_intersection(children, relation, subject, object, ctx)
                        .await
                }

                RewriteNode::Exclusion { base, subtract } => {
                    self.evaluate_exclusion(base, subtract, relation, subject, object, ctx)
                        .await
                }
            }
        })
    }

    /// Direct assignment: scan the stored userset for a matching subject.
    ///
    /// A userset-typed tuple subject ("role:mods#has_role") matches if the
    /// requested subject is a member of that userset; the membership check
    /// goes through the same guards as a top-level query.
    async fn evaluate_direct(
        &self,
        relation: RelationId,
        subject: &SubjectRef,
        object: &ObjectRef,
        ctx: ResolutionContext,
    ) -> DomainResult<Decision> {
        let definition = self.model.relation(relation);
        let mut tuples = self.store.read_userset(object, &definition.name).await?;

        let mut indeterminate = false;
        while let Some(tuple) = tuples.try_next().await? {
            if !definition.subject_types.is_empty()
                && !subject_type_allowed(&tuple.subject, &definition.subject_types)
            {
                continue;
            }

            if tuple.subject == *subject {
                return Ok(Decision::Holds);
            }

            if let SubjectRef::Userset {
                object: via,
                relation: member_relation,
            } = &tuple.subject
            {
                let Some(member_relation) = self.model.resolve(&via.type_name, member_relation)
                else {
                    continue;
                };
                match self
                    .evaluate_relation(member_relation, subject, via, ctx.descend())
                    .await?
                {
                    Decision::Holds => return Ok(Decision::Holds),
                    Decision::Indeterminate => indeterminate = true,
                    Decision::NotHolds => {}
                }
            }
        }

        Ok(if indeterminate {
            Decision::Indeterminate
        } else {
            Decision::NotHolds
        })
    }

    /// Indirection: resolve the target relation on every object linked
    /// through the tupleset, short-circuiting on the first hit. Linked
    /// objects are checked concurrently; dropping the stream cancels the
    /// rest.
    async fn evaluate_tuple_to_userset(
        &self,
        tupleset: RelationId,
        target: &str,
        subject: &SubjectRef,
        object: &ObjectRef,
        ctx: ResolutionContext,
    ) -> DomainResult<Decision> {
        let tupleset_name = &self.model.relation(tupleset).name;
        let links = self.store.read_userset(object, tupleset_name).await?;

        let mut checks = links
            .map(|link| {
                let ctx = ctx.descend();
                async move {
                    let tuple = link?;
                    // Only concrete objects can act as linking objects.
                    let SubjectRef::Object(via) = tuple.subject else {
                        return Ok(Decision::NotHolds);
                    };
                    let Some(target_relation) = self.model.resolve(&via.type_name, target) else {
                        return Ok(Decision::NotHolds);
                    };
                    self.evaluate_relation(target_relation, subject, &via, ctx)
                        .await
                }
            })
            .buffer_unordered(self.config.fan_out);

        let mut indeterminate = false;
        while let Some(result) = checks.next().await {
            match result? {
                Decision::Holds => return Ok(Decision::Holds),
                Decision::Indeterminate => indeterminate = true,
                Decision::NotHolds => {}
            }
        }

        Ok(if indeterminate {
            Decision::Indeterminate
        } else {
            Decision::NotHolds
        })
    }

    /// Union: holds if any child holds; not-holds only if every child
    /// definitively does not.
    async fn evaluate_union(
        &self,
        children: &[RewriteNode],
        relation: RelationId,
        subject: &SubjectRef,
        object: &ObjectRef,
        ctx: ResolutionContext,
    ) -> DomainResult<Decision> {
        let mut branches: FuturesUnordered<_> = children
            .iter()
            .map(|child| self.evaluate_rewrite(child, relation, subject, object, ctx.descend()))
            .collect();

        let mut indeterminate = false;
        let mut pending_error: Option<DomainError> = None;
        while let Some(result) = branches.next().await {
            match result {
                // Short-circuit; dropping `branches` cancels the siblings.
                Ok(Decision::Holds) => return Ok(Decision::Holds),
                Ok(Decision::Indeterminate) => indeterminate = true,
                Ok(Decision::NotHolds) => {}
                // A sibling may still prove access; fail only once none did.
                Err(e) => pending_error = Some(e),
            }
        }

        if let Some(e) = pending_error {
            return Err(e);
        }
        Ok(if indeterminate {
            Decision::Indeterminate
        } else {
            Decision::NotHolds
        })
    }

    /// Intersection: not-holds as soon as any child definitively fails;
    /// holds only if every child holds.
    async fn evaluate_intersection(
        &self,
        children: &[RewriteNode],
        relation: RelationId,
        subject: &SubjectRef,
        object: &ObjectRef,
        ctx: ResolutionContext,
    ) -> DomainResult<Decision> {
        let mut branches: FuturesUnordered<_> = children
            .iter()
            .map(|child| self.evaluate_rewrite(child, relation, subject, object, ctx.descend()))
            .collect();

        let mut indeterminate = false;
        while let Some(result) = branches.next().await {
            match result? {
                // Short-circuit; dropping `branches` cancels the siblings.
                Decision::NotHolds => return Ok(Decision::NotHolds),
                Decision::Indeterminate => indeterminate = true,
                Decision::Holds => {}
            }
        }

        Ok(if indeterminate {
            Decision::Indeterminate
        } else {
            Decision::Holds
        })
    }

    /// Exclusion: base first; a failed base makes subtract irrelevant.
    /// An indeterminate subtract can never grant access.
    async fn evaluate_exclusion(
        &self,
        base: &RewriteNode,
        subtract: &RewriteNode,
        relation: RelationId,
        subject: &SubjectRef,
        object: &ObjectRef,
        ctx: ResolutionContext,
    ) -> DomainResult<Decision> {
        let base_decision = self
            .evaluate_rewrite(base, relation, subject, object, ctx.descend())
            .await?;
        if base_decision == Decision::NotHolds {
            return Ok(Decision::NotHolds);
        }

        let subtract_decision = self
            .evaluate_rewrite(subtract, relation, subject, object, ctx.descend())
            .await?;
        Ok(match (base_decision, subtract_decision) {
            (_, Decision::Holds) => Decision::NotHolds,
            (Decision::Holds, Decision::NotHolds) => Decision::Holds,
            _ => Decision::Indeterminate,
        })
    }
}

/// Whether a tuple subject is of a type the relation accepts for direct
/// assignment.
fn subject_type_allowed(subject: &SubjectRef, restrictions: &[SubjectTypeRestriction]) -> bool {
    restrictions.iter().any(|restriction| match subject {
        SubjectRef::Object(object) => {
            restriction.relation.is_none() && restriction.type_name == object.type_name
        }
        SubjectRef::Userset { object, relation } => {
            restriction.relation.as_deref() == Some(relation.as_str())
                && restriction.type_name == object.type_name
        }
    })
}
