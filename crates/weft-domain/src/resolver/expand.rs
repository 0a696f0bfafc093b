//! Expand resolver: materializes the userset tree behind a relation.
//!
//! The tree mirrors the relation's rewrite expression with leaves holding
//! the subjects found at query time, so a caller can see why a check
//! resolves the way it does. Delegations and indirections are followed;
//! a branch cut off by the cycle or depth guard appears as an explicit
//! [`ExpandNode::Truncated`] node rather than being silently dropped.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::future::{try_join, try_join_all};
use futures::TryStreamExt;
use tokio::time::timeout;
use tracing::warn;

use crate::error::{DomainError, DomainResult};
use crate::model::{ObjectRef, RelationId, RewriteNode, SubjectRef};
use crate::store::TupleStore;

use super::types::{ExpandNode, ExpandRequest, UsersetTree};
use super::{subject_type_allowed, BoxFuture, Resolver};

/// Per-query expansion state. Subjects play no role here, so the visited
/// set is keyed by (relation, object) alone.
#[derive(Debug, Clone)]
struct ExpandContext {
    remaining_depth: u32,
    visited: Arc<HashSet<(RelationId, ObjectRef)>>,
}

impl ExpandContext {
    fn new(max_depth: u32) -> Self {
        Self {
            remaining_depth: max_depth,
            visited: Arc::new(HashSet::new()),
        }
    }

    fn descend(&self) -> Self {
        Self {
            remaining_depth: self.remaining_depth.saturating_sub(1),
            visited: Arc::clone(&self.visited),
        }
    }

    fn with_visited(&self, key: (RelationId, ObjectRef)) -> Self {
        let mut visited = (*self.visited).clone();
        visited.insert(key);
        Self {
            remaining_depth: self.remaining_depth,
            visited: Arc::new(visited),
        }
    }
}

impl<S> Resolver<S>
where
    S: TupleStore + 'static,
{
    /// Expands a relation on an object into its full userset tree.
    pub async fn expand(&self, request: &ExpandRequest) -> DomainResult<UsersetTree> {
        let relation = self.resolve_relation(&request.object, &request.relation)?;
        let ctx = ExpandContext::new(self.config.max_depth);

        let expansion = self.expand_relation(relation, &request.object, ctx);
        let root = match timeout(self.config.timeout, expansion).await {
            Ok(root) => root?,
            Err(_) => {
                return Err(DomainError::DeadlineExceeded {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                })
            }
        };

        Ok(UsersetTree { root })
    }

    fn expand_relation<'a>(
        &'a self,
        relation: RelationId,
        object: &'a ObjectRef,
        ctx: ExpandContext,
    ) -> BoxFuture<'a, DomainResult<ExpandNode>> {
        Box::pin(async move {
            let userset = self.userset_name(relation, object);

            if ctx.remaining_depth == 0 {
                self.metrics.depth_exhausted.fetch_add(1, Ordering::Relaxed);
                warn!(userset = %userset, "depth budget exhausted, truncating expansion");
                return Ok(ExpandNode::Truncated { userset });
            }
            let key = (relation, object.clone());
            if ctx.visited.contains(&key) {
                self.metrics.cycles_detected.fetch_add(1, Ordering::Relaxed);
                return Ok(ExpandNode::Truncated { userset });
            }
            let ctx = ctx.with_visited(key);

            let rewrite = &self.model.relation(relation).rewrite;
            self.expand_rewrite(rewrite, relation, object, ctx).await
        })
    }

    fn expand_rewrite<'a>(
        &'a self,
        node: &'a RewriteNode,
        relation: RelationId,
        object: &'a ObjectRef,
        ctx: ExpandContext,
    ) -> BoxFuture<'a, DomainResult<ExpandNode>> {
        Box::pin(async move {
            let userset = self.userset_name(relation, object);
            match node {
                RewriteNode::Direct => {
                    let definition = self.model.relation(relation);
                    let mut tuples = self.store.read_userset(object, &definition.name).await?;
                    let mut subjects = Vec::new();
                    while let Some(tuple) = tuples.try_next().await? {
                        if definition.subject_types.is_empty()
                            || subject_type_allowed(&tuple.subject, &definition.subject_types)
                        {
                            subjects.push(tuple.subject);
                        }
                    }
                    subjects.sort();
                    subjects.dedup();
                    Ok(ExpandNode::Leaf { userset, subjects })
                }

                RewriteNode::Computed { relation: target } => {
                    let tree = self.expand_relation(*target, object, ctx.descend()).await?;
                    Ok(ExpandNode::Computed {
                        userset,
                        tree: Box::new(tree),
                    })
                }

                RewriteNode::TupleToUserset { tupleset, target } => {
                    let tupleset_name = self.model.relation(*tupleset).name.clone();
                    let mut links = self.store.read_userset(object, &tupleset_name).await?;
                    let mut children = Vec::new();
                    while let Some(tuple) = links.try_next().await? {
                        let SubjectRef::Object(via) = tuple.subject else {
                            continue;
                        };
                        let Some(target_relation) = self.model.resolve(&via.type_name, target)
                        else {
                            continue;
                        };
                        let child = self
                            .expand_relation(target_relation, &via, ctx.descend())
                            .await?;
                        children.push(child);
                    }
                    Ok(ExpandNode::TupleToUserset {
                        userset,
                        tupleset: tupleset_name,
                        children,
                    })
                }

                RewriteNode::Union { children } => {
                    let children = try_join_all(children.iter().map(|child| {
                        self.expand_rewrite(child, relation, object, ctx.descend())
                    }))
                    .await?;
                    Ok(ExpandNode::Union { userset, children })
                }

                RewriteNode::Intersection { children } => {
                    let children = try_join_all(children.iter().map(|child| {
                        self.expand_rewrite(child, relation, object, ctx.descend())
                    }))
                    .await?;
                    Ok(ExpandNode::Intersection { userset, children })
                }

                RewriteNode::Exclusion { base, subtract } => {
                    let (base, subtract) = try_join(
                        self.expand_rewrite(base, relation, object, ctx.descend()),
                        self.expand_rewrite(subtract, relation, object, ctx.descend()),
                    )
                    .await?;
                    Ok(ExpandNode::Difference {
                        userset,
                        base: Box::new(base),
                        subtract: Box::new(subtract),
                    })
                }
            }
        })
    }

    fn userset_name(&self, relation: RelationId, object: &ObjectRef) -> String {
        format!("{}#{}", object, self.model.relation(relation).name)
    }
}
