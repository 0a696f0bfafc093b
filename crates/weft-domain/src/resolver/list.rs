//! List resolvers: reverse queries over objects and subjects.
//!
//! Both directions share one shape: enumerate candidates from stored
//! tuples, then filter every candidate through the same evaluation that
//! answers Check — equivalence with Check is a tested property, not a
//! parallel implementation. Candidate enumeration is bounded up front;
//! the expensive per-candidate checks run concurrently and lazily, so a
//! caller that stops consuming the stream stops the remaining work.

use std::collections::HashSet;

use futures::future;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::{DomainError, DomainResult};
use crate::model::{ObjectRef, RelationId, RewriteNode, SubjectRef};
use crate::store::{TupleFilter, TupleStore};

use super::types::{CheckRequest, ListObjectsRequest, ListSubjectsRequest};
use super::{BoxFuture, ObjectStream, Resolver, SubjectStream};

impl<S> Resolver<S>
where
    S: TupleStore + 'static,
{
    /// Enumerates objects of a type the subject holds the relation to.
    ///
    /// Every object that can satisfy the relation appears in at least one
    /// stored tuple, so enumerating the type's tuples yields a complete
    /// candidate set (up to the configured cap).
    pub async fn list_objects(&self, request: &ListObjectsRequest) -> DomainResult<ObjectStream<'_>> {
        let type_id = self
            .model
            .type_id(&request.object_type)
            .ok_or_else(|| DomainError::UnknownType {
                type_name: request.object_type.clone(),
            })?;
        if self.model.relation_id(type_id, &request.relation).is_none() {
            return Err(DomainError::UnknownRelation {
                type_name: request.object_type.clone(),
                relation: request.relation.clone(),
            });
        }

        let filter = TupleFilter::objects_of_type(&request.object_type);
        let mut tuples = self.store.read(&filter).await?;
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        while let Some(tuple) = tuples.try_next().await? {
            if tuple.object.type_name == request.object_type && seen.insert(tuple.object.clone()) {
                candidates.push(tuple.object);
                if candidates.len() >= self.config.max_candidates {
                    break;
                }
            }
        }
        candidates.sort();

        let subject = request.subject.clone();
        let relation = request.relation.clone();
        let results = stream::iter(candidates)
            .map(move |object| {
                let check = CheckRequest::new(subject.clone(), relation.clone(), object.clone());
                async move {
                    let result = self.check(&check).await?;
                    Ok::<_, DomainError>((object, result.allowed))
                }
            })
            .buffer_unordered(self.config.fan_out)
            .try_filter_map(|(object, allowed)| {
                future::ready(Ok::<_, DomainError>(allowed.then_some(object)))
            });
        Ok(Box::pin(results))
    }

    /// Enumerates subjects holding the relation on an object.
    ///
    /// Candidates are gathered by walking the relation's rewrite against
    /// the store — direct tuples, delegation targets, indirection
    /// intermediates, and members behind userset-typed subjects — then
    /// each candidate is confirmed through Check, which is what keeps
    /// intersections and exclusions honest.
    pub async fn list_subjects(
        &self,
        request: &ListSubjectsRequest,
    ) -> DomainResult<SubjectStream<'_>> {
        let relation = self.resolve_relation(&request.object, &request.relation)?;

        let mut candidates = HashSet::new();
        let mut visited = HashSet::new();
        self.collect_subjects(
            relation,
            &request.object,
            &mut candidates,
            &mut visited,
            self.config.max_depth,
        )
        .await?;

        let mut candidates: Vec<SubjectRef> = candidates.into_iter().collect();
        candidates.sort();
        candidates.truncate(self.config.max_candidates);

        let relation = request.relation.clone();
        let object = request.object.clone();
        let results = stream::iter(candidates)
            .map(move |subject| {
                let check = CheckRequest::new(subject.clone(), relation.clone(), object.clone());
                async move {
                    let result = self.check(&check).await?;
                    Ok::<_, DomainError>((subject, result.allowed))
                }
            })
            .buffer_unordered(self.config.fan_out)
            .try_filter_map(|(subject, allowed)| {
                future::ready(Ok::<_, DomainError>(allowed.then_some(subject)))
            });
        Ok(Box::pin(results))
    }

    /// Gathers candidate subjects reachable through a relation's rewrite
    /// (boxed for recursion). The visited set bounds cyclic graphs; the
    /// candidate cap bounds sheer volume.
    fn collect_subjects<'a>(
        &'a self,
        relation: RelationId,
        object: &'a ObjectRef,
        candidates: &'a mut HashSet<SubjectRef>,
        visited: &'a mut HashSet<(RelationId, ObjectRef)>,
        depth: u32,
    ) -> BoxFuture<'a, DomainResult<()>> {
        Box::pin(async move {
            if depth == 0
                || candidates.len() >= self.config.max_candidates
                || !visited.insert((relation, object.clone()))
            {
                return Ok(());
            }
            let rewrite = &self.model.relation(relation).rewrite;
            self.collect_from_rewrite(rewrite, relation, object, candidates, visited, depth)
                .await
        })
    }

    fn collect_from_rewrite<'a>(
        &'a self,
        node: &'a RewriteNode,
        relation: RelationId,
        object: &'a ObjectRef,
        candidates: &'a mut HashSet<SubjectRef>,
        visited: &'a mut HashSet<(RelationId, ObjectRef)>,
        depth: u32,
    ) -> BoxFuture<'a, DomainResult<()>> {
        Box::pin(async move {
            match node {
                RewriteNode::Direct => {
                    let definition = self.model.relation(relation);
                    let mut tuples = self.store.read_userset(object, &definition.name).await?;
                    while let Some(tuple) = tuples.try_next().await? {
                        if !definition.subject_types.is_empty()
                            && !super::subject_type_allowed(
                                &tuple.subject,
                                &definition.subject_types,
                            )
                        {
                            continue;
                        }
                        // A userset subject is a candidate itself, and so
                        // are its members.
                        if let SubjectRef::Userset {
                            object: via,
                            relation: member_relation,
                        } = &tuple.subject
                        {
                            if let Some(member_relation) =
                                self.model.resolve(&via.type_name, member_relation)
                            {
                                self.collect_subjects(
                                    member_relation,
                                    via,
                                    &mut *candidates,
                                    &mut *visited,
                                    depth - 1,
                                )
                                .await?;
                            }
                        }
                        candidates.insert(tuple.subject);
                    }
                    Ok(())
                }

                RewriteNode::Computed { relation: target } => {
                    self.collect_subjects(*target, object, candidates, visited, depth - 1)
                        .await
                }

                RewriteNode::TupleToUserset { tupleset, target } => {
                    let tupleset_name = self.model.relation(*tupleset).name.clone();
                    let mut links = self.store.read_userset(object, &tupleset_name).await?;
                    while let Some(tuple) = links.try_next().await? {
                        let SubjectRef::Object(via) = tuple.subject else {
                            continue;
                        };
                        let Some(target_relation) = self.model.resolve(&via.type_name, target)
                        else {
                            continue;
                        };
                        self.collect_subjects(
                            target_relation,
                            &via,
                            &mut *candidates,
                            &mut *visited,
                            depth - 1,
                        )
                        .await?;
                    }
                    Ok(())
                }

                RewriteNode::Union { children } | RewriteNode::Intersection { children } => {
                    for child in children {
                        self.collect_from_rewrite(
                            child,
                            relation,
                            object,
                            &mut *candidates,
                            &mut *visited,
                            depth,
                        )
                        .await?;
                    }
                    Ok(())
                }

                // Subjects found only under subtract can never qualify.
                RewriteNode::Exclusion { base, .. } => {
                    self.collect_from_rewrite(base, relation, object, candidates, visited, depth)
                        .await
                }
            }
        })
    }
}
