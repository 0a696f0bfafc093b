//! Check resolver tests: direct assignment, delegation, indirection,
//! set operators, guards, and fault propagation.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DomainError;
use crate::model::{TypeDefinition, Userset};
use crate::resolver::{CheckRequest, Resolver, ResolverConfig};

use super::mocks::{FailingTupleStore, MockTupleStore, SlowTupleStore};
use super::*;

#[tokio::test]
async fn test_direct_tuple_grants_access() {
    let store = Arc::new(MockTupleStore::new());
    store.add("user:alice", "owner", "guild:a").await;
    let resolver = Resolver::new(guild_model(), store);

    assert!(check_allowed(&resolver, "user:alice", "owner", "guild:a").await);
    assert!(!check_allowed(&resolver, "user:bob", "owner", "guild:a").await);
}

#[tokio::test]
async fn test_missing_tuple_denies_access() {
    let store = Arc::new(MockTupleStore::new());
    let resolver = Resolver::new(guild_model(), store);

    assert!(!check_allowed(&resolver, "user:alice", "owner", "guild:a").await);
}

#[tokio::test]
async fn test_transitive_role_chain() {
    // No moderator tuple exists for alice; owner alone carries the relation.
    let store = Arc::new(MockTupleStore::new());
    store.add("user:alice", "owner", "guild:a").await;
    let resolver = Resolver::new(guild_model(), store);

    assert!(check_allowed(&resolver, "user:alice", "moderator", "guild:a").await);
    assert!(check_allowed(&resolver, "user:alice", "can_message", "guild:a").await);
    assert!(check_allowed(&resolver, "user:alice", "can_change_owner", "guild:a").await);
}

#[tokio::test]
async fn test_indirection_through_role() {
    // bob holds has_role on role:x, and role:x is linked to guild:a; the
    // ban permission flows through the indirection with zero
    // can_manage_permissions grants.
    let store = Arc::new(MockTupleStore::new());
    store.add("role:x", "parent", "guild:a").await;
    store.add("user:bob", "has_role", "role:x").await;
    let resolver = Resolver::new(guild_model(), store);

    assert!(check_allowed(&resolver, "user:bob", "can_ban_members", "guild:a").await);
    assert!(!check_allowed(&resolver, "user:carol", "can_ban_members", "guild:a").await);
}

#[tokio::test]
async fn test_no_stale_results_across_queries() {
    let store = Arc::new(MockTupleStore::new());
    store.add("role:x", "parent", "guild:a").await;
    store.add("user:bob", "has_role", "role:x").await;
    let resolver = Resolver::new(guild_model(), Arc::clone(&store));

    assert!(check_allowed(&resolver, "user:bob", "can_ban_members", "guild:a").await);

    store.remove("user:bob", "has_role", "role:x").await;
    assert!(!check_allowed(&resolver, "user:bob", "can_ban_members", "guild:a").await);
}

#[tokio::test]
async fn test_userset_subject_membership() {
    // Everyone holding has_role on role:x is a member of guild:a.
    let store = Arc::new(MockTupleStore::new());
    store.add("role:x#has_role", "member", "guild:a").await;
    store.add("user:dave", "has_role", "role:x").await;
    let resolver = Resolver::new(guild_model(), store);

    assert!(check_allowed(&resolver, "user:dave", "member", "guild:a").await);
    assert!(!check_allowed(&resolver, "user:erin", "member", "guild:a").await);
    // The userset reference itself is also a valid subject.
    assert!(check_allowed(&resolver, "role:x#has_role", "member", "guild:a").await);
}

#[tokio::test]
async fn test_subject_type_restriction_filters_tuples() {
    // moderator only accepts plain user subjects; a userset tuple written
    // against it must be ignored.
    let store = Arc::new(MockTupleStore::new());
    store.add("role:x#has_role", "moderator", "guild:a").await;
    store.add("user:dave", "has_role", "role:x").await;
    let resolver = Resolver::new(guild_model(), store);

    assert!(!check_allowed(&resolver, "user:dave", "moderator", "guild:a").await);
}

#[tokio::test]
async fn test_exclusion_subtracts_banned_member() {
    let store = Arc::new(MockTupleStore::new());
    store.add("user:carol", "member", "guild:a").await;
    store.add("user:carol", "banned", "guild:a").await;
    store.add("user:frank", "member", "guild:a").await;
    let resolver = Resolver::new(guild_model(), store);

    assert!(!check_allowed(&resolver, "user:carol", "can_participate", "guild:a").await);
    assert!(check_allowed(&resolver, "user:frank", "can_participate", "guild:a").await);
}

#[tokio::test]
async fn test_exclusion_is_not_commutative() {
    let model = compile(vec![
        TypeDefinition {
            type_name: "user".to_string(),
            relations: vec![],
        },
        TypeDefinition {
            type_name: "doc".to_string(),
            relations: vec![
                direct("reader", &["user"]),
                direct("blocked", &["user"]),
                relation(
                    "forward",
                    &[],
                    exclusion(computed("reader"), computed("blocked")),
                ),
                relation(
                    "reversed",
                    &[],
                    exclusion(computed("blocked"), computed("reader")),
                ),
            ],
        },
    ]);
    let store = Arc::new(MockTupleStore::new());
    store.add("user:alice", "reader", "doc:1").await;
    let resolver = Resolver::new(model, store);

    assert!(check_allowed(&resolver, "user:alice", "forward", "doc:1").await);
    assert!(!check_allowed(&resolver, "user:alice", "reversed", "doc:1").await);
}

#[tokio::test]
async fn test_intersection_requires_all_branches() {
    let model = compile(vec![
        TypeDefinition {
            type_name: "user".to_string(),
            relations: vec![],
        },
        TypeDefinition {
            type_name: "doc".to_string(),
            relations: vec![
                direct("reader", &["user"]),
                direct("approved", &["user"]),
                relation(
                    "can_sign",
                    &[],
                    intersection(vec![computed("reader"), computed("approved")]),
                ),
            ],
        },
    ]);
    let store = Arc::new(MockTupleStore::new());
    store.add("user:alice", "reader", "doc:1").await;
    store.add("user:alice", "approved", "doc:1").await;
    store.add("user:bob", "reader", "doc:1").await;
    let resolver = Resolver::new(model, store);

    assert!(check_allowed(&resolver, "user:alice", "can_sign", "doc:1").await);
    assert!(!check_allowed(&resolver, "user:bob", "can_sign", "doc:1").await);
}

#[tokio::test]
async fn test_union_is_commutative_and_associative() {
    // The same grants resolve identically regardless of how the union is
    // ordered or grouped.
    let orderings = [
        union(vec![computed("a"), computed("b"), computed("c")]),
        union(vec![computed("c"), computed("b"), computed("a")]),
        union(vec![
            union(vec![computed("a"), computed("b")]),
            computed("c"),
        ]),
        union(vec![
            computed("a"),
            union(vec![computed("b"), computed("c")]),
        ]),
    ];

    for rewrite in orderings {
        let model = compile(vec![
            TypeDefinition {
                type_name: "user".to_string(),
                relations: vec![],
            },
            TypeDefinition {
                type_name: "doc".to_string(),
                relations: vec![
                    direct("a", &["user"]),
                    direct("b", &["user"]),
                    direct("c", &["user"]),
                    relation("any", &[], rewrite),
                ],
            },
        ]);
        let store = Arc::new(MockTupleStore::new());
        store.add("user:alice", "b", "doc:1").await;
        let resolver = Resolver::new(model, store);

        assert!(check_allowed(&resolver, "user:alice", "any", "doc:1").await);
        assert!(!check_allowed(&resolver, "user:bob", "any", "doc:1").await);
    }
}

#[tokio::test]
async fn test_check_is_deterministic() {
    let store = Arc::new(MockTupleStore::new());
    store.add("user:alice", "owner", "guild:a").await;
    store.add("user:bob", "member", "guild:a").await;
    let resolver = Resolver::new(guild_model(), store);

    for _ in 0..20 {
        assert!(check_allowed(&resolver, "user:alice", "can_message", "guild:a").await);
        assert!(!check_allowed(&resolver, "user:carol", "can_message", "guild:a").await);
    }
}

#[tokio::test]
async fn test_cyclic_relations_terminate() {
    let model = compile(vec![
        TypeDefinition {
            type_name: "user".to_string(),
            relations: vec![],
        },
        TypeDefinition {
            type_name: "guild".to_string(),
            relations: vec![
                relation(
                    "can_manage_roles",
                    &["user"],
                    union(vec![Userset::This, computed("can_manage_permissions")]),
                ),
                relation(
                    "can_manage_permissions",
                    &["user"],
                    union(vec![Userset::This, computed("can_manage_roles")]),
                ),
            ],
        },
    ]);
    let store = Arc::new(MockTupleStore::new());
    store.add("user:alice", "can_manage_roles", "guild:a").await;
    let resolver = Resolver::new(model, store);

    // A grant on either side of the cycle is found through the other.
    assert!(check_allowed(&resolver, "user:alice", "can_manage_permissions", "guild:a").await);
    // No grant anywhere resolves to a plain negative, not a hang.
    assert!(!check_allowed(&resolver, "user:bob", "can_manage_permissions", "guild:a").await);
    assert!(resolver.metrics().snapshot().cycles_detected > 0);
}

#[tokio::test]
async fn test_depth_budget_collapses_to_negative() {
    let store = Arc::new(MockTupleStore::new());
    store.add("user:alice", "owner", "guild:a").await;

    let shallow = Resolver::with_config(
        guild_model(),
        Arc::clone(&store),
        ResolverConfig::default().with_max_depth(1),
    );
    // can_ban_members needs several hops; a depth budget of 1 cannot prove it.
    assert!(!check_allowed(&shallow, "user:alice", "can_ban_members", "guild:a").await);
    assert!(shallow.metrics().snapshot().depth_exhausted > 0);

    let deep = Resolver::new(guild_model(), store);
    assert!(check_allowed(&deep, "user:alice", "can_ban_members", "guild:a").await);
}

#[tokio::test]
async fn test_unknown_relation_is_an_error() {
    let resolver = Resolver::new(guild_model(), Arc::new(MockTupleStore::new()));

    let request = CheckRequest::parse("user:alice", "nonexistent", "guild:a").unwrap();
    assert!(matches!(
        resolver.check(&request).await,
        Err(DomainError::UnknownRelation { relation, .. }) if relation == "nonexistent"
    ));

    let request = CheckRequest::parse("user:alice", "owner", "starship:a").unwrap();
    assert!(matches!(
        resolver.check(&request).await,
        Err(DomainError::UnknownType { type_name }) if type_name == "starship"
    ));
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let resolver = Resolver::new(guild_model(), Arc::new(FailingTupleStore));

    let request = CheckRequest::parse("user:alice", "owner", "guild:a").unwrap();
    assert!(matches!(
        resolver.check(&request).await,
        Err(DomainError::StoreUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_deadline_exceeded_is_distinct_from_denied() {
    let store = Arc::new(SlowTupleStore {
        delay: Duration::from_millis(200),
    });
    let resolver = Resolver::new(guild_model(), store);

    let request = CheckRequest::parse("user:alice", "owner", "guild:a")
        .unwrap()
        .with_timeout(Duration::from_millis(10));
    assert!(matches!(
        resolver.check(&request).await,
        Err(DomainError::DeadlineExceeded { .. })
    ));
}

#[tokio::test]
async fn test_indeterminate_outcome_is_counted() {
    let model = compile(vec![
        TypeDefinition {
            type_name: "user".to_string(),
            relations: vec![],
        },
        TypeDefinition {
            type_name: "guild".to_string(),
            relations: vec![relation("spin", &[], computed("spin"))],
        },
    ]);
    let resolver = Resolver::new(model, Arc::new(MockTupleStore::new()));

    assert!(!check_allowed(&resolver, "user:alice", "spin", "guild:a").await);
    let snapshot = resolver.metrics().snapshot();
    assert!(snapshot.cycles_detected > 0);
    assert!(snapshot.indeterminate_results > 0);
}
