//! Resolver test suite.

mod check_tests;

use std::sync::Arc;

use crate::model::{
    AuthorizationModel, CompiledModel, RelationDefinition, SubjectTypeRestriction, TypeDefinition,
    Userset,
};
use crate::resolver::{CheckRequest, Resolver};
use crate::store::TupleStore;

pub(crate) fn compile(type_definitions: Vec<TypeDefinition>) -> Arc<CompiledModel> {
    let model = AuthorizationModel {
        schema_version: "1.1".to_string(),
        type_definitions,
    };
    Arc::new(CompiledModel::compile(&model).unwrap())
}

pub(crate) fn restriction(value: &str) -> SubjectTypeRestriction {
    match value.split_once('#') {
        Some((type_name, relation)) => SubjectTypeRestriction::userset(type_name, relation),
        None => SubjectTypeRestriction::plain(value),
    }
}

pub(crate) fn direct(name: &str, subject_types: &[&str]) -> RelationDefinition {
    RelationDefinition {
        name: name.to_string(),
        subject_types: subject_types.iter().map(|s| restriction(s)).collect(),
        rewrite: Userset::This,
    }
}

pub(crate) fn relation(name: &str, subject_types: &[&str], rewrite: Userset) -> RelationDefinition {
    RelationDefinition {
        name: name.to_string(),
        subject_types: subject_types.iter().map(|s| restriction(s)).collect(),
        rewrite,
    }
}

pub(crate) fn computed(relation: &str) -> Userset {
    Userset::ComputedUserset {
        relation: relation.to_string(),
    }
}

pub(crate) fn indirect(tupleset: &str, target: &str) -> Userset {
    Userset::TupleToUserset {
        tupleset: tupleset.to_string(),
        target: target.to_string(),
    }
}

pub(crate) fn union(children: Vec<Userset>) -> Userset {
    Userset::Union { children }
}

pub(crate) fn intersection(children: Vec<Userset>) -> Userset {
    Userset::Intersection { children }
}

pub(crate) fn exclusion(base: Userset, subtract: Userset) -> Userset {
    Userset::Exclusion {
        base: Box::new(base),
        subtract: Box::new(subtract),
    }
}

/// The guild/role model most tests run against.
pub(crate) fn guild_model() -> Arc<CompiledModel> {
    compile(vec![
        TypeDefinition {
            type_name: "user".to_string(),
            relations: vec![],
        },
        TypeDefinition {
            type_name: "role".to_string(),
            relations: vec![direct("has_role", &["user"])],
        },
        TypeDefinition {
            type_name: "guild".to_string(),
            relations: vec![
                direct("owner", &["user"]),
                relation(
                    "member",
                    &["user", "role#has_role"],
                    union(vec![Userset::This, computed("owner")]),
                ),
                relation(
                    "moderator",
                    &["user"],
                    union(vec![Userset::This, computed("owner")]),
                ),
                direct("parent", &["role"]),
                direct("banned", &["user"]),
                relation(
                    "can_message",
                    &[],
                    union(vec![computed("member"), computed("moderator")]),
                ),
                relation(
                    "can_manage_permissions",
                    &["user"],
                    union(vec![Userset::This, computed("moderator")]),
                ),
                relation(
                    "can_ban_members",
                    &[],
                    union(vec![
                        indirect("parent", "has_role"),
                        computed("can_manage_permissions"),
                    ]),
                ),
                relation("can_change_owner", &[], computed("owner")),
                relation(
                    "can_participate",
                    &[],
                    exclusion(computed("member"), computed("banned")),
                ),
            ],
        },
    ])
}

pub(crate) async fn check_allowed<S>(
    resolver: &Resolver<S>,
    subject: &str,
    relation: &str,
    object: &str,
) -> bool
where
    S: TupleStore + 'static,
{
    resolver
        .check(&CheckRequest::parse(subject, relation, object).unwrap())
        .await
        .unwrap()
        .allowed
}
