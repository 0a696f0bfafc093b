//! Authorization model: raw definitions, compiler, and cache.

mod cache;
mod compile;
mod types;

#[cfg(test)]
mod types_proptest;

pub use cache::ModelCache;
pub use compile::{
    CompiledModel, CompiledRelation, ModelValidationError, RelationId, RewriteNode, TypeId,
};
pub use types::{
    AuthorizationModel, ObjectRef, RelationDefinition, SubjectRef, SubjectTypeRestriction, Tuple,
    TypeDefinition, Userset,
};
