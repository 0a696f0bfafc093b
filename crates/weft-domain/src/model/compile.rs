//! Model compilation and validation.
//!
//! Compilation turns the raw [`AuthorizationModel`] into an immutable
//! [`CompiledModel`] in which every relation reference is resolved to an
//! index into a flat relation table. Dangling references are rejected here
//! so they can never surface mid-query.
//!
//! Self-referential and mutually-referential relation definitions are
//! accepted: recursion is legal in a rewrite graph and is bounded at query
//! time by the resolver's cycle and depth guards.

use std::collections::HashMap;

use thiserror::Error;

use super::types::{AuthorizationModel, RelationDefinition, SubjectTypeRestriction, Userset};

/// Validation error raised during model compilation.
///
/// Any of these is fatal: queries must not be served against a model that
/// failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelValidationError {
    /// The model declares no types at all.
    #[error("model must have at least one type definition")]
    EmptyModel,

    /// The same type is declared twice.
    #[error("duplicate type definition: {type_name}")]
    DuplicateType { type_name: String },

    /// The same relation is declared twice on one type.
    #[error("duplicate relation '{relation}' on type '{type_name}'")]
    DuplicateRelation { type_name: String, relation: String },

    /// A rewrite references a relation that is not declared on the type.
    #[error("undefined relation '{referenced}' referenced by {type_name}#{relation}")]
    UndefinedRelation {
        type_name: String,
        relation: String,
        referenced: String,
    },

    /// A subject-type restriction names an undeclared type.
    #[error("undefined type '{referenced}' referenced by {type_name}#{relation}")]
    UndefinedType {
        type_name: String,
        relation: String,
        referenced: String,
    },

    /// A subject-type restriction names a relation missing on its type.
    #[error("subject type '{restriction}' on {type_name}#{relation} names an undeclared relation")]
    InvalidRestriction {
        type_name: String,
        relation: String,
        restriction: String,
    },

    /// A tupleset relation must restrict its subjects to plain object types
    /// so the indirection target can be resolved against them.
    #[error("tupleset '{tupleset}' used by {type_name}#{relation} has no plain subject types")]
    UnrestrictedTupleset {
        type_name: String,
        relation: String,
        tupleset: String,
    },

    /// The indirection target is not declared on a type reachable through
    /// the tupleset relation.
    #[error(
        "relation '{target}' referenced by {type_name}#{relation} is not declared on linked type '{via_type}'"
    )]
    UnresolvedIndirection {
        type_name: String,
        relation: String,
        target: String,
        via_type: String,
    },
}

/// Index of a type in the compiled model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) usize);

/// Index of a relation in the compiled model's relation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelationId(pub(crate) usize);

/// A rewrite expression with relation references resolved at compile time.
#[derive(Debug, Clone)]
pub enum RewriteNode {
    /// Direct assignment via stored tuples.
    Direct,
    /// Delegates to another relation on the same object.
    Computed { relation: RelationId },
    /// Resolves `target` on every object linked through `tupleset`.
    ///
    /// The target stays a name: intermediate objects may be of any type the
    /// tupleset allows, so the concrete relation is looked up per object at
    /// query time through the compiled index.
    TupleToUserset { tupleset: RelationId, target: String },
    /// Holds if any child holds.
    Union { children: Vec<RewriteNode> },
    /// Holds if all children hold.
    Intersection { children: Vec<RewriteNode> },
    /// Holds if `base` holds and `subtract` does not.
    Exclusion {
        base: Box<RewriteNode>,
        subtract: Box<RewriteNode>,
    },
}

/// A compiled relation: name, owner type, direct-assignment restrictions,
/// and the resolved rewrite tree.
#[derive(Debug, Clone)]
pub struct CompiledRelation {
    pub name: String,
    pub type_id: TypeId,
    pub subject_types: Vec<SubjectTypeRestriction>,
    pub rewrite: RewriteNode,
}

/// An immutable, validated authorization model.
///
/// Compiled once per model version and shared across queries; a new version
/// is a new instance, never an in-place mutation.
#[derive(Debug)]
pub struct CompiledModel {
    schema_version: String,
    type_names: Vec<String>,
    type_index: HashMap<String, TypeId>,
    relations: Vec<CompiledRelation>,
    relation_index: HashMap<(TypeId, String), RelationId>,
}

impl CompiledModel {
    /// Compiles and validates a raw authorization model.
    pub fn compile(model: &AuthorizationModel) -> Result<Self, ModelValidationError> {
        if model.type_definitions.is_empty() {
            return Err(ModelValidationError::EmptyModel);
        }

        // Pass 1: index every type and relation so forward references work.
        let mut type_names = Vec::with_capacity(model.type_definitions.len());
        let mut type_index = HashMap::new();
        for type_def in &model.type_definitions {
            let id = TypeId(type_names.len());
            if type_index.insert(type_def.type_name.clone(), id).is_some() {
                return Err(ModelValidationError::DuplicateType {
                    type_name: type_def.type_name.clone(),
                });
            }
            type_names.push(type_def.type_name.clone());
        }

        let mut relation_index = HashMap::new();
        let mut relation_defs: Vec<(TypeId, &RelationDefinition)> = Vec::new();
        for type_def in &model.type_definitions {
            let type_id = type_index[&type_def.type_name];
            for relation_def in &type_def.relations {
                let id = RelationId(relation_defs.len());
                if relation_index
                    .insert((type_id, relation_def.name.clone()), id)
                    .is_some()
                {
                    return Err(ModelValidationError::DuplicateRelation {
                        type_name: type_def.type_name.clone(),
                        relation: relation_def.name.clone(),
                    });
                }
                relation_defs.push((type_id, relation_def));
            }
        }

        // Pass 2: validate subject-type restrictions.
        for (type_id, relation_def) in &relation_defs {
            let type_name = &type_names[type_id.0];
            for restriction in &relation_def.subject_types {
                let Some(restricted_type) = type_index.get(&restriction.type_name) else {
                    return Err(ModelValidationError::UndefinedType {
                        type_name: type_name.clone(),
                        relation: relation_def.name.clone(),
                        referenced: restriction.type_name.clone(),
                    });
                };
                if let Some(relation) = &restriction.relation {
                    if !relation_index.contains_key(&(*restricted_type, relation.clone())) {
                        return Err(ModelValidationError::InvalidRestriction {
                            type_name: type_name.clone(),
                            relation: relation_def.name.clone(),
                            restriction: format!("{}#{}", restriction.type_name, relation),
                        });
                    }
                }
            }
        }

        // Pass 3: compile rewrites with all references resolved.
        let compiler = Compiler {
            type_names: &type_names,
            type_index: &type_index,
            relation_index: &relation_index,
            relation_defs: &relation_defs,
        };
        let mut relations = Vec::with_capacity(relation_defs.len());
        for (type_id, relation_def) in &relation_defs {
            let rewrite = compiler.compile_rewrite(*type_id, relation_def, &relation_def.rewrite)?;
            relations.push(CompiledRelation {
                name: relation_def.name.clone(),
                type_id: *type_id,
                subject_types: relation_def.subject_types.clone(),
                rewrite,
            });
        }

        Ok(Self {
            schema_version: model.schema_version.clone(),
            type_names,
            type_index,
            relations,
            relation_index,
        })
    }

    /// The schema version the model was declared with.
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Looks up a type by name.
    pub fn type_id(&self, type_name: &str) -> Option<TypeId> {
        self.type_index.get(type_name).copied()
    }

    /// The name of a type.
    pub fn type_name(&self, id: TypeId) -> &str {
        &self.type_names[id.0]
    }

    /// Looks up a relation on a type.
    pub fn relation_id(&self, type_id: TypeId, relation: &str) -> Option<RelationId> {
        self.relation_index
            .get(&(type_id, relation.to_string()))
            .copied()
    }

    /// Looks up a relation by type name and relation name.
    pub fn resolve(&self, type_name: &str, relation: &str) -> Option<RelationId> {
        self.type_id(type_name)
            .and_then(|type_id| self.relation_id(type_id, relation))
    }

    /// The compiled relation behind an id.
    pub fn relation(&self, id: RelationId) -> &CompiledRelation {
        &self.relations[id.0]
    }
}

struct Compiler<'a> {
    type_names: &'a [String],
    type_index: &'a HashMap<String, TypeId>,
    relation_index: &'a HashMap<(TypeId, String), RelationId>,
    relation_defs: &'a [(TypeId, &'a RelationDefinition)],
}

impl Compiler<'_> {
    fn compile_rewrite(
        &self,
        type_id: TypeId,
        relation_def: &RelationDefinition,
        userset: &Userset,
    ) -> Result<RewriteNode, ModelValidationError> {
        match userset {
            Userset::This => Ok(RewriteNode::Direct),

            Userset::ComputedUserset { relation } => {
                let target = self.require_relation(type_id, relation_def, relation)?;
                Ok(RewriteNode::Computed { relation: target })
            }

            Userset::TupleToUserset { tupleset, target } => {
                let tupleset_id = self.require_relation(type_id, relation_def, tupleset)?;
                self.validate_indirection(type_id, relation_def, tupleset_id, tupleset, target)?;
                Ok(RewriteNode::TupleToUserset {
                    tupleset: tupleset_id,
                    target: target.clone(),
                })
            }

            Userset::Union { children } => Ok(RewriteNode::Union {
                children: self.compile_children(type_id, relation_def, children)?,
            }),

            Userset::Intersection { children } => Ok(RewriteNode::Intersection {
                children: self.compile_children(type_id, relation_def, children)?,
            }),

            Userset::Exclusion { base, subtract } => Ok(RewriteNode::Exclusion {
                base: Box::new(self.compile_rewrite(type_id, relation_def, base)?),
                subtract: Box::new(self.compile_rewrite(type_id, relation_def, subtract)?),
            }),
        }
    }

    fn compile_children(
        &self,
        type_id: TypeId,
        relation_def: &RelationDefinition,
        children: &[Userset],
    ) -> Result<Vec<RewriteNode>, ModelValidationError> {
        children
            .iter()
            .map(|child| self.compile_rewrite(type_id, relation_def, child))
            .collect()
    }

    fn require_relation(
        &self,
        type_id: TypeId,
        relation_def: &RelationDefinition,
        referenced: &str,
    ) -> Result<RelationId, ModelValidationError> {
        self.relation_index
            .get(&(type_id, referenced.to_string()))
            .copied()
            .ok_or_else(|| ModelValidationError::UndefinedRelation {
                type_name: self.type_names[type_id.0].clone(),
                relation: relation_def.name.clone(),
                referenced: referenced.to_string(),
            })
    }

    /// The indirection target must be declared on every object type the
    /// tupleset relation can link to; otherwise the reference would dangle
    /// at query time.
    fn validate_indirection(
        &self,
        type_id: TypeId,
        relation_def: &RelationDefinition,
        tupleset_id: RelationId,
        tupleset: &str,
        target: &str,
    ) -> Result<(), ModelValidationError> {
        let (_, tupleset_def) = self.relation_defs[tupleset_id.0];
        let plain_types: Vec<&SubjectTypeRestriction> = tupleset_def
            .subject_types
            .iter()
            .filter(|restriction| restriction.relation.is_none())
            .collect();
        if plain_types.is_empty() {
            return Err(ModelValidationError::UnrestrictedTupleset {
                type_name: self.type_names[type_id.0].clone(),
                relation: relation_def.name.clone(),
                tupleset: tupleset.to_string(),
            });
        }
        for restriction in plain_types {
            let Some(linked_type) = self.type_index.get(&restriction.type_name) else {
                return Err(ModelValidationError::UndefinedType {
                    type_name: self.type_names[type_id.0].clone(),
                    relation: relation_def.name.clone(),
                    referenced: restriction.type_name.clone(),
                });
            };
            if !self
                .relation_index
                .contains_key(&(*linked_type, target.to_string()))
            {
                return Err(ModelValidationError::UnresolvedIndirection {
                    type_name: self.type_names[type_id.0].clone(),
                    relation: relation_def.name.clone(),
                    target: target.to_string(),
                    via_type: restriction.type_name.clone(),
                });
            }
        }
        Ok(())
    }
}
