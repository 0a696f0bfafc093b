//! Core type definitions for the authorization model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A reference to a concrete object (e.g., "guild:a" or "role:mods").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    /// The type portion (e.g., "guild").
    pub type_name: String,
    /// The ID portion (e.g., "a").
    pub id: String,
}

impl ObjectRef {
    /// Creates a new ObjectRef from type and ID.
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// Parses an object reference from "type:id" format.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value.split_once(':') {
            Some((type_name, id))
                if !type_name.is_empty() && !id.is_empty() && !id.contains('#') =>
            {
                Ok(Self::new(type_name, id))
            }
            _ => Err(DomainError::InvalidObjectFormat {
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.id)
    }
}

/// A subject of a relationship: either a concrete object or a userset
/// reference ("guild:a#member") whose members hold the relation indirectly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubjectRef {
    /// A concrete entity (e.g., "user:alice").
    Object(ObjectRef),
    /// All subjects holding `relation` on `object` (e.g., "role:mods#has_role").
    Userset { object: ObjectRef, relation: String },
}

impl SubjectRef {
    /// Creates a concrete-object subject.
    pub fn object(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Object(ObjectRef::new(type_name, id))
    }

    /// Creates a userset subject.
    pub fn userset(
        type_name: impl Into<String>,
        id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self::Userset {
            object: ObjectRef::new(type_name, id),
            relation: relation.into(),
        }
    }

    /// Parses a subject from "type:id" or "type:id#relation" format.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidSubjectFormat {
            value: value.to_string(),
        };
        match value.split_once('#') {
            Some((object, relation)) => {
                if relation.is_empty() {
                    return Err(invalid());
                }
                let object = ObjectRef::parse(object).map_err(|_| invalid())?;
                Ok(Self::Userset {
                    object,
                    relation: relation.to_string(),
                })
            }
            None => {
                let object = ObjectRef::parse(value).map_err(|_| invalid())?;
                Ok(Self::Object(object))
            }
        }
    }

    /// The type name of the underlying object.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Object(object) => &object.type_name,
            Self::Userset { object, .. } => &object.type_name,
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(object) => write!(f, "{object}"),
            Self::Userset { object, relation } => write!(f, "{object}#{relation}"),
        }
    }
}

/// A stored relationship fact: `subject` holds `relation` on `object`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    pub subject: SubjectRef,
    pub relation: String,
    pub object: ObjectRef,
}

impl Tuple {
    /// Creates a new Tuple.
    pub fn new(subject: SubjectRef, relation: impl Into<String>, object: ObjectRef) -> Self {
        Self {
            subject,
            relation: relation.into(),
            object,
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.subject)
    }
}

/// An authorization model as produced by the external model front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationModel {
    /// Schema version (e.g., "1.1").
    pub schema_version: String,
    /// Type definitions in the model.
    pub type_definitions: Vec<TypeDefinition>,
}

/// A type definition within the authorization model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// The type name (e.g., "guild", "role").
    pub type_name: String,
    /// Relations defined on this type.
    pub relations: Vec<RelationDefinition>,
}

/// A relation definition on a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDefinition {
    /// The relation name.
    pub name: String,
    /// Subject types allowed in direct assignments for this relation.
    #[serde(default)]
    pub subject_types: Vec<SubjectTypeRestriction>,
    /// The userset rewrite for this relation.
    pub rewrite: Userset,
}

/// An allowed subject type for direct assignment: a plain type (`[user]`)
/// or a userset-typed subject (`[role#has_role]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectTypeRestriction {
    pub type_name: String,
    #[serde(default)]
    pub relation: Option<String>,
}

impl SubjectTypeRestriction {
    /// A plain subject type like `[user]`.
    pub fn plain(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: None,
        }
    }

    /// A userset subject type like `[role#has_role]`.
    pub fn userset(type_name: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: Some(relation.into()),
        }
    }
}

/// A userset defines how a relation's members are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Userset {
    /// Direct assignment via stored tuples.
    This,
    /// Delegates to another relation on the same object.
    ComputedUserset { relation: String },
    /// Resolves `target` on every object linked through `tupleset`.
    TupleToUserset { tupleset: String, target: String },
    /// Holds if any child holds.
    Union { children: Vec<Userset> },
    /// Holds if all children hold.
    Intersection { children: Vec<Userset> },
    /// Holds if `base` holds and `subtract` does not.
    Exclusion {
        base: Box<Userset>,
        subtract: Box<Userset>,
    },
}
