//! Request, response, and tree types for the resolvers.

use std::time::Duration;

use futures::stream::BoxStream;

use crate::error::DomainResult;
use crate::model::{ObjectRef, SubjectRef};

/// Outcome of evaluating a rewrite node for one (subject, relation, object)
/// triple.
///
/// `Indeterminate` marks a branch cut off by the cycle or depth guard. It
/// collapses to a negative answer at the API boundary but stays
/// distinguishable from a genuine `NotHolds` inside the evaluator and in
/// metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Holds,
    NotHolds,
    Indeterminate,
}

impl Decision {
    /// Whether the decision grants access.
    pub fn holds(self) -> bool {
        matches!(self, Decision::Holds)
    }
}

/// Request for a permission check.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// The subject to check (e.g., "user:alice").
    pub subject: SubjectRef,
    /// The relation to check (e.g., "moderator").
    pub relation: String,
    /// The object to check against (e.g., "guild:a").
    pub object: ObjectRef,
    /// Per-query deadline override; the resolver default applies when unset.
    pub timeout: Option<Duration>,
}

impl CheckRequest {
    /// Creates a new CheckRequest.
    pub fn new(subject: SubjectRef, relation: impl Into<String>, object: ObjectRef) -> Self {
        Self {
            subject,
            relation: relation.into(),
            object,
            timeout: None,
        }
    }

    /// Parses a request from string references.
    pub fn parse(subject: &str, relation: &str, object: &str) -> DomainResult<Self> {
        Ok(Self::new(
            SubjectRef::parse(subject)?,
            relation,
            ObjectRef::parse(object)?,
        ))
    }

    /// Overrides the query deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of a permission check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Whether the check is allowed.
    pub allowed: bool,
}

/// Request for expanding a relation into its userset tree.
#[derive(Debug, Clone)]
pub struct ExpandRequest {
    /// The relation to expand (e.g., "moderator").
    pub relation: String,
    /// The object to expand against (e.g., "guild:a").
    pub object: ObjectRef,
}

impl ExpandRequest {
    /// Creates a new ExpandRequest.
    pub fn new(relation: impl Into<String>, object: ObjectRef) -> Self {
        Self {
            relation: relation.into(),
            object,
        }
    }

    /// Parses a request from string references.
    pub fn parse(relation: &str, object: &str) -> DomainResult<Self> {
        Ok(Self::new(relation, ObjectRef::parse(object)?))
    }
}

/// A tree describing how a relation's userset is assembled, for
/// explainability and audit.
#[derive(Debug, Clone, PartialEq)]
pub struct UsersetTree {
    pub root: ExpandNode,
}

/// A node in the expansion tree. Node names use `type:id#relation` form.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandNode {
    /// Subjects found in stored tuples for this userset.
    Leaf {
        userset: String,
        subjects: Vec<SubjectRef>,
    },
    /// A delegation to another relation on the same object.
    Computed {
        userset: String,
        tree: Box<ExpandNode>,
    },
    /// An indirection: one child tree per linked object.
    TupleToUserset {
        userset: String,
        tupleset: String,
        children: Vec<ExpandNode>,
    },
    /// Any child grants the relation.
    Union {
        userset: String,
        children: Vec<ExpandNode>,
    },
    /// All children must grant the relation.
    Intersection {
        userset: String,
        children: Vec<ExpandNode>,
    },
    /// Base minus subtract.
    Difference {
        userset: String,
        base: Box<ExpandNode>,
        subtract: Box<ExpandNode>,
    },
    /// Expansion was cut off here by the cycle or depth guard.
    Truncated { userset: String },
}

impl ExpandNode {
    /// The userset this node describes.
    pub fn userset(&self) -> &str {
        match self {
            ExpandNode::Leaf { userset, .. }
            | ExpandNode::Computed { userset, .. }
            | ExpandNode::TupleToUserset { userset, .. }
            | ExpandNode::Union { userset, .. }
            | ExpandNode::Intersection { userset, .. }
            | ExpandNode::Difference { userset, .. }
            | ExpandNode::Truncated { userset } => userset,
        }
    }
}

/// Request for enumerating objects a subject holds a relation to.
#[derive(Debug, Clone)]
pub struct ListObjectsRequest {
    /// The subject to enumerate for (e.g., "user:alice").
    pub subject: SubjectRef,
    /// The relation to check (e.g., "moderator").
    pub relation: String,
    /// The object type to enumerate (e.g., "guild").
    pub object_type: String,
}

impl ListObjectsRequest {
    /// Creates a new ListObjectsRequest.
    pub fn new(
        subject: SubjectRef,
        relation: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            relation: relation.into(),
            object_type: object_type.into(),
        }
    }

    /// Parses a request from string references.
    pub fn parse(subject: &str, relation: &str, object_type: &str) -> DomainResult<Self> {
        Ok(Self::new(SubjectRef::parse(subject)?, relation, object_type))
    }
}

/// Request for enumerating subjects holding a relation on an object.
#[derive(Debug, Clone)]
pub struct ListSubjectsRequest {
    /// The relation to enumerate (e.g., "moderator").
    pub relation: String,
    /// The object to enumerate against (e.g., "guild:a").
    pub object: ObjectRef,
}

impl ListSubjectsRequest {
    /// Creates a new ListSubjectsRequest.
    pub fn new(relation: impl Into<String>, object: ObjectRef) -> Self {
        Self {
            relation: relation.into(),
            object,
        }
    }

    /// Parses a request from string references.
    pub fn parse(relation: &str, object: &str) -> DomainResult<Self> {
        Ok(Self::new(relation, ObjectRef::parse(object)?))
    }
}

/// Lazily-produced sequence of objects; dropping it cancels pending checks.
pub type ObjectStream<'a> = BoxStream<'a, DomainResult<ObjectRef>>;

/// Lazily-produced sequence of subjects; dropping it cancels pending checks.
pub type SubjectStream<'a> = BoxStream<'a, DomainResult<SubjectRef>>;
