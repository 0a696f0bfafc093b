//! Domain error types for authorization operations.

use thiserror::Error;

pub use crate::model::ModelValidationError;

/// Domain-specific errors for authorization operations.
///
/// Truncation caused by the cycle or depth guards is deliberately not an
/// error: it is carried in the evaluator's tri-state decision and surfaces
/// through [`crate::resolver::ResolverMetrics`].
#[derive(Debug, Error)]
pub enum DomainError {
    /// The authorization model failed validation at compile time.
    #[error(transparent)]
    ModelValidation(#[from] ModelValidationError),

    /// The tuple store failed. Retrying is the caller's decision.
    #[error("tuple store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// The per-query time budget elapsed before a decision was reached.
    #[error("query deadline exceeded after {timeout_ms}ms")]
    DeadlineExceeded { timeout_ms: u64 },

    /// Type not found in the compiled model.
    #[error("type not found: {type_name}")]
    UnknownType { type_name: String },

    /// Relation not found on the given type.
    #[error("relation '{relation}' not found on type '{type_name}'")]
    UnknownRelation { type_name: String, relation: String },

    /// Invalid object reference format.
    #[error("invalid object format: {value}")]
    InvalidObjectFormat { value: String },

    /// Invalid subject reference format.
    #[error("invalid subject format: {value}")]
    InvalidSubjectFormat { value: String },

    /// A tuple read was issued with an unusable filter.
    #[error("invalid tuple filter: {message}")]
    InvalidFilter { message: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
