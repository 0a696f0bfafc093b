//! weft-domain: core authorization domain logic
//!
//! This crate contains the relationship-based access control engine:
//! - Authorization model types, compiler and validator
//! - Tuple store contract consumed by the resolvers
//! - Rewrite-rule evaluator with Check, Expand and List resolvers
//! - Compiled-model caching keyed by version
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 weft-domain                  │
//! ├─────────────────────────────────────────────┤
//! │  model/     - Model AST, compiler, cache    │
//! │  store      - Tuple store contract          │
//! │  resolver/  - Rewrite evaluation engine     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The model is compiled once and shared immutably across queries; tuples
//! are read through the [`store::TupleStore`] contract; every query owns
//! its own resolution state and leaves no trace behind.

pub mod error;
pub mod model;
pub mod resolver;
pub mod store;

// Re-export commonly used types at the crate root
pub use error::{DomainError, DomainResult};
pub use model::{
    AuthorizationModel, CompiledModel, ModelCache, ModelValidationError, ObjectRef, SubjectRef,
    Tuple,
};
pub use resolver::{CheckRequest, CheckResult, Resolver, ResolverConfig};
pub use store::{TupleFilter, TupleStore, TupleStream};
