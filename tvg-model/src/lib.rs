//! Staging record model for the voting guide backend.
//!
//! A staging record is a candidate row, submitted as loosely-typed JSON, that
//! waits for review before it touches persisted data. This crate holds the
//! pure, synchronous part of that workflow:
//! - [`SchemaRegistry`]: the static set of tables, their fields and primary keys
//! - [`FieldMap`] / [`FieldValue`]: the closed value model, including nested searches
//! - [`SchemaValidator`]: checks a [`Staging`] record against the registry
//! - [`QueryCompiler`]: turns a search into a parameterized `SELECT`
//! - [`StagingResult`] / [`Reconciler`]: create / update / conflict classification
//!
//! Nothing here performs I/O besides [`SchemaRegistry::from_path`]. All types
//! are `Send + Sync`, and the registry is never mutated after construction.

mod error;
mod query;
mod reconcile;
mod result;
mod schema;
mod staging;
mod validator;
mod value;

pub use error::{
    ErrorCategory, QueryError, QueryResult, SchemaError, SchemaResult, ValidationError,
    ValidationResult,
};
pub use query::{CompiledQuery, QueryCompiler};
pub use reconcile::{DefaultReconciler, Reconciler};
pub use result::{FieldCompare, StagingResult, StagingResultField, StagingStatus};
pub use schema::{ColumnKind, ColumnVar, FieldDef, SchemaRegistry, TableSchema};
pub use staging::{Staging, StagingRequest};
pub use validator::SchemaValidator;
pub use value::{FieldMap, FieldValue, NestedSearch};
