//! Error types for the staging store.

use thiserror::Error;
use tvg_model::{QueryError, ValidationError};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Staged row not found.
    #[error("staging data not found: {0}")]
    NotFound(i64),

    /// A staged record failed validation.
    #[error("invalid staging record {index}: {source}")]
    Validation {
        index: usize,
        source: ValidationError,
    },

    /// A staged record's search could not be compiled.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Invalid data read from or bound to the database.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The connection mutex was poisoned by a panicking holder.
    #[error("connection lock poisoned")]
    LockPoisoned,
}
