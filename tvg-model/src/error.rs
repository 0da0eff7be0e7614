//! Error types for the staging model.

use thiserror::Error;

/// Result type for schema registry construction.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for staging validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for query compilation.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while building a [`SchemaRegistry`](crate::SchemaRegistry).
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Two tables share a name.
    #[error("duplicate table: {0}")]
    DuplicateTable(String),

    /// A table declares the same field twice.
    #[error("duplicate field {field} in table {table}")]
    DuplicateField { table: String, field: String },

    /// A table has no primary key fields.
    #[error("table {0} has no primary key")]
    MissingPrimaryKey(String),

    /// A primary key names a field the table does not declare.
    #[error("primary key {field} is not a field of table {table}")]
    PrimaryKeyNotField { table: String, field: String },

    /// A table or field name is not a plain SQL identifier.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config document is malformed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Broad category of a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unknown table.
    Schema,
    /// Undeclared field key.
    Field,
    /// Value kind not allowed in its role.
    Type,
    /// Malformed nested search structure.
    Shape,
    /// `fields` has no entries.
    EmptyFields,
}

/// Reasons a staging record or nested search is rejected.
///
/// None of these are fatal: a service turns them into a client-facing
/// rejection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid table name: {0}")]
    InvalidTable(String),

    #[error("invalid searchBy key: {0}")]
    InvalidSearchKey(String),

    #[error("invalid searchBy value for {key}: {value}")]
    InvalidSearchValueType { key: String, value: String },

    #[error("fields is empty")]
    EmptyFields,

    #[error("invalid fields key: {0}")]
    InvalidFieldKey(String),

    #[error("invalid nested searchBy for {key}: {value}")]
    InvalidNestedSearchShape { key: String, value: String },

    #[error("invalid fields value for {key}: {value}")]
    InvalidFieldValueType { key: String, value: String },

    /// A nested search under `field` failed its own validation.
    #[error("invalid nested search in {field}: {source}")]
    Nested {
        field: String,
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Stable kebab-case identifier of the rejection reason.
    ///
    /// Nested failures report the kind of the innermost error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTable(_) => "invalid-table",
            Self::InvalidSearchKey(_) => "invalid-search-key",
            Self::InvalidSearchValueType { .. } => "invalid-search-value-type",
            Self::EmptyFields => "empty-fields",
            Self::InvalidFieldKey(_) => "invalid-field-key",
            Self::InvalidNestedSearchShape { .. } => "invalid-nested-search-shape",
            Self::InvalidFieldValueType { .. } => "invalid-field-value-type",
            Self::Nested { source, .. } => source.kind(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTable(_) => ErrorCategory::Schema,
            Self::InvalidSearchKey(_) | Self::InvalidFieldKey(_) => ErrorCategory::Field,
            Self::InvalidSearchValueType { .. } | Self::InvalidFieldValueType { .. } => {
                ErrorCategory::Type
            }
            Self::InvalidNestedSearchShape { .. } => ErrorCategory::Shape,
            Self::EmptyFields => ErrorCategory::EmptyFields,
            Self::Nested { source, .. } => source.category(),
        }
    }

    /// Strips any [`ValidationError::Nested`] wrappers.
    pub fn innermost(&self) -> &ValidationError {
        match self {
            Self::Nested { source, .. } => source.innermost(),
            other => other,
        }
    }
}

/// Errors raised while compiling a search into a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("column {column} is not a field of table {table}")]
    UnknownColumn { table: String, column: String },

    /// Nested searches cannot be bound as query arguments.
    #[error("non-scalar search value for {0}")]
    NonScalarArgument(String),
}
