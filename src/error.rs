//! Error types for hiveorm
//!
//! This module defines the custom error types used throughout the library.
//! `DbError` represents every failure the core surfaces to callers and is
//! serializable so it can cross an IPC/RPC boundary a consumer layers on top.

use serde::Serializer;
use thiserror::Error;

/// Main error type for all data-layer operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// No driver has been attached to the facade via `connect_driver`.
    #[error("no driver connected")]
    NoDriverConnected,

    /// An insert was missing one or more required columns.
    #[error("missing required columns: {0:?}")]
    MissingRequiredColumns(Vec<String>),

    /// A security rule or predicate denied the operation.
    #[error("security denied: {table}.{operation}")]
    SecurityDenied { table: String, operation: String },

    /// An update attempted to write an immutable field.
    #[error("immutable field violation: {table}.{operation}")]
    ImmutableFieldViolation { table: String, operation: String },

    /// A migration diff found an incompatible column attribute change.
    #[error("column mutation not supported: {table}.{column}")]
    ColumnMutationNotSupported { table: String, column: String },

    /// A migration diff found an incompatible constraint change.
    #[error("constraint change not supported: {table}")]
    ConstraintChangeNotSupported { table: String },

    /// A template interpolation referenced an unattached column, or a
    /// filter constructor was given the wrong shape of value.
    #[error("invalid template value: {0}")]
    InvalidTemplateValue(String),

    /// Could not establish or maintain a driver connection.
    #[error("connection failed: {0}")]
    ConnectionError(String),

    /// A statement failed to execute against the driver.
    #[error("query execution failed: {0}")]
    QueryError(String),

    /// The SQL parser adapter could not parse a composed statement.
    #[error("parse failed: {0}")]
    ParseError(String),

    /// A read was attempted inside an active `batch()` scope.
    #[error("reads are not allowed inside a batch")]
    ReadDuringBatch,

    /// Invalid input supplied at declaration time (programmer error).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl serde::Serialize for DbError {
    /// Serializes the error as `{kind, message}`, mirroring the shape
    /// expected by a consumer on the other side of an RPC boundary.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let kind = match self {
            DbError::NoDriverConnected => "no_driver_connected",
            DbError::MissingRequiredColumns(_) => "missing_required_columns",
            DbError::SecurityDenied { .. } => "security_denied",
            DbError::ImmutableFieldViolation { .. } => "immutable_field_violation",
            DbError::ColumnMutationNotSupported { .. } => "column_mutation_not_supported",
            DbError::ConstraintChangeNotSupported { .. } => "constraint_change_not_supported",
            DbError::InvalidTemplateValue(_) => "invalid_template_value",
            DbError::ConnectionError(_) => "connection",
            DbError::QueryError(_) => "query",
            DbError::ParseError(_) => "parse",
            DbError::ReadDuringBatch => "read_during_batch",
            DbError::InvalidInput(_) => "invalid_input",
        };

        let mut state = serializer.serialize_struct("DbError", 2)?;
        state.serialize_field("kind", kind)?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::QueryError(err.to_string())
    }
}
