//! Error types for the schema registry

use thiserror::Error;

/// Schema error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Table '{table}' is missing required columns: {}", missing.join(", "))]
    MissingColumns { table: String, missing: Vec<String> },

    #[error("Table '{table}' has column '{field}' more than once")]
    DuplicateColumn { table: String, field: String },

    #[error("Field '{field}' is not part of the {table} schema")]
    UnknownField { table: String, field: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SchemaError>;
