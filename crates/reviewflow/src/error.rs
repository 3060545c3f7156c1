//! Pipeline error taxonomy.

use crate::runner::LoopState;
use reviewflow_protocol::{ParseError, ProtocolError};
use reviewflow_schema::SchemaError;
use reviewflow_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The file a row points at is gone from the document store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Archive append failed, so the table's source rows were kept.
    #[error("Archive append for '{table}' failed; source rows kept: {reason}")]
    ArchiveInvariantViolation { table: String, reason: String },

    #[error("An archive run is already in progress")]
    ArchiveAlreadyRunning,

    #[error("Cannot {action} a loop that is {state}")]
    LoopState { action: &'static str, state: LoopState },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether the error came from a failed remote call rather than bad data.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transport())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
