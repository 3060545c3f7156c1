//! Error types for the protocol layer.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// A file name that does not follow the naming convention.
///
/// Never retried: the file is skipped until someone renames it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("File name '{0}' has no extension")]
    MissingExtension(String),

    #[error(
        "File name '{0}' does not match 'Purpose - [TargetAudience -] DescriptiveName - yyyymmdd - Version.ext'"
    )]
    NoPatternMatched(String),

    #[error("File name '{name}' has an invalid version date '{date}'")]
    InvalidDate { name: String, date: String },
}

/// Protocol error type
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown log action: {0}")]
    UnknownAction(String),

    #[error("Unknown log status: {0}")]
    UnknownStatus(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
