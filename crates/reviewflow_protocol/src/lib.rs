//! Reviewflow Protocol
//!
//! Vocabulary shared by every stage of the review pipeline: the named
//! fields a review row carries, the status values the router understands,
//! the processing log entries written for auditing, and the document
//! naming convention intake relies on.

pub mod defaults;
pub mod error;
pub mod fields;
pub mod filename;
pub mod log;
pub mod row;
pub mod status;

pub use error::{ParseError, ProtocolError, Result};
pub use fields::Field;
pub use filename::{parse_file_name, NamePattern, ParsedFileName};
pub use log::{LogAction, LogFilter, LogStatus, ProcessingLogEntry};
pub use row::{format_timestamp, ReviewRow};
pub use status::ReviewStatus;
