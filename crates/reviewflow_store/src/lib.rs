//! Collaborator stores for the review pipeline.
//!
//! The pipeline talks to three external systems: a spreadsheet-like table
//! store, a document store holding the reviewed files, and an append-only
//! event log. Each is a trait here so the pipeline can run against the
//! in-memory backends in tests and against local backends from the CLI.
//!
//! # Backends
//!
//! - [`memory`]: in-process stores with fault injection and call counters
//! - [`workbook`]: one CSV file per table, locked with `fs2`
//! - [`local_docs`]: a directory tree addressed by stable file identities
//! - [`sqlite_log`]: the processing log in SQLite via `sqlx`
//!
//! [`TableAdapter`] wraps a table store with a resolved schema, conflict
//! retry and per-call timeouts.

pub mod adapter;
pub mod document;
pub mod error;
pub mod event_log;
pub mod file_uid;
pub mod local_docs;
pub mod memory;
pub mod retry;
pub mod sqlite_log;
pub mod table;
pub mod workbook;

pub use adapter::{IndexedRow, TableAdapter};
pub use document::{ConflictPolicy, CopyOperation, DocumentItem, DocumentMetadata, DocumentStore};
pub use error::{Result, StoreError};
pub use event_log::EventLog;
pub use local_docs::LocalDocumentStore;
pub use memory::{MemoryDocumentStore, MemoryEventLog, MemoryTableStore};
pub use retry::{retry_on_conflict, with_timeout, Retried, RetryPolicy};
pub use sqlite_log::SqliteEventLog;
pub use table::TableStore;
pub use workbook::CsvWorkbook;
