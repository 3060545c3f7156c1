//! Table Schema Registry
//!
//! Review tables share field names but not column order: the secondary
//! review table inserts risk and comment columns mid-sequence, and the
//! archive table adds provenance columns on top of that. This crate owns
//! the only mapping between field names and physical column indices.
//!
//! # Core Concepts
//!
//! - **TableVariant**: which kind of review table a physical table is
//! - **TableSchema**: ordered columns of one variant, with field → index map
//! - **Remap**: decode a row with one schema, encode it with another, by name
//! - **Patch**: a partial update expressed as column index → value pairs

pub mod error;
pub mod registry;
pub mod schema;

pub use error::{Result, SchemaError};
pub use registry::{SchemaRegistry, TableVariant};
pub use schema::{default_for, remap, TableSchema};
