//! Content review routing and archival pipeline.
//!
//! Three components share the review tables:
//!
//! - **Intake Monitor** ([`intake`]): registers new uploads as `pending` rows
//! - **Status Router** ([`router`]): acts on reviewer decisions, copying rows
//!   to the secondary review table or moving files to closed review
//! - **Archive Processor** ([`archive`]): moves a sprint's finished rows and
//!   files into the archive, never deleting a row it has not written
//!
//! Intake and routing run as [`runner::PollingLoop`]s; archiving is started
//! by hand for a named sprint.

pub mod archive;
pub mod audit;
pub mod config;
pub mod error;
pub mod intake;
pub mod metrics;
pub mod pipeline;
pub mod router;
pub mod runner;

pub use archive::{ArchiveProcessor, ArchiveSummary, RunStatus, Selection};
pub use config::ReviewflowConfig;
pub use error::{PipelineError, Result};
pub use intake::{IntakeMonitor, IntakeReport};
pub use metrics::METRICS;
pub use pipeline::{Pipeline, Services};
pub use router::{RouterReport, StatusRouter};
pub use runner::{Cycle, LoopState, PollingLoop};
