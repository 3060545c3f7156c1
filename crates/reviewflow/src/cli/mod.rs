//! Command-line interface for the review pipeline.
//!
//! `run` drives the intake and routing loops until Ctrl-C; the other
//! commands each do one thing and exit.

pub mod archive;
pub mod cycle;
pub mod error;
pub mod init;
pub mod log;
pub mod output;
pub mod run;
pub mod stats;

use anyhow::{Context, Result};
use error::HelpfulError;
use reviewflow::{Pipeline, PipelineError, ReviewflowConfig, Services};
use reviewflow_store::SqliteEventLog;
use std::path::Path;

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<ReviewflowConfig> {
    ReviewflowConfig::load_or_default(path).map_err(|e| match e {
        PipelineError::Config(reason) => HelpfulError::invalid_config(path, &reason).into(),
        other => anyhow::Error::new(other),
    })
}

/// Open the local backends and build every component.
pub async fn open_pipeline(config: &ReviewflowConfig) -> Result<Pipeline> {
    let services = Services::local(config)
        .await
        .context("Failed to open local backends")?;
    let pipeline = Pipeline::build(config, services)
        .await
        .context("Failed to open review tables")?;
    Ok(pipeline)
}

/// Open only the event log, for read-only commands.
pub async fn open_event_log(config: &ReviewflowConfig) -> Result<SqliteEventLog> {
    let path = &config.backends.event_log_path;
    SqliteEventLog::open(path)
        .await
        .with_context(|| format!("Failed to open event log at {}", path.display()))
}
