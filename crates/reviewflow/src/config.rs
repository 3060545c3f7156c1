//! Configuration for the review pipeline
//!
//! Loaded from `<home>/config.toml`. Every field has a default, so an empty
//! file (or no file at all) yields a runnable local setup.

use crate::error::{PipelineError, Result};
use reviewflow_protocol::defaults::{
    DEFAULT_INTAKE_INTERVAL_SECS, DEFAULT_PRIORITY, DEFAULT_REMOTE_TIMEOUT_SECS,
    DEFAULT_ROUTER_INTERVAL_SECS,
};
use reviewflow_protocol::status::{FAST_TRACK, NEEDS_SECONDARY_REVIEW};
use reviewflow_schema::TableVariant;
use reviewflow_store::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewflowConfig {
    #[serde(default)]
    pub tables: TablesConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub backends: BackendConfig,
}

/// Table ids in the table store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablesConfig {
    #[serde(default = "default_intake_table")]
    pub intake: String,
    #[serde(default = "default_secondary_table")]
    pub secondary_review: String,
    #[serde(default = "default_archive_table")]
    pub archive: String,
}

fn default_intake_table() -> String {
    "intake".to_string()
}

fn default_secondary_table() -> String {
    "secondary_review".to_string()
}

fn default_archive_table() -> String {
    "archive".to_string()
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            intake: default_intake_table(),
            secondary_review: default_secondary_table(),
            archive: default_archive_table(),
        }
    }
}

impl TablesConfig {
    pub fn id_for(&self, variant: TableVariant) -> &str {
        match variant {
            TableVariant::Intake => &self.intake,
            TableVariant::SecondaryReview => &self.secondary_review,
            TableVariant::Archive => &self.archive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Document store folder watched for new uploads
    #[serde(default = "default_intake_folder")]
    pub folder_id: String,
    #[serde(default = "default_intake_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_priority")]
    pub default_priority: String,
}

fn default_intake_folder() -> String {
    "intake".to_string()
}

fn default_intake_interval() -> u64 {
    DEFAULT_INTAKE_INTERVAL_SECS
}

fn default_priority() -> String {
    DEFAULT_PRIORITY.to_string()
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            folder_id: default_intake_folder(),
            poll_interval_secs: default_intake_interval(),
            default_priority: default_priority(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_router_interval")]
    pub poll_interval_secs: u64,
    /// Folder fast-tracked files are moved into
    #[serde(default = "default_closed_folder")]
    pub closed_folder_id: String,
}

fn default_router_interval() -> u64 {
    DEFAULT_ROUTER_INTERVAL_SECS
}

fn default_closed_folder() -> String {
    "closed".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_router_interval(),
            closed_folder_id: default_closed_folder(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Folder under which per-sprint archive folders are created
    #[serde(default = "default_archive_root")]
    pub root_folder_id: String,
    /// How many times to look for a copy before using a placeholder URL
    #[serde(default = "default_locate_attempts")]
    pub locate_attempts: u32,
    #[serde(default = "default_locate_delay_ms")]
    pub locate_delay_ms: u64,
    /// Tables swept into the archive, in order
    #[serde(default = "default_archive_sources")]
    pub sources: Vec<ArchiveSourceConfig>,
}

/// One table to archive and which of its rows qualify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSourceConfig {
    /// Written into each archived row's SourceTable column
    pub name: String,
    pub table: TableVariant,
    /// Only rows with this status; every row when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_status: Option<String>,
}

fn default_archive_root() -> String {
    "archive".to_string()
}

fn default_locate_attempts() -> u32 {
    5
}

fn default_locate_delay_ms() -> u64 {
    2_000
}

fn default_archive_sources() -> Vec<ArchiveSourceConfig> {
    vec![
        ArchiveSourceConfig {
            name: "intake".to_string(),
            table: TableVariant::Intake,
            select_status: Some(FAST_TRACK.to_string()),
        },
        ArchiveSourceConfig {
            name: "secondary_review".to_string(),
            table: TableVariant::SecondaryReview,
            select_status: None,
        },
    ]
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root_folder_id: default_archive_root(),
            locate_attempts: default_locate_attempts(),
            locate_delay_ms: default_locate_delay_ms(),
            sources: default_archive_sources(),
        }
    }
}

impl ArchiveConfig {
    pub fn locate_delay(&self) -> Duration {
        Duration::from_millis(self.locate_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Upper bound on any single store call
    #[serde(default = "default_remote_timeout")]
    pub remote_call_secs: u64,
}

fn default_remote_timeout() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            remote_call_secs: default_remote_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn remote_call(&self) -> Duration {
        Duration::from_secs(self.remote_call_secs)
    }
}

/// Locations of the local backends used by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_workbook_dir")]
    pub workbook_dir: PathBuf,
    #[serde(default = "default_documents_root")]
    pub documents_root: PathBuf,
    #[serde(default = "default_event_log_path")]
    pub event_log_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_workbook_dir() -> PathBuf {
    reviewflow_logging::reviewflow_home().join("tables")
}

fn default_documents_root() -> PathBuf {
    reviewflow_logging::reviewflow_home().join("documents")
}

fn default_event_log_path() -> PathBuf {
    reviewflow_logging::reviewflow_home().join("processing_log.sqlite3")
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            workbook_dir: default_workbook_dir(),
            documents_root: default_documents_root(),
            event_log_path: default_event_log_path(),
            log_dir: None,
        }
    }
}

/// Default config file location: `<home>/config.toml`.
pub fn default_config_path() -> PathBuf {
    reviewflow_logging::reviewflow_home().join("config.toml")
}

impl ReviewflowConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if it exists, else defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ReviewflowConfig =
            toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::Config(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, content)
            .map_err(|e| PipelineError::Config(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.intake.poll_interval_secs == 0 || self.router.poll_interval_secs == 0 {
            return Err(PipelineError::Config("poll intervals must be at least 1 second".into()));
        }
        if self.timeouts.remote_call_secs == 0 {
            return Err(PipelineError::Config("remote_call_secs must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(PipelineError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        for source in &self.archive.sources {
            if source.table == TableVariant::Archive {
                return Err(PipelineError::Config(format!(
                    "archive source '{}' cannot be the archive table itself",
                    source.name
                )));
            }
        }
        Ok(())
    }
}
