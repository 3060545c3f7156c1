//! Intake Monitor
//!
//! Polls the intake folder and registers each new file as a `pending` row in
//! the intake table. Registration is idempotent: a file already recorded in
//! the processing log, or already present in the table, is skipped.

use crate::audit;
use crate::error::{PipelineError, Result};
use crate::metrics::METRICS;
use crate::runner::Cycle;
use async_trait::async_trait;
use chrono::Utc;
use reviewflow_protocol::status::PENDING;
use reviewflow_protocol::{
    format_timestamp, parse_file_name, Field, LogAction, LogFilter, LogStatus, ParsedFileName,
    ProcessingLogEntry, ReviewRow,
};
use reviewflow_store::{with_timeout, DocumentItem, DocumentMetadata, DocumentStore, EventLog, TableAdapter};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counts from one intake cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntakeReport {
    /// Files (not folders) seen in the intake folder
    pub listed: usize,
    pub registered: usize,
    pub skipped: usize,
    pub parse_failures: usize,
    /// Files that failed for any other reason, with the error
    pub errors: Vec<(String, String)>,
}

impl fmt::Display for IntakeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} listed, {} registered, {} skipped, {} unparseable, {} errors",
            self.listed,
            self.registered,
            self.skipped,
            self.parse_failures,
            self.errors.len()
        )
    }
}

enum Registration {
    Registered,
    Skipped(&'static str),
}

pub struct IntakeMonitor {
    documents: Arc<dyn DocumentStore>,
    table: Arc<TableAdapter>,
    events: Arc<dyn EventLog>,
    folder_id: String,
    default_priority: String,
    timeout: Duration,
}

impl IntakeMonitor {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        table: Arc<TableAdapter>,
        events: Arc<dyn EventLog>,
        folder_id: impl Into<String>,
        default_priority: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            documents,
            table,
            events,
            folder_id: folder_id.into(),
            default_priority: default_priority.into(),
            timeout,
        }
    }

    /// Register every unregistered file in the intake folder.
    ///
    /// A failure listing the folder or reading the table aborts the cycle.
    /// Failures on individual files are logged and the cycle moves on.
    pub async fn check_for_new_files(&self) -> Result<IntakeReport> {
        let items = with_timeout("list intake folder", self.timeout, self.documents.list(&self.folder_id)).await?;
        let mut known: HashSet<String> = self
            .table
            .rows()
            .await?
            .into_iter()
            .map(|r| r.row.file_id().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        let mut report = IntakeReport::default();
        for item in items.iter().filter(|i| !i.is_folder) {
            report.listed += 1;
            match self.register(item, &mut known).await {
                Ok(Registration::Registered) => {
                    report.registered += 1;
                    METRICS.inc_intake_registered();
                }
                Ok(Registration::Skipped(reason)) => {
                    debug!(file = %item.name, "Skipping file already in the {}", reason);
                    report.skipped += 1;
                    METRICS.inc_intake_skipped();
                }
                Err(PipelineError::Parse(e)) => {
                    report.parse_failures += 1;
                    METRICS.inc_intake_parse_failures();
                    warn!(file = %item.name, "Cannot parse file name: {}", e);
                    audit::record(
                        self.events.as_ref(),
                        ProcessingLogEntry::error(&item.id, LogAction::Intake, e.to_string()),
                    )
                    .await;
                }
                Err(e) => {
                    if e.is_transport() {
                        METRICS.inc_transport_errors();
                    }
                    warn!(file = %item.name, "Intake failed: {}", e);
                    audit::record(
                        self.events.as_ref(),
                        ProcessingLogEntry::error(&item.id, LogAction::Intake, e.to_string()),
                    )
                    .await;
                    report.errors.push((item.name.clone(), e.to_string()));
                }
            }
        }

        if report.registered > 0 || report.parse_failures > 0 || !report.errors.is_empty() {
            info!("Intake cycle: {}", report);
        } else {
            debug!("Intake cycle: {}", report);
        }
        Ok(report)
    }

    async fn register(&self, item: &DocumentItem, known: &mut HashSet<String>) -> Result<Registration> {
        if let Some(reason) = self.already_registered(&item.id, known).await? {
            audit::record(
                self.events.as_ref(),
                ProcessingLogEntry::success(&item.id, LogAction::IntakeSkipped, format!("already existed ({reason})")),
            )
            .await;
            return Ok(Registration::Skipped(reason));
        }

        let parsed = parse_file_name(&item.name)?;
        let metadata = with_timeout("get_metadata", self.timeout, self.documents.get_metadata(&item.id)).await?;
        let row = build_intake_row(item, &parsed, &metadata, &self.default_priority);

        self.table.append(&row).await?;
        known.insert(item.id.clone());

        info!(file = %item.name, file_id = %item.id, "Registered new file");
        audit::record(
            self.events.as_ref(),
            ProcessingLogEntry::success(
                &item.id,
                LogAction::Intake,
                format!("registered {} ({} bytes)", item.name, metadata.size),
            ),
        )
        .await;
        Ok(Registration::Registered)
    }

    /// Reason the file is already known, if it is.
    async fn already_registered(&self, file_id: &str, known: &HashSet<String>) -> Result<Option<&'static str>> {
        let filter = LogFilter::new()
            .file_id(file_id)
            .action(LogAction::Intake)
            .status(LogStatus::Success);
        let logged = with_timeout("query processing log", self.timeout, self.events.query(&filter, 1)).await?;
        if !logged.is_empty() {
            return Ok(Some("processing log"));
        }
        if known.contains(file_id) {
            return Ok(Some("intake table"));
        }
        Ok(None)
    }
}

/// Intake row for a newly uploaded file.
pub fn build_intake_row(
    item: &DocumentItem,
    parsed: &ParsedFileName,
    metadata: &DocumentMetadata,
    priority: &str,
) -> ReviewRow {
    ReviewRow::new()
        .with(Field::FileId, &item.id)
        .with(Field::FileName, &item.name)
        .with(Field::FileUrl, &metadata.url)
        .with(Field::Purpose, &parsed.purpose)
        .with(Field::TargetAudience, &parsed.target_audience)
        .with(Field::DescriptiveName, &parsed.descriptive_name)
        .with(Field::VersionDate, parsed.version_date_iso())
        .with(Field::Version, &parsed.version)
        .with(Field::Uploader, &metadata.uploader)
        .with(Field::CreatedAt, format_timestamp(metadata.created_at))
        .with(Field::Priority, priority)
        .with(Field::Status, PENDING)
        .with(Field::ReviewerComment, "")
        .with(Field::RoutedOn, "")
        .with(Field::LastAction, format!("Registered {}", format_timestamp(Utc::now())))
        .with(Field::Error, "")
}

#[async_trait]
impl Cycle for IntakeMonitor {
    type Report = IntakeReport;

    fn name(&self) -> &'static str {
        "intake"
    }

    async fn run_cycle(&self) -> Result<IntakeReport> {
        self.check_for_new_files().await
    }
}
