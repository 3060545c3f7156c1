//! Archive Processor
//!
//! Sweeps completed rows from the review tables into the archive table at
//! the end of a sprint. For each source table the order is fixed:
//!
//! 1. copy each candidate's file into the sprint folder
//! 2. append every candidate to the archive table in one batched call
//! 3. only if that append succeeded, delete the candidates from the source,
//!    highest row index first
//!
//! A failed append leaves that table's source rows untouched. Other tables
//! are still processed, and the run reports a partial summary.
//!
//! A row whose file could not be copied stays in its source table. A row
//! already in the archive from an earlier, interrupted run (same
//! SourceTable and FileID) is not appended again; it goes straight to the
//! delete step.

use crate::audit;
use crate::error::{PipelineError, Result};
use crate::metrics::METRICS;
use chrono::Utc;
use reviewflow_protocol::defaults::COPY_PENDING_PREFIX;
use reviewflow_protocol::{format_timestamp, Field, LogAction, ProcessingLogEntry, ReviewRow, ReviewStatus};
use reviewflow_store::{with_timeout, ConflictPolicy, DocumentStore, EventLog, IndexedRow, TableAdapter};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Which rows of a source table are archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Rows whose status matches, aliases included
    Status(ReviewStatus),
}

impl Selection {
    pub fn from_config(select_status: Option<&str>) -> Self {
        match select_status {
            Some(status) => Self::Status(ReviewStatus::parse(status)),
            None => Self::All,
        }
    }

    pub fn matches(&self, row: &ReviewRow) -> bool {
        match self {
            Self::All => true,
            Self::Status(status) => row.status() == *status,
        }
    }
}

/// One table swept by the archive.
pub struct ArchiveSource {
    /// Written into SourceTable
    pub name: String,
    pub table: Arc<TableAdapter>,
    pub selection: Selection,
}

#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub root_folder_id: String,
    pub locate_attempts: u32,
    pub locate_delay: Duration,
    pub timeout: Duration,
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyFailure {
    pub source: String,
    pub file_id: String,
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    pub index: usize,
    pub file_id: String,
    pub reason: String,
}

/// What happened to one source table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub source: String,
    pub table_id: String,
    pub candidates: usize,
    pub archived: usize,
    /// Candidates an earlier run had already appended
    pub already_archived: usize,
    /// Candidates kept in the source because their copy failed
    pub copy_failed: usize,
    pub deleted: usize,
    pub read_error: Option<String>,
    pub append_error: Option<String>,
    pub delete_failures: Vec<DeleteFailure>,
}

impl TableOutcome {
    fn new(source: &ArchiveSource) -> Self {
        Self {
            source: source.name.clone(),
            table_id: source.table.table_id().to_string(),
            ..Self::default()
        }
    }

    /// Nothing from this table reached the archive.
    pub fn failed(&self) -> bool {
        self.read_error.is_some() || self.append_error.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Complete,
    Partial,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub sprint: String,
    pub folder_id: String,
    pub folder_created: bool,
    pub tables: Vec<TableOutcome>,
    pub copy_failures: Vec<CopyFailure>,
    /// Files whose copy never showed up; archived with a placeholder URL
    pub unresolved_copies: Vec<String>,
}

impl ArchiveSummary {
    pub fn total_archived(&self) -> usize {
        self.tables.iter().map(|t| t.archived).sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.tables.iter().map(|t| t.deleted).sum()
    }

    pub fn failed_tables(&self) -> Vec<&TableOutcome> {
        self.tables.iter().filter(|t| t.failed()).collect()
    }

    pub fn status(&self) -> RunStatus {
        let failed = self.failed_tables().len();
        let attempted = self
            .tables
            .iter()
            .filter(|t| t.candidates > 0 || t.read_error.is_some())
            .count();
        let degraded = !self.copy_failures.is_empty()
            || !self.unresolved_copies.is_empty()
            || self.tables.iter().any(|t| !t.delete_failures.is_empty());

        if failed > 0 && failed == attempted {
            RunStatus::Failed
        } else if failed > 0 || degraded {
            RunStatus::Partial
        } else {
            RunStatus::Complete
        }
    }
}

impl fmt::Display for ArchiveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Archive of '{}' {}: {} rows archived, {} source rows removed",
            self.sprint,
            self.status(),
            self.total_archived(),
            self.total_deleted()
        )?;
        for table in &self.tables {
            if let Some(e) = &table.read_error {
                writeln!(f, "  {}: FAILED to read: {}", table.source, e)?;
            } else if let Some(e) = &table.append_error {
                writeln!(
                    f,
                    "  {}: FAILED, {} rows kept in source: {}",
                    table.source, table.candidates, e
                )?;
            } else {
                write!(f, "  {}: {} archived, {} removed", table.source, table.archived, table.deleted)?;
                if table.already_archived > 0 {
                    write!(f, ", {} already archived", table.already_archived)?;
                }
                if table.copy_failed > 0 {
                    write!(f, ", {} kept after failed copy", table.copy_failed)?;
                }
                writeln!(f)?;
            }
            for d in &table.delete_failures {
                writeln!(f, "    could not remove row {} ({}): {}", d.index, d.file_id, d.reason)?;
            }
        }
        for c in &self.copy_failures {
            writeln!(f, "  copy failed for {} ({}): {}", c.file_name, c.source, c.reason)?;
        }
        for name in &self.unresolved_copies {
            writeln!(f, "  copy of {} not yet visible; placeholder URL used", name)?;
        }
        Ok(())
    }
}

// ============================================================================
// Processor
// ============================================================================

pub struct ArchiveProcessor {
    documents: Arc<dyn DocumentStore>,
    archive: Arc<TableAdapter>,
    sources: Vec<ArchiveSource>,
    events: Arc<dyn EventLog>,
    settings: ArchiveSettings,
    in_progress: Mutex<()>,
}

impl ArchiveProcessor {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        archive: Arc<TableAdapter>,
        sources: Vec<ArchiveSource>,
        events: Arc<dyn EventLog>,
        settings: ArchiveSettings,
    ) -> Self {
        Self {
            documents,
            archive,
            sources,
            events,
            settings,
            in_progress: Mutex::new(()),
        }
    }

    /// Archive every source table into `sprint`.
    ///
    /// Only one run may be in progress per processor.
    pub async fn archive_sprint(&self, sprint: &str) -> Result<ArchiveSummary> {
        let _guard = self
            .in_progress
            .try_lock()
            .map_err(|_| PipelineError::ArchiveAlreadyRunning)?;

        let sprint = sprint.trim();
        if sprint.is_empty() {
            return Err(PipelineError::InvalidInput("sprint name must not be empty".into()));
        }

        let (folder_id, folder_created) = self.resolve_folder(sprint).await?;
        info!(sprint, folder_id = %folder_id, created = folder_created, "Archiving sprint");

        let mut summary = ArchiveSummary {
            sprint: sprint.to_string(),
            folder_id,
            folder_created,
            tables: Vec::with_capacity(self.sources.len()),
            copy_failures: Vec::new(),
            unresolved_copies: Vec::new(),
        };
        let mut archived: HashSet<(String, String)> = self
            .archive
            .rows()
            .await?
            .into_iter()
            .map(|r| archive_key(r.row.get(Field::SourceTable), r.row.file_id()))
            .collect();

        let archived_on = format_timestamp(Utc::now());
        for source in &self.sources {
            let outcome = self
                .archive_source(source, sprint, &archived_on, &mut archived, &mut summary)
                .await;
            summary.tables.push(outcome);
        }

        METRICS.add_archived_rows(summary.total_archived() as u64);
        match summary.status() {
            RunStatus::Complete => info!("{}", summary),
            _ => warn!("{}", summary),
        }
        Ok(summary)
    }

    /// Reuse the sprint folder if it exists, else create it.
    async fn resolve_folder(&self, sprint: &str) -> Result<(String, bool)> {
        let root = &self.settings.root_folder_id;
        let existing = with_timeout(
            "find_child_by_name",
            self.settings.timeout,
            self.documents.find_child_by_name(root, sprint),
        )
        .await?;
        if let Some(item) = existing.filter(|i| i.is_folder) {
            return Ok((item.id, false));
        }
        let id = with_timeout(
            "create_folder",
            self.settings.timeout,
            self.documents.create_folder(root, sprint, ConflictPolicy::Rename),
        )
        .await?;
        Ok((id, true))
    }

    async fn archive_source(
        &self,
        source: &ArchiveSource,
        sprint: &str,
        archived_on: &str,
        archived: &mut HashSet<(String, String)>,
        summary: &mut ArchiveSummary,
    ) -> TableOutcome {
        let mut outcome = TableOutcome::new(source);

        let rows = match source.table.rows().await {
            Ok(rows) => rows,
            Err(e) => {
                error!(source = %source.name, "Cannot read source table: {}", e);
                outcome.read_error = Some(e.to_string());
                return outcome;
            }
        };
        let candidates: Vec<IndexedRow> = rows
            .into_iter()
            .filter(|r| source.selection.matches(&r.row))
            .collect();
        outcome.candidates = candidates.len();
        if candidates.is_empty() {
            debug!(source = %source.name, "Nothing to archive");
            return outcome;
        }

        let folder_id = summary.folder_id.clone();
        let mut batch = Vec::with_capacity(candidates.len());
        let mut doomed: Vec<&IndexedRow> = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let file_id = candidate.row.file_id();
            if archived.contains(&archive_key(&source.name, file_id)) {
                debug!(source = %source.name, file_id, "Already archived by an earlier run");
                outcome.already_archived += 1;
                doomed.push(candidate);
                continue;
            }

            let url = match self.copy_into_folder(&candidate.row, &folder_id, summary).await {
                Ok(url) => url,
                Err(e) => {
                    METRICS.inc_archive_copy_failures();
                    warn!(file = candidate.row.file_name(), file_id, "Copy into archive folder failed: {}", e);
                    audit::record(
                        self.events.as_ref(),
                        ProcessingLogEntry::error(
                            file_id,
                            LogAction::Archive,
                            format!("copy into {} failed, row kept in {}: {}", sprint, source.name, e),
                        ),
                    )
                    .await;
                    summary.copy_failures.push(CopyFailure {
                        source: source.name.clone(),
                        file_id: file_id.to_string(),
                        file_name: candidate.row.file_name().to_string(),
                        reason: e.to_string(),
                    });
                    outcome.copy_failed += 1;
                    continue;
                }
            };
            let mut row = candidate.row.clone();
            row.set(Field::FileUrl, url);
            row.set(Field::SourceTable, &source.name);
            row.set(Field::Sprint, sprint);
            row.set(Field::ArchivedOn, archived_on);
            row.set(Field::LastAction, format!("Archived to {sprint}"));
            batch.push(row);
            doomed.push(candidate);
        }

        if !batch.is_empty() {
            if let Err(e) = self.archive.append_batch(&batch).await {
                METRICS.inc_archive_append_failures();
                let violation = PipelineError::ArchiveInvariantViolation {
                    table: source.name.clone(),
                    reason: e.to_string(),
                };
                error!("{}", violation);
                for row in &batch {
                    audit::record(
                        self.events.as_ref(),
                        ProcessingLogEntry::error(row.file_id(), LogAction::Archive, violation.to_string()),
                    )
                    .await;
                }
                outcome.append_error = Some(violation.to_string());
                return outcome;
            }
            outcome.archived = batch.len();
            archived.extend(batch.iter().map(|r| archive_key(&source.name, r.file_id())));
        }

        // Highest index first, so earlier indices stay valid.
        doomed.sort_by(|a, b| b.index.cmp(&a.index));
        for candidate in doomed {
            let file_id = candidate.row.file_id();
            match source.table.delete(candidate.index, file_id).await {
                Ok(retries) => {
                    outcome.deleted += 1;
                    METRICS.inc_archive_rows_deleted();
                    METRICS.add_conflict_retries(retries);
                    audit::record(
                        self.events.as_ref(),
                        ProcessingLogEntry::success(
                            file_id,
                            LogAction::Archive,
                            format!("archived to {} from {}", sprint, source.name),
                        )
                        .with_retry_count(retries),
                    )
                    .await;
                }
                Err(e) => {
                    warn!(source = %source.name, row = candidate.index, "Archived row not removed from source: {}", e);
                    audit::record(
                        self.events.as_ref(),
                        ProcessingLogEntry::error(
                            file_id,
                            LogAction::Archive,
                            format!("archived to {} but not removed from {}: {}", sprint, source.name, e),
                        ),
                    )
                    .await;
                    outcome.delete_failures.push(DeleteFailure {
                        index: candidate.index,
                        file_id: file_id.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            source = %source.name,
            archived = outcome.archived,
            deleted = outcome.deleted,
            "Source table archived"
        );
        outcome
    }

    /// Copy a row's file into the sprint folder and return the URL to record.
    ///
    /// A copy that was accepted but never shows up is archived with a
    /// placeholder URL and noted in the summary. A rejected copy is an error.
    async fn copy_into_folder(&self, row: &ReviewRow, folder_id: &str, summary: &mut ArchiveSummary) -> Result<String> {
        let name = row.file_name();
        let file_id = row.file_id();
        let timeout = self.settings.timeout;

        // A file copied by an earlier, interrupted run is reused.
        match with_timeout("find_child_by_name", timeout, self.documents.find_child_by_name(folder_id, name)).await {
            Ok(Some(existing)) if !existing.is_folder => {
                debug!(file = name, "Archive copy already present");
                return Ok(existing.url);
            }
            Ok(_) => {}
            Err(e) => debug!(file = name, "Lookup before copy failed: {}", e),
        }

        with_timeout("copy_async", timeout, self.documents.copy_async(file_id, folder_id, name)).await?;

        for attempt in 1..=self.settings.locate_attempts {
            match with_timeout("find_child_by_name", timeout, self.documents.find_child_by_name(folder_id, name)).await {
                Ok(Some(copy)) if !copy.is_folder => return Ok(copy.url),
                Ok(_) => {}
                Err(e) => debug!(file = name, attempt, "Copy lookup failed: {}", e),
            }
            if attempt < self.settings.locate_attempts {
                tokio::time::sleep(self.settings.locate_delay).await;
            }
        }

        warn!(file = name, "Copy not visible after {} lookups", self.settings.locate_attempts);
        summary.unresolved_copies.push(name.to_string());
        Ok(format!("{COPY_PENDING_PREFIX} {name}"))
    }
}

/// Identity of an archived row: the table it came from and its FileID.
fn archive_key(source: &str, file_id: &str) -> (String, String) {
    (source.to_string(), file_id.to_string())
}
