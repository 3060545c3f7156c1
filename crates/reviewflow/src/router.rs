//! Status Router
//!
//! Scans the intake table for reviewed rows and carries out the transition
//! their status asks for:
//!
//! - `needs-secondary-review` (or an alias): copy the row into the secondary
//!   review table by field name, then stamp the source row as routed
//! - `fast-track`: move the file into the closed-review folder, then stamp
//!   the source row
//!
//! A row with a non-blank `RoutedOn` is never touched again. Failures are
//! isolated to the row they happen on.

use crate::audit;
use crate::error::{PipelineError, Result};
use crate::metrics::METRICS;
use crate::runner::Cycle;
use async_trait::async_trait;
use chrono::Utc;
use reviewflow_protocol::defaults::FAST_TRACK_NOT_MOVED;
use reviewflow_protocol::{format_timestamp, Field, LogAction, ProcessingLogEntry, ReviewRow, ReviewStatus};
use reviewflow_store::{with_timeout, DocumentStore, EventLog, IndexedRow, TableAdapter};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const COPIED_TO_SECONDARY: &str = "Copied to secondary review";
const ALREADY_IN_SECONDARY: &str = "Already in secondary review";
const RECEIVED_FROM_INTAKE: &str = "Received from intake";
const MOVED_TO_CLOSED: &str = "Moved to closed review";

/// A row the router could not transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub index: usize,
    pub file_id: String,
    pub error: String,
}

/// Counts from one routing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouterReport {
    pub scanned: usize,
    /// Rows skipped because RoutedOn was already set
    pub already_routed: usize,
    /// Rows whose status needs no routing
    pub no_action: usize,
    pub secondary_review: usize,
    /// Secondary-review rows whose FileID was already in the destination
    pub already_migrated: usize,
    pub fast_tracked: usize,
    pub conflict_retries: u32,
    pub failures: Vec<RowFailure>,
}

impl fmt::Display for RouterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scanned, {} to secondary review ({} already there), {} fast-tracked, {} already routed, {} failed",
            self.scanned,
            self.secondary_review,
            self.already_migrated,
            self.fast_tracked,
            self.already_routed,
            self.failures.len()
        )
    }
}

enum Routed {
    Secondary { retries: u32 },
    AlreadyMigrated { retries: u32 },
    FastTracked { retries: u32 },
}

pub struct StatusRouter {
    documents: Arc<dyn DocumentStore>,
    source: Arc<TableAdapter>,
    destination: Arc<TableAdapter>,
    events: Arc<dyn EventLog>,
    closed_folder_id: String,
    timeout: Duration,
}

impl StatusRouter {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        source: Arc<TableAdapter>,
        destination: Arc<TableAdapter>,
        events: Arc<dyn EventLog>,
        closed_folder_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            documents,
            source,
            destination,
            events,
            closed_folder_id: closed_folder_id.into(),
            timeout,
        }
    }

    /// One pass over the intake table.
    pub async fn route_once(&self) -> Result<RouterReport> {
        let rows = self.source.rows().await?;

        // FileIDs already in the destination, read on first use.
        let mut migrated: Option<HashSet<String>> = None;

        let mut report = RouterReport::default();
        for IndexedRow { index, row } in rows {
            report.scanned += 1;
            if row.is_routed() {
                report.already_routed += 1;
                continue;
            }

            let (action, result) = match row.status() {
                ReviewStatus::NeedsSecondaryReview => (
                    LogAction::RouteSecondaryReview,
                    self.route_to_secondary(index, &row, &mut migrated).await,
                ),
                ReviewStatus::FastTrack => (LogAction::RouteFastTrack, self.fast_track(index, &row).await),
                _ => {
                    report.no_action += 1;
                    continue;
                }
            };

            match result {
                Ok(routed) => self.record_success(&row, action, routed, &mut report).await,
                Err(e) => {
                    METRICS.inc_route_failures();
                    if e.is_transport() {
                        METRICS.inc_transport_errors();
                    }
                    warn!(file_id = %row.file_id(), row = index, "Routing failed: {}", e);
                    audit::record(
                        self.events.as_ref(),
                        ProcessingLogEntry::error(row.file_id(), action, e.to_string()),
                    )
                    .await;
                    report.failures.push(RowFailure {
                        index,
                        file_id: row.file_id().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.secondary_review + report.fast_tracked > 0 || !report.failures.is_empty() {
            info!("Routing pass: {}", report);
        } else {
            debug!("Routing pass: {}", report);
        }
        Ok(report)
    }

    async fn record_success(&self, row: &ReviewRow, action: LogAction, routed: Routed, report: &mut RouterReport) {
        let (details, retries) = match routed {
            Routed::Secondary { retries } => {
                report.secondary_review += 1;
                METRICS.inc_routed_secondary();
                (COPIED_TO_SECONDARY.to_string(), retries)
            }
            Routed::AlreadyMigrated { retries } => {
                report.already_migrated += 1;
                METRICS.inc_routed_secondary();
                (format!("{ALREADY_IN_SECONDARY}; source row marked routed"), retries)
            }
            Routed::FastTracked { retries } => {
                report.fast_tracked += 1;
                METRICS.inc_routed_fast_track();
                (MOVED_TO_CLOSED.to_string(), retries)
            }
        };
        report.conflict_retries += retries;
        METRICS.add_conflict_retries(retries);
        audit::record(
            self.events.as_ref(),
            ProcessingLogEntry::success(row.file_id(), action, details).with_retry_count(retries),
        )
        .await;
    }

    async fn route_to_secondary(
        &self,
        index: usize,
        row: &ReviewRow,
        migrated: &mut Option<HashSet<String>>,
    ) -> Result<Routed> {
        let file_id = row.file_id();
        if file_id.is_empty() {
            return Err(PipelineError::InvalidInput(format!("row {index} has no FileID")));
        }

        if migrated.is_none() {
            let ids = self
                .destination
                .rows()
                .await?
                .into_iter()
                .map(|r| r.row.file_id().to_string())
                .collect();
            *migrated = Some(ids);
        }
        let migrated = migrated.get_or_insert_with(HashSet::new);

        let already_there = migrated.contains(file_id);
        if !already_there {
            let mut copy = row.clone();
            copy.set(Field::RoutedOn, "");
            copy.set(Field::LastAction, RECEIVED_FROM_INTAKE);
            copy.set(Field::Error, "");
            self.destination.append(&copy).await?;
            migrated.insert(file_id.to_string());
        }

        let last_action = if already_there {
            ALREADY_IN_SECONDARY
        } else {
            COPIED_TO_SECONDARY
        };
        let retries = self.source.update(index, file_id, &routed_stamp(last_action, "")).await?;

        Ok(if already_there {
            Routed::AlreadyMigrated { retries }
        } else {
            Routed::Secondary { retries }
        })
    }

    async fn fast_track(&self, index: usize, row: &ReviewRow) -> Result<Routed> {
        let file_id = row.file_id();
        let exists = !file_id.is_empty()
            && with_timeout("exists", self.timeout, self.documents.exists(file_id)).await?;

        if !exists {
            let message = format!("File {file_id} no longer exists in the document store");
            // Stamped so the row is not retried every cycle.
            self.source
                .update(index, file_id, &routed_stamp(FAST_TRACK_NOT_MOVED, &message))
                .await?;
            return Err(PipelineError::NotFound(message));
        }

        with_timeout(
            "move_item",
            self.timeout,
            self.documents.move_item(file_id, &self.closed_folder_id),
        )
        .await?;
        let retries = self.source.update(index, file_id, &routed_stamp(MOVED_TO_CLOSED, "")).await?;
        Ok(Routed::FastTracked { retries })
    }
}

fn routed_stamp(last_action: &str, error: &str) -> [(Field, String); 3] {
    [
        (Field::RoutedOn, format_timestamp(Utc::now())),
        (Field::LastAction, last_action.to_string()),
        (Field::Error, error.to_string()),
    ]
}

#[async_trait]
impl Cycle for StatusRouter {
    type Report = RouterReport;

    fn name(&self) -> &'static str {
        "router"
    }

    async fn run_cycle(&self) -> Result<RouterReport> {
        self.route_once().await
    }
}
