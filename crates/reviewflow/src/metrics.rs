//! Process-wide pipeline counters.
//!
//! Lock-free atomics, read through [`Metrics::snapshot`] by the `stats`
//! command and logged at the end of each cycle.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    pub intake_registered: AtomicU64,
    pub intake_skipped: AtomicU64,
    pub intake_parse_failures: AtomicU64,

    pub routed_secondary: AtomicU64,
    pub routed_fast_track: AtomicU64,
    pub route_failures: AtomicU64,

    pub archived_rows: AtomicU64,
    pub archive_rows_deleted: AtomicU64,
    pub archive_append_failures: AtomicU64,
    pub archive_copy_failures: AtomicU64,

    pub conflict_retries: AtomicU64,
    pub transport_errors: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            intake_registered: AtomicU64::new(0),
            intake_skipped: AtomicU64::new(0),
            intake_parse_failures: AtomicU64::new(0),
            routed_secondary: AtomicU64::new(0),
            routed_fast_track: AtomicU64::new(0),
            route_failures: AtomicU64::new(0),
            archived_rows: AtomicU64::new(0),
            archive_rows_deleted: AtomicU64::new(0),
            archive_append_failures: AtomicU64::new(0),
            archive_copy_failures: AtomicU64::new(0),
            conflict_retries: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc_intake_registered(&self) {
        self.intake_registered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_intake_skipped(&self) {
        self.intake_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_intake_parse_failures(&self) {
        self.intake_parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_routed_secondary(&self) {
        self.routed_secondary.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_routed_fast_track(&self) {
        self.routed_fast_track.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_route_failures(&self) {
        self.route_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_archived_rows(&self, n: u64) {
        self.archived_rows.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_archive_rows_deleted(&self) {
        self.archive_rows_deleted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_archive_append_failures(&self) {
        self.archive_append_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_archive_copy_failures(&self) {
        self.archive_copy_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_conflict_retries(&self, n: u32) {
        self.conflict_retries.fetch_add(u64::from(n), Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_transport_errors(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            intake_registered: self.intake_registered.load(Ordering::Relaxed),
            intake_skipped: self.intake_skipped.load(Ordering::Relaxed),
            intake_parse_failures: self.intake_parse_failures.load(Ordering::Relaxed),
            routed_secondary: self.routed_secondary.load(Ordering::Relaxed),
            routed_fast_track: self.routed_fast_track.load(Ordering::Relaxed),
            route_failures: self.route_failures.load(Ordering::Relaxed),
            archived_rows: self.archived_rows.load(Ordering::Relaxed),
            archive_rows_deleted: self.archive_rows_deleted.load(Ordering::Relaxed),
            archive_append_failures: self.archive_append_failures.load(Ordering::Relaxed),
            archive_copy_failures: self.archive_copy_failures.load(Ordering::Relaxed),
            conflict_retries: self.conflict_retries.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub intake_registered: u64,
    pub intake_skipped: u64,
    pub intake_parse_failures: u64,
    pub routed_secondary: u64,
    pub routed_fast_track: u64,
    pub route_failures: u64,
    pub archived_rows: u64,
    pub archive_rows_deleted: u64,
    pub archive_append_failures: u64,
    pub archive_copy_failures: u64,
    pub conflict_retries: u64,
    pub transport_errors: u64,
}

impl MetricsSnapshot {
    /// Counter name and value pairs, for tabular output.
    pub fn rows(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("intake_registered", self.intake_registered),
            ("intake_skipped", self.intake_skipped),
            ("intake_parse_failures", self.intake_parse_failures),
            ("routed_secondary", self.routed_secondary),
            ("routed_fast_track", self.routed_fast_track),
            ("route_failures", self.route_failures),
            ("archived_rows", self.archived_rows),
            ("archive_rows_deleted", self.archive_rows_deleted),
            ("archive_append_failures", self.archive_append_failures),
            ("archive_copy_failures", self.archive_copy_failures),
            ("conflict_retries", self.conflict_retries),
            ("transport_errors", self.transport_errors),
        ]
    }

    pub fn summary(&self) -> String {
        format!(
            "Intake: {} registered, {} skipped, {} unparseable | \
             Routing: {} secondary, {} fast-track, {} failed | \
             Archive: {} rows, {} removed, {} append failures | Conflict retries: {}",
            self.intake_registered,
            self.intake_skipped,
            self.intake_parse_failures,
            self.routed_secondary,
            self.routed_fast_track,
            self.route_failures,
            self.archived_rows,
            self.archive_rows_deleted,
            self.archive_append_failures,
            self.conflict_retries,
        )
    }
}
