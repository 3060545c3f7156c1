//! Processing log entries.
//!
//! Append-only audit records written for every intake, routing and archive
//! decision. Entries are never mutated after insertion.

use crate::error::ProtocolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the pipeline did (or tried to do) with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    /// A new intake row was registered
    Intake,
    /// Intake found the file already registered
    IntakeSkipped,
    /// Router copied the row into the secondary review table
    RouteSecondaryReview,
    /// Router moved the file to the closed-review folder
    RouteFastTrack,
    /// Archive processor migrated the row
    Archive,
}

impl LogAction {
    pub const ALL: &'static [LogAction] = &[
        LogAction::Intake,
        LogAction::IntakeSkipped,
        LogAction::RouteSecondaryReview,
        LogAction::RouteFastTrack,
        LogAction::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::IntakeSkipped => "intake_skipped",
            Self::RouteSecondaryReview => "route_secondary_review",
            Self::RouteFastTrack => "route_fast_track",
            Self::Archive => "archive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().find(|a| a.as_str() == s).copied()
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogAction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ProtocolError::UnknownAction(s.to_string()))
    }
}

/// Outcome of a logged decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Error,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ProtocolError::UnknownStatus(s.to_string()))
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingLogEntry {
    /// Store-assigned id (None until inserted)
    pub id: Option<i64>,
    pub file_id: String,
    pub action: LogAction,
    pub status: LogStatus,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    /// Conflict retries spent before the outcome was reached
    pub retry_count: u32,
}

impl ProcessingLogEntry {
    pub fn new(
        file_id: impl Into<String>,
        action: LogAction,
        status: LogStatus,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            file_id: file_id.into(),
            action,
            status,
            details: details.into(),
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }

    pub fn success(file_id: impl Into<String>, action: LogAction, details: impl Into<String>) -> Self {
        Self::new(file_id, action, LogStatus::Success, details)
    }

    pub fn error(file_id: impl Into<String>, action: LogAction, details: impl Into<String>) -> Self {
        Self::new(file_id, action, LogStatus::Error, details)
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// Query filter for the event log. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub file_id: Option<String>,
    pub action: Option<LogAction>,
    pub status: Option<LogStatus>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn action(mut self, action: LogAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn status(mut self, status: LogStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, entry: &ProcessingLogEntry) -> bool {
        self.file_id.as_deref().map_or(true, |id| id == entry.file_id)
            && self.action.map_or(true, |a| a == entry.action)
            && self.status.map_or(true, |s| s == entry.status)
    }
}
