//! Processing log contract.

use crate::error::Result;
use async_trait::async_trait;
use reviewflow_protocol::{LogFilter, ProcessingLogEntry};

/// Append-only store of processing log entries.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Insert an entry and return its assigned id.
    async fn insert(&self, entry: &ProcessingLogEntry) -> Result<i64>;

    /// Matching entries, newest first.
    async fn query(&self, filter: &LogFilter, limit: usize) -> Result<Vec<ProcessingLogEntry>>;

    /// Number of matching entries.
    async fn count(&self, filter: &LogFilter) -> Result<u64> {
        Ok(self.query(filter, usize::MAX).await?.len() as u64)
    }
}
