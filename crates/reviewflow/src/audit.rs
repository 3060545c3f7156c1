//! Writing processing log entries.

use reviewflow_protocol::ProcessingLogEntry;
use reviewflow_store::EventLog;
use tracing::warn;

/// Insert an entry, logging instead of failing if the event log is down.
///
/// The table write the entry describes has already happened; losing the
/// audit record must not undo or repeat it.
pub async fn record(events: &dyn EventLog, entry: ProcessingLogEntry) {
    if let Err(e) = events.insert(&entry).await {
        warn!(
            file_id = %entry.file_id,
            action = %entry.action,
            "Failed to write processing log entry: {}",
            e
        );
    }
}
