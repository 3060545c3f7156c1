//! `reviewflow stats`: success and error counts per action.

use super::output::{print_json, print_table};
use anyhow::Result;
use reviewflow::ReviewflowConfig;
use reviewflow_protocol::{LogAction, LogFilter, LogStatus};
use reviewflow_store::EventLog;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub action: LogAction,
    pub success: u64,
    pub error: u64,
}

pub async fn collect(events: &dyn EventLog) -> Result<Vec<ActionCounts>> {
    let mut counts = Vec::with_capacity(LogAction::ALL.len());
    for action in LogAction::ALL {
        let base = LogFilter::new().action(*action);
        counts.push(ActionCounts {
            action: *action,
            success: events.count(&base.clone().status(LogStatus::Success)).await?,
            error: events.count(&base.status(LogStatus::Error)).await?,
        });
    }
    Ok(counts)
}

pub async fn run(config: &ReviewflowConfig, json: bool) -> Result<()> {
    let events = super::open_event_log(config).await?;
    let counts = collect(&events).await?;

    if json {
        return print_json(&counts);
    }
    let rows = counts
        .iter()
        .map(|c| vec![c.action.to_string(), c.success.to_string(), c.error.to_string()])
        .collect();
    print_table(&["Action", "Success", "Error"], rows);
    Ok(())
}
