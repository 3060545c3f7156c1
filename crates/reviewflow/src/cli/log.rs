//! `reviewflow log`: query the processing log.

use super::error::HelpfulError;
use super::output::{format_time, print_json, print_table, truncate};
use anyhow::Result;
use reviewflow::ReviewflowConfig;
use reviewflow_protocol::{LogAction, LogFilter, LogStatus};
use reviewflow_store::EventLog;

#[derive(Debug)]
pub struct LogArgs {
    pub file_id: Option<String>,
    pub action: Option<String>,
    pub status: Option<String>,
    pub limit: usize,
    pub json: bool,
}

const DETAILS_WIDTH: usize = 60;

pub async fn run(config: &ReviewflowConfig, args: LogArgs) -> Result<()> {
    let filter = build_filter(&args)?;
    let events = super::open_event_log(config).await?;
    let entries = events.query(&filter, args.limit).await?;

    if args.json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No matching log entries.");
        return Ok(());
    }

    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.id.map(|id| id.to_string()).unwrap_or_default(),
                format_time(&e.timestamp),
                e.file_id.clone(),
                e.action.to_string(),
                e.status.to_string(),
                e.retry_count.to_string(),
                truncate(&e.details, DETAILS_WIDTH),
            ]
        })
        .collect();
    print_table(&["ID", "Time", "File ID", "Action", "Status", "Retries", "Details"], rows);
    Ok(())
}

fn build_filter(args: &LogArgs) -> Result<LogFilter> {
    let mut filter = LogFilter::new();
    if let Some(file_id) = &args.file_id {
        filter = filter.file_id(file_id.clone());
    }
    if let Some(action) = &args.action {
        let parsed = LogAction::parse(action).ok_or_else(|| {
            let valid: Vec<&str> = LogAction::ALL.iter().map(|a| a.as_str()).collect();
            HelpfulError::invalid_filter("action", action, &valid)
        })?;
        filter = filter.action(parsed);
    }
    if let Some(status) = &args.status {
        let parsed = LogStatus::parse(status)
            .ok_or_else(|| HelpfulError::invalid_filter("status", status, &["success", "error"]))?;
        filter = filter.status(parsed);
    }
    Ok(filter)
}
