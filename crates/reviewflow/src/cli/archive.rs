//! `reviewflow archive <sprint>`

use super::output::{print_json, print_table};
use anyhow::Result;
use reviewflow::{ArchiveSummary, ReviewflowConfig, RunStatus};

/// Exit code for a run that kept some rows in their source tables.
pub const EXIT_INCOMPLETE: u8 = 2;

/// Archive the sprint and report. Returns the process exit code.
pub async fn run(config: &ReviewflowConfig, sprint: &str, json: bool) -> Result<u8> {
    let pipeline = super::open_pipeline(config).await?;
    let summary = pipeline.archive.archive_sprint(sprint).await?;

    if json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
    }

    Ok(exit_code(summary.status()))
}

fn exit_code(status: RunStatus) -> u8 {
    match status {
        RunStatus::Complete => 0,
        RunStatus::Partial | RunStatus::Failed => EXIT_INCOMPLETE,
    }
}

fn print_summary(summary: &ArchiveSummary) {
    let rows = summary
        .tables
        .iter()
        .map(|t| {
            let outcome = match (&t.read_error, &t.append_error) {
                (Some(e), _) => format!("read failed: {}", e),
                (None, Some(e)) => format!("append failed, rows kept: {}", e),
                (None, None) if !t.delete_failures.is_empty() => {
                    format!("{} rows could not be removed", t.delete_failures.len())
                }
                (None, None) if t.copy_failed > 0 => format!("{} rows kept, copy failed", t.copy_failed),
                (None, None) => "ok".to_string(),
            };
            vec![
                t.source.clone(),
                t.candidates.to_string(),
                t.archived.to_string(),
                t.already_archived.to_string(),
                t.deleted.to_string(),
                outcome,
            ]
        })
        .collect();
    print_table(&["Source", "Candidates", "Archived", "Already", "Removed", "Outcome"], rows);
    print!("{}", summary);
}
