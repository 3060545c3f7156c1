//! Archive Processor against in-memory stores.

mod harness;

use harness::{intake_row, test_config, Harness, ARCHIVE, ARCHIVE_FOLDER, CLOSED_FOLDER, INTAKE, SECONDARY};
use reviewflow::{PipelineError, RunStatus};
use reviewflow_protocol::defaults::COPY_PENDING_PREFIX;
use reviewflow_protocol::{Field, LogAction, LogStatus, ReviewRow};

const SPRINT: &str = "Sprint 14";

/// A fast-tracked file sitting in the closed folder, with its intake row.
fn closed_file(h: &Harness, name: &str) -> ReviewRow {
    let id = h.documents.add_file(CLOSED_FOLDER, name, "alice@example.com", 100);
    intake_row(&id, name, "fast-track").with(Field::RoutedOn, "2025-09-01T10:00:00Z")
}

fn secondary_file(h: &Harness, name: &str) -> ReviewRow {
    let id = h.documents.add_file(CLOSED_FOLDER, name, "bob@example.com", 100);
    intake_row(&id, name, "approved").with(Field::MedicalRisk, "Low")
}

#[tokio::test]
async fn archives_rows_and_files_into_sprint_folder() {
    let h = Harness::new().await;
    let fast = closed_file(&h, "a.docx");
    let pending = intake_row("file-x", "x.docx", "pending");
    let reviewed = secondary_file(&h, "b.docx");
    h.seed(INTAKE, &[fast.clone(), pending.clone()]);
    h.seed(SECONDARY, &[reviewed.clone()]);

    let summary = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(summary.status(), RunStatus::Complete);
    assert!(summary.folder_created);
    assert_eq!(summary.total_archived(), 2);
    assert_eq!(summary.total_deleted(), 2);
    assert_eq!(h.documents.child_names(ARCHIVE_FOLDER), vec![SPRINT.to_string()]);
    assert_eq!(
        h.documents.child_names(&summary.folder_id),
        vec!["a.docx".to_string(), "b.docx".to_string()]
    );

    // Only the selected intake row left.
    let intake = h.rows(INTAKE);
    assert_eq!(intake.len(), 1);
    assert_eq!(intake[0].file_id(), pending.file_id());
    assert!(h.rows(SECONDARY).is_empty());

    let archived = h.rows(ARCHIVE);
    assert_eq!(archived.len(), 2);
    let from_intake = archived.iter().find(|r| r.file_id() == fast.file_id()).unwrap();
    assert_eq!(from_intake.get(Field::SourceTable), INTAKE);
    assert_eq!(from_intake.get(Field::Sprint), SPRINT);
    assert!(!from_intake.get(Field::ArchivedOn).is_empty());
    assert!(from_intake.get(Field::FileUrl).starts_with("memory://copy-"));
    assert_eq!(from_intake.get(Field::RoutedOn), "2025-09-01T10:00:00Z");
    // Risk columns an intake row never had are padded.
    assert_eq!(from_intake.get(Field::MedicalRisk), "Not assessed");

    let from_secondary = archived.iter().find(|r| r.file_id() == reviewed.file_id()).unwrap();
    assert_eq!(from_secondary.get(Field::SourceTable), SECONDARY);
    assert_eq!(from_secondary.get(Field::MedicalRisk), "Low");

    let success = h
        .log()
        .into_iter()
        .filter(|e| e.action == LogAction::Archive && e.status == LogStatus::Success)
        .count();
    assert_eq!(success, 2);
}

#[tokio::test]
async fn failed_append_keeps_that_tables_rows() {
    let h = Harness::new().await;
    let a1 = closed_file(&h, "a1.docx");
    let a2 = closed_file(&h, "a2.docx");
    let b1 = secondary_file(&h, "b1.docx");
    h.seed(INTAKE, &[a1.clone(), a2.clone()]);
    h.seed(SECONDARY, &[b1.clone()]);
    // Intake is archived first; its append is rejected.
    h.tables.fail_next_appends(ARCHIVE, 1);

    let summary = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(summary.status(), RunStatus::Partial);
    let failed: Vec<&str> = summary.failed_tables().iter().map(|t| t.source.as_str()).collect();
    assert_eq!(failed, vec![INTAKE]);
    assert!(summary.to_string().contains("intake: FAILED, 2 rows kept in source"));

    // Nothing was deleted from the table whose append failed.
    let intake = h.rows(INTAKE);
    assert_eq!(intake.len(), 2);
    assert_eq!(intake[0].file_id(), a1.file_id());
    assert_eq!(intake[1].file_id(), a2.file_id());

    assert!(h.rows(SECONDARY).is_empty());
    let archived = h.rows(ARCHIVE);
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].file_id(), b1.file_id());

    let violations: Vec<_> = h
        .log()
        .into_iter()
        .filter(|e| e.action == LogAction::Archive && e.status == LogStatus::Error)
        .collect();
    assert_eq!(violations.len(), 2);
    assert!(violations[0].details.contains("source rows kept"));
}

#[tokio::test]
async fn every_append_failing_deletes_nothing() {
    let h = Harness::new().await;
    h.seed(INTAKE, &[closed_file(&h, "a.docx")]);
    h.seed(SECONDARY, &[secondary_file(&h, "b.docx")]);
    h.tables.fail_appends(ARCHIVE, true);

    let summary = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(summary.status(), RunStatus::Failed);
    assert_eq!(h.tables.calls().delete_row_at, 0);
    assert_eq!(h.rows(INTAKE).len(), 1);
    assert_eq!(h.rows(SECONDARY).len(), 1);
}

#[tokio::test]
async fn deletes_run_from_the_bottom_up() {
    let h = Harness::new().await;
    let rows: Vec<ReviewRow> = ["a.docx", "b.docx", "c.docx", "d.docx"]
        .iter()
        .map(|name| secondary_file(&h, name))
        .collect();
    h.seed(SECONDARY, &rows);
    h.seed(
        INTAKE,
        &[
            closed_file(&h, "e.docx"),
            intake_row("file-keep", "keep.docx", "pending"),
            closed_file(&h, "f.docx"),
        ],
    );

    let summary = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(summary.total_deleted(), 6);
    assert!(summary.tables.iter().all(|t| t.delete_failures.is_empty()));
    assert!(h.rows(SECONDARY).is_empty());
    let intake = h.rows(INTAKE);
    assert_eq!(intake.len(), 1);
    assert_eq!(intake[0].file_id(), "file-keep");
}

#[tokio::test]
async fn one_batched_append_per_table() {
    let h = Harness::new().await;
    let rows: Vec<ReviewRow> = ["a.docx", "b.docx", "c.docx"]
        .iter()
        .map(|name| secondary_file(&h, name))
        .collect();
    h.seed(SECONDARY, &rows);

    h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(h.tables.calls().append_rows, 1);
    assert_eq!(h.rows(ARCHIVE).len(), 3);
}

#[tokio::test]
async fn invisible_copy_gets_placeholder_url() {
    let h = Harness::new().await;
    h.documents.set_copy_visibility(None);
    h.seed(SECONDARY, &[secondary_file(&h, "b.docx")]);

    let summary = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(summary.unresolved_copies, vec!["b.docx".to_string()]);
    assert_eq!(summary.status(), RunStatus::Partial);
    let archived = h.rows(ARCHIVE);
    assert_eq!(archived[0].get(Field::FileUrl), format!("{COPY_PENDING_PREFIX} b.docx"));
    // The row itself still moved.
    assert!(h.rows(SECONDARY).is_empty());
}

#[tokio::test]
async fn slow_copy_is_found_by_polling() {
    let h = Harness::new().await;
    h.documents.set_copy_visibility(Some(1));
    h.seed(SECONDARY, &[secondary_file(&h, "b.docx")]);

    let summary = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert!(summary.unresolved_copies.is_empty());
    assert!(h.rows(ARCHIVE)[0].get(Field::FileUrl).starts_with("memory://copy-"));
}

#[tokio::test]
async fn failed_copy_keeps_row_in_source() {
    let h = Harness::new().await;
    let broken = secondary_file(&h, "b.docx");
    let fine = secondary_file(&h, "c.docx");
    h.documents.fail_copies_of(broken.file_id());
    h.seed(SECONDARY, &[broken.clone(), fine.clone()]);

    let summary = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(summary.status(), RunStatus::Partial);
    assert_eq!(summary.copy_failures.len(), 1);
    assert_eq!(summary.copy_failures[0].file_id, broken.file_id());
    let outcome = summary.tables.iter().find(|t| t.source == SECONDARY).unwrap();
    assert_eq!(outcome.copy_failed, 1);
    assert_eq!(outcome.archived, 1);
    assert_eq!(outcome.deleted, 1);
    assert!(summary.to_string().contains("1 kept after failed copy"));

    // The original location is still on record.
    let left = h.rows(SECONDARY);
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].file_id(), broken.file_id());
    assert_eq!(left[0].get(Field::FileUrl), format!("memory://{}", broken.file_id()));

    let archived = h.rows(ARCHIVE);
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].file_id(), fine.file_id());

    let kept = h
        .log()
        .into_iter()
        .find(|e| e.file_id == broken.file_id())
        .unwrap();
    assert_eq!(kept.status, LogStatus::Error);
    assert!(kept.details.contains("row kept in secondary_review"));
}

#[tokio::test]
async fn rerun_after_failed_delete_does_not_duplicate_archive_rows() {
    let h = Harness::new().await;
    let row = secondary_file(&h, "b.docx");
    h.seed(SECONDARY, &[row.clone()]);
    // Retry budget is five attempts per delete.
    h.tables.inject_conflicts(SECONDARY, 5);

    let first = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(first.status(), RunStatus::Partial);
    assert_eq!(first.total_archived(), 1);
    assert_eq!(first.total_deleted(), 0);
    let outcome = first.tables.iter().find(|t| t.source == SECONDARY).unwrap();
    assert_eq!(outcome.delete_failures.len(), 1);
    assert_eq!(outcome.delete_failures[0].file_id, row.file_id());
    assert!(first.to_string().contains("could not remove row 0"));
    assert_eq!(h.rows(SECONDARY).len(), 1);

    let second = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(second.status(), RunStatus::Complete);
    assert_eq!(second.total_archived(), 0);
    assert_eq!(second.total_deleted(), 1);
    let outcome = second.tables.iter().find(|t| t.source == SECONDARY).unwrap();
    assert_eq!(outcome.already_archived, 1);
    assert!(second.to_string().contains("1 already archived"));

    let ids: Vec<String> = h.rows(ARCHIVE).iter().map(|r| r.file_id().to_string()).collect();
    assert_eq!(ids, vec![row.file_id().to_string()]);
    assert!(h.rows(SECONDARY).is_empty());
    assert_eq!(h.documents.calls().copy_async, 1);
    assert_eq!(h.tables.calls().append_rows, 1);
}

#[tokio::test]
async fn failed_delete_in_one_table_leaves_the_other_alone() {
    let h = Harness::new().await;
    let fast = closed_file(&h, "a.docx");
    let reviewed = secondary_file(&h, "b.docx");
    h.seed(INTAKE, &[fast.clone()]);
    h.seed(SECONDARY, &[reviewed.clone()]);
    h.tables.inject_conflicts(INTAKE, 5);

    let summary = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(summary.status(), RunStatus::Partial);
    assert!(summary.failed_tables().is_empty());
    let intake = summary.tables.iter().find(|t| t.source == INTAKE).unwrap();
    assert_eq!((intake.archived, intake.deleted), (1, 0));
    assert_eq!(intake.delete_failures.len(), 1);
    let secondary = summary.tables.iter().find(|t| t.source == SECONDARY).unwrap();
    assert_eq!((secondary.archived, secondary.deleted), (1, 1));
    assert!(secondary.delete_failures.is_empty());

    assert_eq!(h.rows(INTAKE)[0].file_id(), fast.file_id());
    assert!(h.rows(SECONDARY).is_empty());
    assert_eq!(h.rows(ARCHIVE).len(), 2);
}

#[tokio::test]
async fn folder_with_the_file_name_is_not_taken_for_a_copy() {
    let h = Harness::new().await;
    h.documents.add_folder("sprint-folder", Some(ARCHIVE_FOLDER), SPRINT);
    h.documents.add_folder("decoy", Some("sprint-folder"), "b.docx");
    h.seed(SECONDARY, &[secondary_file(&h, "b.docx")]);

    let summary = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert_eq!(summary.status(), RunStatus::Complete);
    assert_eq!(h.documents.calls().copy_async, 1);
    let url = h.rows(ARCHIVE)[0].get(Field::FileUrl).to_string();
    assert!(url.starts_with("memory://copy-"), "{url}");
}

#[tokio::test]
async fn existing_folder_and_copies_are_reused() {
    let h = Harness::new().await;
    h.documents.add_folder("sprint-folder", Some(ARCHIVE_FOLDER), SPRINT);
    let earlier_copy = h.documents.add_file("sprint-folder", "b.docx", "bob@example.com", 100);
    h.seed(SECONDARY, &[secondary_file(&h, "b.docx")]);

    let summary = h.pipeline.archive.archive_sprint(SPRINT).await.unwrap();

    assert!(!summary.folder_created);
    assert_eq!(summary.folder_id, "sprint-folder");
    assert_eq!(h.documents.calls().create_folder, 0);
    assert_eq!(h.documents.calls().copy_async, 0);
    assert_eq!(h.rows(ARCHIVE)[0].get(Field::FileUrl), format!("memory://{earlier_copy}"));
}

#[tokio::test]
async fn blank_sprint_name_is_rejected() {
    let h = Harness::new().await;
    let err = h.pipeline.archive.archive_sprint("   ").await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
}

#[tokio::test(start_paused = true)]
async fn concurrent_runs_are_refused() {
    let mut config = test_config();
    config.archive.locate_delay_ms = 1_000;
    let h = Harness::with_config(config).await;
    h.documents.set_copy_visibility(None);
    h.seed(SECONDARY, &[secondary_file(&h, "b.docx")]);

    let archive = &h.pipeline.archive;
    let (first, second) = tokio::join!(archive.archive_sprint(SPRINT), archive.archive_sprint(SPRINT));

    assert!(first.is_ok());
    assert!(matches!(second, Err(PipelineError::ArchiveAlreadyRunning)));
}
