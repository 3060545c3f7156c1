//! TableAdapter behaviour against the in-memory and CSV backends.

use reviewflow_protocol::{Field, ReviewRow};
use reviewflow_schema::{SchemaError, SchemaRegistry, TableVariant};
use reviewflow_store::{CsvWorkbook, MemoryTableStore, RetryPolicy, StoreError, TableAdapter, TableStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);

fn canonical_header(variant: TableVariant) -> Vec<String> {
    SchemaRegistry::new().get(variant).header()
}

async fn open(store: Arc<dyn TableStore>, table: &str, variant: TableVariant) -> TableAdapter {
    TableAdapter::open(
        store,
        table,
        variant,
        &SchemaRegistry::new(),
        RetryPolicy::immediate(3),
        TIMEOUT,
    )
    .await
    .unwrap()
}

fn pending_row(file_id: &str) -> ReviewRow {
    ReviewRow::new()
        .with(Field::FileId, file_id)
        .with(Field::FileName, format!("{file_id}.docx"))
        .with(Field::Status, "pending")
}

#[tokio::test]
async fn update_retries_through_conflicts() {
    let store = Arc::new(MemoryTableStore::new());
    store.create_table("secondary", canonical_header(TableVariant::SecondaryReview));
    let table = open(store.clone(), "secondary", TableVariant::SecondaryReview).await;
    table.append(&pending_row("f1")).await.unwrap();

    store.inject_conflicts("secondary", 2);
    let retries = table
        .update(0, "f1", &[(Field::RoutedOn, "2025-03-01T00:00:00Z".to_string())])
        .await
        .unwrap();

    assert_eq!(retries, 2);
    assert_eq!(store.calls().update_row_at, 3);
    let rows = table.rows().await.unwrap();
    assert_eq!(rows[0].row.get(Field::RoutedOn), "2025-03-01T00:00:00Z");
    // Patch landed at the secondary layout's index, not the intake one.
    assert_eq!(store.rows("secondary")[0][17], "2025-03-01T00:00:00Z");
}

#[tokio::test]
async fn update_gives_up_after_budget() {
    let store = Arc::new(MemoryTableStore::new());
    store.create_table("intake", canonical_header(TableVariant::Intake));
    let table = open(store.clone(), "intake", TableVariant::Intake).await;
    table.append(&pending_row("f1")).await.unwrap();

    store.inject_conflicts("intake", 10);
    let err = table
        .update(0, "f1", &[(Field::Error, "x".to_string())])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(store.calls().update_row_at, 3);
    assert_eq!(table.rows().await.unwrap()[0].row.get(Field::Error), "");
}

#[tokio::test]
async fn update_follows_a_row_shifted_by_another_writer() {
    let store = Arc::new(MemoryTableStore::new());
    store.create_table("intake", canonical_header(TableVariant::Intake));
    let table = open(store.clone(), "intake", TableVariant::Intake).await;
    table
        .append_batch(&[pending_row("f1"), pending_row("f2")])
        .await
        .unwrap();
    let seen = table.rows().await.unwrap();

    // Someone else removes f1 between our read and our write.
    store.delete_row_at("intake", 0).await.unwrap();
    table
        .update(seen[1].index, "f2", &[(Field::RoutedOn, "2025-03-01T00:00:00Z".to_string())])
        .await
        .unwrap();

    let rows = table.rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row.file_id(), "f2");
    assert_eq!(rows[0].row.get(Field::RoutedOn), "2025-03-01T00:00:00Z");
}

#[tokio::test]
async fn stale_index_never_writes_to_a_different_row() {
    let store = Arc::new(MemoryTableStore::new());
    store.create_table("intake", canonical_header(TableVariant::Intake));
    let table = open(store.clone(), "intake", TableVariant::Intake).await;
    table
        .append_batch(&[pending_row("f1"), pending_row("f2")])
        .await
        .unwrap();

    store.delete_row_at("intake", 0).await.unwrap();
    store.reset_calls();
    let err = table
        .update(0, "f1", &[(Field::RoutedOn, "2025-03-01T00:00:00Z".to_string())])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(table.delete(0, "f1").await.unwrap_err().is_not_found());

    assert_eq!(store.calls().update_row_at, 0);
    assert_eq!(store.calls().delete_row_at, 0);
    let rows = table.rows().await.unwrap();
    assert_eq!(rows[0].row.file_id(), "f2");
    assert_eq!(rows[0].row.get(Field::RoutedOn), "");
}

#[tokio::test]
async fn delete_follows_a_shifted_row() {
    let store = Arc::new(MemoryTableStore::new());
    store.create_table("intake", canonical_header(TableVariant::Intake));
    let table = open(store.clone(), "intake", TableVariant::Intake).await;
    table
        .append_batch(&[pending_row("f1"), pending_row("f2"), pending_row("f3")])
        .await
        .unwrap();

    store.delete_row_at("intake", 0).await.unwrap();
    table.delete(2, "f3").await.unwrap();

    let ids: Vec<String> = table
        .rows()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.row.file_id().to_string())
        .collect();
    assert_eq!(ids, vec!["f2".to_string()]);
}

#[tokio::test]
async fn appends_are_never_retried() {
    let store = Arc::new(MemoryTableStore::new());
    store.create_table("intake", canonical_header(TableVariant::Intake));
    let table = open(store.clone(), "intake", TableVariant::Intake).await;
    store.fail_appends("intake", true);

    assert!(table.append(&pending_row("f1")).await.is_err());
    assert_eq!(store.calls().append_rows, 1);
}

#[tokio::test]
async fn reordered_header_is_honoured() {
    let store = Arc::new(MemoryTableStore::new());
    let mut header = canonical_header(TableVariant::Intake);
    header.reverse();
    store.create_table("intake", header.clone());
    let table = open(store.clone(), "intake", TableVariant::Intake).await;

    table.append(&pending_row("f1")).await.unwrap();
    let raw = &store.rows("intake")[0];
    let file_id_col = header.iter().position(|h| h == "FileID").unwrap();
    assert_eq!(raw[file_id_col], "f1");
    assert_eq!(table.find_by_file_id("f1").await.unwrap().unwrap().index, 0);
}

#[tokio::test]
async fn missing_columns_fail_open() {
    let store = Arc::new(MemoryTableStore::new());
    store.create_table("intake", vec!["FileID".to_string(), "Status".to_string()]);
    let err = TableAdapter::open(
        store,
        "intake",
        TableVariant::Intake,
        &SchemaRegistry::new(),
        RetryPolicy::immediate(1),
        TIMEOUT,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::Schema(SchemaError::MissingColumns { .. })));
}

#[tokio::test]
async fn csv_workbook_serves_the_adapter() {
    let dir = TempDir::new().unwrap();
    let workbook = CsvWorkbook::open(dir.path()).unwrap();
    workbook
        .create_table("intake", &canonical_header(TableVariant::Intake))
        .unwrap();
    let table = open(Arc::new(workbook), "intake", TableVariant::Intake).await;

    table
        .append_batch(&[pending_row("f1"), pending_row("f2"), pending_row("f3")])
        .await
        .unwrap();
    table.delete(2, "f3").await.unwrap();
    table.delete(0, "f1").await.unwrap();

    let rows = table.rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row.file_id(), "f2");
    assert_eq!(rows[0].index, 0);
}
