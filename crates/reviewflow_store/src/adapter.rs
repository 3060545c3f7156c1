//! Schema-aware access to one table.

use crate::error::{Result, StoreError};
use crate::retry::{retry_on_conflict, with_timeout, RetryPolicy};
use crate::table::TableStore;
use reviewflow_protocol::{Field, ReviewRow};
use reviewflow_schema::{SchemaRegistry, TableSchema, TableVariant};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A decoded row and its current 0-based data-row index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRow {
    pub index: usize,
    pub row: ReviewRow,
}

/// One table of a [`TableStore`], read and written by field name.
///
/// Updates and deletes retry on conflict. Appends are never retried: a
/// rejected append may still have landed, and blind re-appending would
/// duplicate rows.
pub struct TableAdapter {
    store: Arc<dyn TableStore>,
    table_id: String,
    schema: TableSchema,
    policy: RetryPolicy,
    timeout: Duration,
}

impl std::fmt::Debug for TableAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableAdapter")
            .field("table_id", &self.table_id)
            .field("variant", &self.schema.variant())
            .finish()
    }
}

impl TableAdapter {
    /// Open a table, verifying its live header against the registry.
    pub async fn open(
        store: Arc<dyn TableStore>,
        table_id: impl Into<String>,
        variant: TableVariant,
        registry: &SchemaRegistry,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        let table_id = table_id.into();
        let header = with_timeout("get_columns", timeout, store.get_columns(&table_id)).await?;
        let schema = registry.resolve(variant, &table_id, &header)?;
        debug!(table = %table_id, %variant, width = schema.width(), "Opened table");
        Ok(Self {
            store,
            table_id,
            schema,
            policy,
            timeout,
        })
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn variant(&self) -> TableVariant {
        self.schema.variant()
    }

    pub async fn rows(&self) -> Result<Vec<IndexedRow>> {
        let cells = with_timeout("list_rows", self.timeout, self.store.list_rows(&self.table_id)).await?;
        Ok(cells
            .iter()
            .enumerate()
            .map(|(index, cells)| IndexedRow {
                index,
                row: self.schema.decode(cells),
            })
            .collect())
    }

    pub async fn find_by_file_id(&self, file_id: &str) -> Result<Option<IndexedRow>> {
        Ok(self
            .rows()
            .await?
            .into_iter()
            .find(|r| r.row.file_id() == file_id))
    }

    pub async fn append(&self, row: &ReviewRow) -> Result<()> {
        let cells = self.schema.encode(row);
        with_timeout("append_row", self.timeout, self.store.append_row(&self.table_id, cells)).await
    }

    /// Append all rows in a single store call.
    pub async fn append_batch(&self, rows: &[ReviewRow]) -> Result<()> {
        let cells = rows.iter().map(|r| self.schema.encode(r)).collect();
        with_timeout("append_rows", self.timeout, self.store.append_rows(&self.table_id, cells)).await
    }

    /// Current index of the row holding `file_id`.
    ///
    /// `index` is where the caller last saw it. Rows shift when another
    /// writer deletes above them, so the FileID is checked before any write.
    async fn locate(&self, index: usize, file_id: &str) -> Result<usize> {
        let cells = with_timeout("list_rows", self.timeout, self.store.list_rows(&self.table_id)).await?;
        let id_at = |cells: &Vec<String>| self.schema.decode(cells).file_id().to_string();
        if cells.get(index).map(id_at).as_deref() == Some(file_id) {
            return Ok(index);
        }
        match cells.iter().position(|c| id_at(c) == file_id) {
            Some(moved) => {
                debug!(table = %self.table_id, file_id, from = index, to = moved, "Row moved since it was read");
                Ok(moved)
            }
            None => Err(StoreError::not_found(format!(
                "{} row for {} (last seen at {})",
                self.table_id, file_id, index
            ))),
        }
    }

    /// Patch named fields of the row holding `file_id`, last seen at
    /// `index`. Returns the conflict retries spent.
    pub async fn update(&self, index: usize, file_id: &str, updates: &[(Field, String)]) -> Result<u32> {
        let patch = self.schema.patch(updates)?;
        let patch = &patch;
        let outcome = retry_on_conflict("update_row_at", &self.policy, self.timeout, || async move {
            let at = self.locate(index, file_id).await?;
            self.store.update_row_at(&self.table_id, at, patch.clone()).await
        })
        .await?;
        Ok(outcome.retries)
    }

    /// Delete the row holding `file_id`, last seen at `index`. Returns the
    /// conflict retries spent.
    pub async fn delete(&self, index: usize, file_id: &str) -> Result<u32> {
        let outcome = retry_on_conflict("delete_row_at", &self.policy, self.timeout, || async move {
            let at = self.locate(index, file_id).await?;
            self.store.delete_row_at(&self.table_id, at).await
        })
        .await?;
        Ok(outcome.retries)
    }
}
