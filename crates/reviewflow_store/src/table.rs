//! Table store contract.

use crate::error::Result;
use async_trait::async_trait;

/// A spreadsheet-like store of tables addressed by id.
///
/// Rows are positional string cells. Row indices are 0-based over data rows
/// (the header row is not counted) and are only valid until the next
/// delete on the same table.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// All data rows, in physical order.
    async fn list_rows(&self, table_id: &str) -> Result<Vec<Vec<String>>>;

    /// Append rows as one batched write. Either every row lands or none do.
    async fn append_rows(&self, table_id: &str, rows: Vec<Vec<String>>) -> Result<()>;

    /// Overwrite the given cells of one row.
    async fn update_row_at(
        &self,
        table_id: &str,
        index: usize,
        patch: Vec<(usize, String)>,
    ) -> Result<()>;

    async fn delete_row_at(&self, table_id: &str, index: usize) -> Result<()>;

    /// Header row as stored.
    async fn get_columns(&self, table_id: &str) -> Result<Vec<String>>;

    async fn append_row(&self, table_id: &str, row: Vec<String>) -> Result<()> {
        self.append_rows(table_id, vec![row]).await
    }
}
