//! Table store backed by a directory of CSV files.
//!
//! Each table is `<dir>/<table_id>.csv` with the header as its first record.
//! Writers take an exclusive `fs2` lock on a `<table_id>.csv.lock` sidecar;
//! a lock held by someone else is reported as a write conflict, which the
//! adapter retries. Rewrites go through a temp file and a rename so readers
//! never see a half-written table.

use crate::error::{Result, StoreError};
use crate::table::TableStore;
use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    dir: PathBuf,
}

struct TableLock {
    file: File,
}

impl Drop for TableLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl CsvWorkbook {
    /// Open (creating if needed) a workbook directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, table_id: &str) -> Result<PathBuf> {
        let valid = !table_id.is_empty()
            && table_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::not_found(format!("invalid table id '{table_id}'")));
        }
        Ok(self.dir.join(format!("{table_id}.csv")))
    }

    pub fn has_table(&self, table_id: &str) -> bool {
        self.table_path(table_id).map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a table with the given header. Existing tables are left alone.
    pub fn create_table(&self, table_id: &str, header: &[String]) -> Result<bool> {
        let path = self.table_path(table_id)?;
        if path.exists() {
            return Ok(false);
        }
        let _lock = lock_table(&path)?;
        write_table(&path, header, &[])?;
        debug!(table = table_id, "Created workbook table");
        Ok(true)
    }

    async fn blocking<T, F>(&self, table_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.table_path(table_id)?;
        if !path.exists() {
            return Err(StoreError::not_found(format!("table {table_id}")));
        }
        tokio::task::spawn_blocking(move || f(&path)).await?
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut lock = path.as_os_str().to_owned();
    lock.push(".lock");
    PathBuf::from(lock)
}

fn lock_table(path: &Path) -> Result<TableLock> {
    let lock_path = lock_path_for(path);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(TableLock { file }),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Err(StoreError::conflict(format!(
            "{} is locked by another writer",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect(),
        None => Vec::new(),
    };
    let mut rows = Vec::new();
    for record in records {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}

fn write_table(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&tmp)?;
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read-modify-write under the table lock.
fn rewrite<F>(path: &Path, edit: F) -> Result<()>
where
    F: FnOnce(&[String], &mut Vec<Vec<String>>) -> Result<()>,
{
    let _lock = lock_table(path)?;
    let (header, mut rows) = read_table(path)?;
    edit(&header, &mut rows)?;
    write_table(path, &header, &rows)
}

fn row_not_found(path: &Path, index: usize) -> StoreError {
    StoreError::not_found(format!("{} row {}", path.display(), index))
}

#[async_trait]
impl TableStore for CsvWorkbook {
    async fn list_rows(&self, table_id: &str) -> Result<Vec<Vec<String>>> {
        self.blocking(table_id, |path| Ok(read_table(path)?.1)).await
    }

    async fn append_rows(&self, table_id: &str, rows: Vec<Vec<String>>) -> Result<()> {
        self.blocking(table_id, move |path| {
            rewrite(path, |_, existing| {
                existing.extend(rows);
                Ok(())
            })
        })
        .await
    }

    async fn update_row_at(
        &self,
        table_id: &str,
        index: usize,
        patch: Vec<(usize, String)>,
    ) -> Result<()> {
        self.blocking(table_id, move |path| {
            rewrite(path, |header, rows| {
                let row = rows.get_mut(index).ok_or_else(|| row_not_found(path, index))?;
                for (col, value) in patch {
                    if row.len() <= col {
                        row.resize(header.len().max(col + 1), String::new());
                    }
                    row[col] = value;
                }
                Ok(())
            })
        })
        .await
    }

    async fn delete_row_at(&self, table_id: &str, index: usize) -> Result<()> {
        self.blocking(table_id, move |path| {
            rewrite(path, |_, rows| {
                if index >= rows.len() {
                    return Err(row_not_found(path, index));
                }
                rows.remove(index);
                Ok(())
            })
        })
        .await
    }

    async fn get_columns(&self, table_id: &str) -> Result<Vec<String>> {
        self.blocking(table_id, |path| Ok(read_table(path)?.0)).await
    }
}
