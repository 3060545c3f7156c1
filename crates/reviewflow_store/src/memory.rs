//! In-process stores.
//!
//! Used by the test suites and by dry runs. Each store counts its calls and
//! can be told to fail in the ways the real collaborators fail: rejected
//! appends, write conflicts, vanished files and copies that take a while to
//! become visible.

use crate::document::{renamed, ConflictPolicy, CopyOperation, DocumentItem, DocumentMetadata, DocumentStore};
use crate::error::{Result, StoreError};
use crate::event_log::EventLog;
use crate::table::TableStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reviewflow_protocol::{LogFilter, ProcessingLogEntry};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Tables
// ============================================================================

/// Calls made against a [`MemoryTableStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCalls {
    pub list_rows: usize,
    pub append_rows: usize,
    pub update_row_at: usize,
    pub delete_row_at: usize,
    pub get_columns: usize,
}

#[derive(Debug, Default)]
struct MemoryTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct TablesState {
    tables: HashMap<String, MemoryTable>,
    calls: TableCalls,
    failing_appends: HashSet<String>,
    failing_reads: HashSet<String>,
    /// Table id -> number of upcoming appends to reject
    pending_append_failures: HashMap<String, u32>,
    /// Table id -> number of upcoming update/delete calls to reject
    pending_conflicts: HashMap<String, u32>,
}

impl TablesState {
    fn table_mut(&mut self, table_id: &str) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(table_id)
            .ok_or_else(|| StoreError::not_found(format!("table {table_id}")))
    }

    fn take_conflict(&mut self, table_id: &str) -> bool {
        take_one(&mut self.pending_conflicts, table_id)
    }

    fn take_append_failure(&mut self, table_id: &str) -> bool {
        take_one(&mut self.pending_append_failures, table_id)
    }
}

fn take_one(budget: &mut HashMap<String, u32>, table_id: &str) -> bool {
    match budget.get_mut(table_id) {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

#[derive(Debug, Default)]
pub struct MemoryTableStore {
    state: Mutex<TablesState>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) a table with the given header.
    pub fn create_table(&self, table_id: &str, header: Vec<String>) {
        lock(&self.state).tables.insert(
            table_id.to_string(),
            MemoryTable {
                header,
                rows: Vec::new(),
            },
        );
    }

    /// Seed rows without counting a call.
    pub fn seed_rows(&self, table_id: &str, rows: Vec<Vec<String>>) {
        let mut state = lock(&self.state);
        state.tables.entry(table_id.to_string()).or_default().rows.extend(rows);
    }

    /// Snapshot of a table's data rows.
    pub fn rows(&self, table_id: &str) -> Vec<Vec<String>> {
        lock(&self.state)
            .tables
            .get(table_id)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> TableCalls {
        lock(&self.state).calls
    }

    pub fn reset_calls(&self) {
        lock(&self.state).calls = TableCalls::default();
    }

    /// Reject every append to `table_id` until cleared.
    pub fn fail_appends(&self, table_id: &str, fail: bool) {
        let mut state = lock(&self.state);
        if fail {
            state.failing_appends.insert(table_id.to_string());
        } else {
            state.failing_appends.remove(table_id);
        }
    }

    /// Fail every `list_rows` on `table_id` until cleared.
    pub fn fail_reads(&self, table_id: &str, fail: bool) {
        let mut state = lock(&self.state);
        if fail {
            state.failing_reads.insert(table_id.to_string());
        } else {
            state.failing_reads.remove(table_id);
        }
    }

    /// Reject only the next `count` appends to `table_id`.
    pub fn fail_next_appends(&self, table_id: &str, count: u32) {
        lock(&self.state)
            .pending_append_failures
            .insert(table_id.to_string(), count);
    }

    /// Reject the next `count` updates or deletes on `table_id` with a conflict.
    pub fn inject_conflicts(&self, table_id: &str, count: u32) {
        lock(&self.state)
            .pending_conflicts
            .insert(table_id.to_string(), count);
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn list_rows(&self, table_id: &str) -> Result<Vec<Vec<String>>> {
        let mut state = lock(&self.state);
        state.calls.list_rows += 1;
        if state.failing_reads.contains(table_id) {
            return Err(StoreError::transport(format!("read of {table_id} failed")));
        }
        Ok(state.table_mut(table_id)?.rows.clone())
    }

    async fn append_rows(&self, table_id: &str, rows: Vec<Vec<String>>) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.append_rows += 1;
        if state.failing_appends.contains(table_id) || state.take_append_failure(table_id) {
            return Err(StoreError::transport(format!("append to {table_id} rejected")));
        }
        state.table_mut(table_id)?.rows.extend(rows);
        Ok(())
    }

    async fn update_row_at(
        &self,
        table_id: &str,
        index: usize,
        patch: Vec<(usize, String)>,
    ) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.update_row_at += 1;
        if state.take_conflict(table_id) {
            return Err(StoreError::conflict(format!("{table_id} row {index} is being edited")));
        }
        let table = state.table_mut(table_id)?;
        let width = table.header.len();
        let row = table
            .rows
            .get_mut(index)
            .ok_or_else(|| StoreError::not_found(format!("{table_id} row {index}")))?;
        for (col, value) in patch {
            if row.len() <= col {
                row.resize(width.max(col + 1), String::new());
            }
            row[col] = value;
        }
        Ok(())
    }

    async fn delete_row_at(&self, table_id: &str, index: usize) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.delete_row_at += 1;
        if state.take_conflict(table_id) {
            return Err(StoreError::conflict(format!("{table_id} row {index} is being edited")));
        }
        let table = state.table_mut(table_id)?;
        if index >= table.rows.len() {
            return Err(StoreError::not_found(format!("{table_id} row {index}")));
        }
        table.rows.remove(index);
        Ok(())
    }

    async fn get_columns(&self, table_id: &str) -> Result<Vec<String>> {
        let mut state = lock(&self.state);
        state.calls.get_columns += 1;
        Ok(state.table_mut(table_id)?.header.clone())
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Calls made against a [`MemoryDocumentStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentCalls {
    pub list: usize,
    pub get_metadata: usize,
    pub exists: usize,
    pub move_item: usize,
    pub copy_async: usize,
    pub create_folder: usize,
    pub find_child_by_name: usize,
}

#[derive(Debug, Clone)]
struct MemoryItem {
    id: String,
    name: String,
    parent: Option<String>,
    is_folder: bool,
    created_at: DateTime<Utc>,
    uploader: String,
    size: u64,
}

impl MemoryItem {
    fn url(&self) -> String {
        format!("memory://{}", self.id)
    }

    fn to_document(&self) -> DocumentItem {
        DocumentItem {
            id: self.id.clone(),
            name: self.name.clone(),
            is_folder: self.is_folder,
            url: self.url(),
        }
    }
}

#[derive(Debug)]
struct PendingCopy {
    item: MemoryItem,
    /// Lookups under the destination folder before the copy shows up
    polls_left: u32,
}

#[derive(Debug, Default)]
struct DocumentsState {
    items: HashMap<String, MemoryItem>,
    next_id: u64,
    calls: DocumentCalls,
    pending: Vec<PendingCopy>,
    /// None: copies never become visible
    copy_visible_after: Option<u32>,
    failing_copies: HashSet<String>,
}

impl DocumentsState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn child_named(&self, parent_id: &str, name: &str) -> Option<&MemoryItem> {
        let mut matches: Vec<&MemoryItem> = self
            .items
            .values()
            .filter(|i| i.parent.as_deref() == Some(parent_id) && i.name == name)
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.into_iter().next()
    }

    fn require(&self, id: &str) -> Result<&MemoryItem> {
        self.items
            .get(id)
            .ok_or_else(|| StoreError::not_found(format!("item {id}")))
    }

    fn tick_pending(&mut self, parent_id: &str) {
        let mut landed = Vec::new();
        self.pending.retain_mut(|copy| {
            if copy.item.parent.as_deref() != Some(parent_id) {
                return true;
            }
            if copy.polls_left == 0 {
                landed.push(copy.item.clone());
                return false;
            }
            copy.polls_left -= 1;
            true
        });
        for item in landed {
            self.items.insert(item.id.clone(), item);
        }
    }
}

#[derive(Debug)]
pub struct MemoryDocumentStore {
    state: Mutex<DocumentsState>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// Store whose copies are visible immediately.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DocumentsState {
                copy_visible_after: Some(0),
                ..DocumentsState::default()
            }),
        }
    }

    /// Add a folder with a caller-chosen id.
    pub fn add_folder(&self, id: &str, parent: Option<&str>, name: &str) {
        let item = MemoryItem {
            id: id.to_string(),
            name: name.to_string(),
            parent: parent.map(str::to_string),
            is_folder: true,
            created_at: Utc::now(),
            uploader: String::new(),
            size: 0,
        };
        lock(&self.state).items.insert(item.id.clone(), item);
    }

    /// Add a file and return its generated id.
    pub fn add_file(&self, parent: &str, name: &str, uploader: &str, size: u64) -> String {
        let mut state = lock(&self.state);
        let id = state.allocate_id("file");
        let item = MemoryItem {
            id: id.clone(),
            name: name.to_string(),
            parent: Some(parent.to_string()),
            is_folder: false,
            created_at: Utc::now(),
            uploader: uploader.to_string(),
            size,
        };
        state.items.insert(id.clone(), item);
        id
    }

    /// Delete an item behind the pipeline's back.
    pub fn remove(&self, id: &str) {
        lock(&self.state).items.remove(id);
    }

    pub fn parent_of(&self, id: &str) -> Option<String> {
        lock(&self.state).items.get(id).and_then(|i| i.parent.clone())
    }

    /// Names of the items directly under `parent_id`, sorted.
    pub fn child_names(&self, parent_id: &str) -> Vec<String> {
        let state = lock(&self.state);
        let mut names: Vec<String> = state
            .items
            .values()
            .filter(|i| i.parent.as_deref() == Some(parent_id))
            .map(|i| i.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Copies become visible after this many lookups under their folder.
    /// `None` keeps them invisible forever.
    pub fn set_copy_visibility(&self, after_lookups: Option<u32>) {
        lock(&self.state).copy_visible_after = after_lookups;
    }

    /// Reject copies of `item_id`.
    pub fn fail_copies_of(&self, item_id: &str) {
        lock(&self.state).failing_copies.insert(item_id.to_string());
    }

    pub fn calls(&self) -> DocumentCalls {
        lock(&self.state).calls
    }

    pub fn reset_calls(&self) {
        lock(&self.state).calls = DocumentCalls::default();
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self, folder_id: &str) -> Result<Vec<DocumentItem>> {
        let mut state = lock(&self.state);
        state.calls.list += 1;
        state.require(folder_id)?;
        let mut items: Vec<DocumentItem> = state
            .items
            .values()
            .filter(|i| i.parent.as_deref() == Some(folder_id))
            .map(MemoryItem::to_document)
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn get_metadata(&self, item_id: &str) -> Result<DocumentMetadata> {
        let mut state = lock(&self.state);
        state.calls.get_metadata += 1;
        let item = state.require(item_id)?;
        Ok(DocumentMetadata {
            id: item.id.clone(),
            name: item.name.clone(),
            created_at: item.created_at,
            uploader: item.uploader.clone(),
            size: item.size,
            url: item.url(),
        })
    }

    async fn exists(&self, item_id: &str) -> Result<bool> {
        let mut state = lock(&self.state);
        state.calls.exists += 1;
        Ok(state.items.contains_key(item_id))
    }

    async fn move_item(&self, item_id: &str, new_parent_id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.move_item += 1;
        state.require(new_parent_id)?;
        let item = state
            .items
            .get_mut(item_id)
            .ok_or_else(|| StoreError::not_found(format!("item {item_id}")))?;
        item.parent = Some(new_parent_id.to_string());
        Ok(())
    }

    async fn copy_async(
        &self,
        item_id: &str,
        dest_parent_id: &str,
        dest_name: &str,
    ) -> Result<CopyOperation> {
        let mut state = lock(&self.state);
        state.calls.copy_async += 1;
        if state.failing_copies.contains(item_id) {
            return Err(StoreError::transport(format!("copy of {item_id} rejected")));
        }
        state.require(dest_parent_id)?;
        let source = state.require(item_id)?.clone();
        let id = state.allocate_id("copy");
        let item = MemoryItem {
            id,
            name: dest_name.to_string(),
            parent: Some(dest_parent_id.to_string()),
            created_at: Utc::now(),
            ..source
        };
        if let Some(polls_left) = state.copy_visible_after {
            if polls_left == 0 {
                state.items.insert(item.id.clone(), item);
            } else {
                state.pending.push(PendingCopy { item, polls_left });
            }
        }
        Ok(CopyOperation {
            source_id: item_id.to_string(),
            dest_parent_id: dest_parent_id.to_string(),
            dest_name: dest_name.to_string(),
        })
    }

    async fn create_folder(
        &self,
        parent_id: &str,
        name: &str,
        on_conflict: ConflictPolicy,
    ) -> Result<String> {
        let mut state = lock(&self.state);
        state.calls.create_folder += 1;
        state.require(parent_id)?;

        let mut final_name = name.to_string();
        if let Some(existing) = state.child_named(parent_id, name) {
            match on_conflict {
                ConflictPolicy::Fail => {
                    return Err(StoreError::conflict(format!("{name} already exists")))
                }
                ConflictPolicy::Replace if existing.is_folder => return Ok(existing.id.clone()),
                ConflictPolicy::Replace | ConflictPolicy::Rename => {
                    let mut n = 1;
                    while state.child_named(parent_id, &renamed(name, n)).is_some() {
                        n += 1;
                    }
                    final_name = renamed(name, n);
                }
            }
        }

        let id = state.allocate_id("folder");
        let item = MemoryItem {
            id: id.clone(),
            name: final_name,
            parent: Some(parent_id.to_string()),
            is_folder: true,
            created_at: Utc::now(),
            uploader: String::new(),
            size: 0,
        };
        state.items.insert(id.clone(), item);
        Ok(id)
    }

    async fn find_child_by_name(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<DocumentItem>> {
        let mut state = lock(&self.state);
        state.calls.find_child_by_name += 1;
        state.tick_pending(parent_id);
        Ok(state.child_named(parent_id, name).map(MemoryItem::to_document))
    }
}

// ============================================================================
// Event log
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryEventLog {
    entries: Mutex<Vec<ProcessingLogEntry>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> Vec<ProcessingLogEntry> {
        lock(&self.entries).clone()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn insert(&self, entry: &ProcessingLogEntry) -> Result<i64> {
        let mut entries = lock(&self.entries);
        let id = entries.len() as i64 + 1;
        let mut stored = entry.clone();
        stored.id = Some(id);
        entries.push(stored);
        Ok(id)
    }

    async fn query(&self, filter: &LogFilter, limit: usize) -> Result<Vec<ProcessingLogEntry>> {
        Ok(lock(&self.entries)
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }
}
