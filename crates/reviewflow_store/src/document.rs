//! Document store contract.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentItem {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub uploader: String,
    pub size: u64,
    pub url: String,
}

/// What to do when a folder of the requested name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Return a conflict error
    Fail,
    /// Create alongside with a " (n)" suffix
    #[default]
    Rename,
    /// Reuse the existing folder
    Replace,
}

/// Handle for an asynchronous copy.
///
/// Completion is not reported through the handle; callers locate the copy
/// by name under the destination folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOperation {
    pub source_id: String,
    pub dest_parent_id: String,
    pub dest_name: String,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, folder_id: &str) -> Result<Vec<DocumentItem>>;

    async fn get_metadata(&self, item_id: &str) -> Result<DocumentMetadata>;

    async fn exists(&self, item_id: &str) -> Result<bool>;

    async fn move_item(&self, item_id: &str, new_parent_id: &str) -> Result<()>;

    /// Start a copy. The copy may become visible some time after this returns.
    async fn copy_async(
        &self,
        item_id: &str,
        dest_parent_id: &str,
        dest_name: &str,
    ) -> Result<CopyOperation>;

    /// Create a folder and return its id.
    async fn create_folder(
        &self,
        parent_id: &str,
        name: &str,
        on_conflict: ConflictPolicy,
    ) -> Result<String>;

    async fn find_child_by_name(&self, parent_id: &str, name: &str)
        -> Result<Option<DocumentItem>>;
}

/// Name for the n-th renamed duplicate: `Sprint 7 (2)`.
pub fn renamed(name: &str, n: u32) -> String {
    format!("{name} ({n})")
}
