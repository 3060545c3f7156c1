//! Document store over a local directory tree.
//!
//! Files and folders are addressed by [`file_uid`](crate::file_uid) so ids
//! stay valid across moves. Folder ids may also be given as paths relative
//! to the root, which is how configuration names the well-known folders.

use crate::document::{renamed, ConflictPolicy, CopyOperation, DocumentItem, DocumentMetadata, DocumentStore};
use crate::error::{Result, StoreError};
use crate::file_uid::{file_uid, is_strong};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

const PARTIAL_SUFFIX: &str = ".partial-copy";

#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    tree: Arc<Tree>,
}

#[derive(Debug)]
struct Tree {
    root: PathBuf,
    /// uid -> last known absolute path
    known: Mutex<HashMap<String, PathBuf>>,
}

impl LocalDocumentStore {
    /// Open (creating if needed) a document tree rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        let root = root.as_ref().canonicalize()?;
        Ok(Self {
            tree: Arc::new(Tree {
                root,
                known: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.tree.root
    }

    /// Absolute path currently behind an id.
    pub async fn path_of(&self, id: &str) -> Result<PathBuf> {
        let id = id.to_string();
        self.blocking(move |tree| tree.resolve(&id)).await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tree) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tree = Arc::clone(&self.tree);
        tokio::task::spawn_blocking(move || f(&tree)).await?
    }
}

impl Tree {
    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    fn uid_of(&self, path: &Path) -> Result<String> {
        let metadata = fs::metadata(path)?;
        Ok(file_uid(self.relative(path), &metadata))
    }

    fn remember(&self, id: &str, path: &Path) {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), path.to_path_buf());
    }

    fn resolve(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id == "." || id == "/" {
            return Ok(self.root.clone());
        }
        if is_strong(id) {
            return self.resolve_strong(id);
        }

        let relative = Path::new(id.strip_prefix("path:").unwrap_or(id));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StoreError::not_found(format!("{id} is outside the document root")));
        }
        let path = self.root.join(relative);
        if path.exists() {
            Ok(path)
        } else {
            Err(StoreError::not_found(id.to_string()))
        }
    }

    fn resolve_strong(&self, id: &str) -> Result<PathBuf> {
        let cached = self
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();
        if let Some(path) = cached {
            if self.uid_of(&path).ok().as_deref() == Some(id) {
                return Ok(path);
            }
        }

        let mut found = None;
        let mut seen = HashMap::new();
        for entry in WalkDir::new(&self.root).min_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry while resolving {}: {}", id, e);
                    continue;
                }
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let uid = file_uid(self.relative(entry.path()), &metadata);
            if uid == id {
                found = Some(entry.path().to_path_buf());
            }
            seen.insert(uid, entry.into_path());
        }
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(seen);

        found.ok_or_else(|| StoreError::not_found(id.to_string()))
    }

    fn item_for(&self, path: &Path) -> Result<DocumentItem> {
        let id = self.uid_of(path)?;
        self.remember(&id, path);
        Ok(DocumentItem {
            id,
            name: file_name(path),
            is_folder: path.is_dir(),
            url: file_url(path)?,
        })
    }

    fn folder(&self, id: &str) -> Result<PathBuf> {
        let path = self.resolve(id)?;
        if path.is_dir() {
            Ok(path)
        } else {
            Err(StoreError::not_found(format!("folder {id}")))
        }
    }

    fn list(&self, folder_id: &str) -> Result<Vec<DocumentItem>> {
        let folder = self.folder(folder_id)?;
        let mut items = Vec::new();
        for entry in fs::read_dir(&folder)? {
            let path = entry?.path();
            if file_name(&path).starts_with('.') {
                continue;
            }
            items.push(self.item_for(&path)?);
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn metadata(&self, item_id: &str) -> Result<DocumentMetadata> {
        let path = self.resolve(item_id)?;
        let metadata = fs::metadata(&path)?;
        let created = metadata.created().or_else(|_| metadata.modified())?;
        Ok(DocumentMetadata {
            id: item_id.to_string(),
            name: file_name(&path),
            created_at: DateTime::<Utc>::from(created),
            uploader: owner_of(&metadata),
            size: metadata.len(),
            url: file_url(&path)?,
        })
    }

    fn move_item(&self, item_id: &str, new_parent_id: &str) -> Result<()> {
        let source = self.resolve(item_id)?;
        let parent = self.folder(new_parent_id)?;
        let dest = parent.join(file_name(&source));
        if dest == source {
            return Ok(());
        }
        if dest.exists() {
            return Err(StoreError::conflict(format!("{} already exists", dest.display())));
        }
        fs::rename(&source, &dest)?;
        self.remember(item_id, &dest);
        Ok(())
    }

    fn create_folder(&self, parent_id: &str, name: &str, on_conflict: ConflictPolicy) -> Result<String> {
        check_name(name)?;
        let parent = self.folder(parent_id)?;
        let mut path = parent.join(name);
        if path.exists() {
            match on_conflict {
                ConflictPolicy::Fail => {
                    return Err(StoreError::conflict(format!("{name} already exists")))
                }
                ConflictPolicy::Replace if path.is_dir() => return self.uid_of(&path),
                ConflictPolicy::Replace | ConflictPolicy::Rename => {
                    let mut n = 1;
                    while parent.join(renamed(name, n)).exists() {
                        n += 1;
                    }
                    path = parent.join(renamed(name, n));
                }
            }
        }
        fs::create_dir(&path)?;
        let id = self.uid_of(&path)?;
        self.remember(&id, &path);
        Ok(id)
    }

    fn find_child(&self, parent_id: &str, name: &str) -> Result<Option<DocumentItem>> {
        check_name(name)?;
        let path = self.folder(parent_id)?.join(name);
        if path.exists() {
            self.item_for(&path).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn check_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StoreError::transport(format!("invalid item name '{name}'"))),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_url(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .map_err(|_| StoreError::transport(format!("cannot build URL for {}", path.display())))
}

#[cfg(unix)]
fn owner_of(metadata: &fs::Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    format!("uid:{}", metadata.uid())
}

#[cfg(not(unix))]
fn owner_of(_metadata: &fs::Metadata) -> String {
    "unknown".to_string()
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn list(&self, folder_id: &str) -> Result<Vec<DocumentItem>> {
        let folder_id = folder_id.to_string();
        self.blocking(move |tree| tree.list(&folder_id)).await
    }

    async fn get_metadata(&self, item_id: &str) -> Result<DocumentMetadata> {
        let item_id = item_id.to_string();
        self.blocking(move |tree| tree.metadata(&item_id)).await
    }

    async fn exists(&self, item_id: &str) -> Result<bool> {
        match self.path_of(item_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn move_item(&self, item_id: &str, new_parent_id: &str) -> Result<()> {
        let item_id = item_id.to_string();
        let new_parent_id = new_parent_id.to_string();
        self.blocking(move |tree| tree.move_item(&item_id, &new_parent_id))
            .await
    }

    async fn copy_async(
        &self,
        item_id: &str,
        dest_parent_id: &str,
        dest_name: &str,
    ) -> Result<CopyOperation> {
        check_name(dest_name)?;
        let (source, parent) = {
            let item_id = item_id.to_string();
            let dest_parent_id = dest_parent_id.to_string();
            self.blocking(move |tree| Ok((tree.resolve(&item_id)?, tree.folder(&dest_parent_id)?)))
                .await?
        };
        let dest = parent.join(dest_name);
        if dest.exists() {
            return Err(StoreError::conflict(format!("{} already exists", dest.display())));
        }

        // Copy under a hidden name, then rename, so the copy only becomes
        // visible once complete.
        let partial = parent.join(format!(".{dest_name}{PARTIAL_SUFFIX}"));
        tokio::spawn(async move {
            let result = async {
                tokio::fs::copy(&source, &partial).await?;
                tokio::fs::rename(&partial, &dest).await
            }
            .await;
            if let Err(e) = result {
                warn!("Copy of {} to {} failed: {}", source.display(), dest.display(), e);
                let _ = tokio::fs::remove_file(&partial).await;
            }
        });

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
        let parent_id = parent_id.to_string();
        let name = name.to_string();
        self.blocking(move |tree| tree.create_folder(&parent_id, &name, on_conflict))
            .await
    }

    async fn find_child_by_name(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<DocumentItem>> {
        let parent_id = parent_id.to_string();
        let name = name.to_string();
        self.blocking(move |tree| tree.find_child(&parent_id, &name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store_with_folders() -> (TempDir, LocalDocumentStore) {
        let dir = TempDir::new().unwrap();
        for folder in ["intake", "closed", "archive"] {
            fs::create_dir_all(dir.path().join(folder)).unwrap();
        }
        let store = LocalDocumentStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn list_skips_hidden_entries() {
        let (dir, store) = store_with_folders();
        fs::write(dir.path().join("intake/b.docx"), b"b").unwrap();
        fs::write(dir.path().join("intake/a.docx"), b"a").unwrap();
        fs::write(dir.path().join("intake/.a.docx.partial-copy"), b"").unwrap();

        let items = store.list("intake").await.unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.docx", "b.docx"]);
        assert!(items[0].url.starts_with("file://"));
    }

    #[tokio::test]
    async fn ids_follow_files_across_moves() {
        let (dir, store) = store_with_folders();
        fs::write(dir.path().join("intake/a.docx"), b"abc").unwrap();
        let id = store.list("intake").await.unwrap()[0].id.clone();

        store.move_item(&id, "closed").await.unwrap();
        assert!(dir.path().join("closed/a.docx").exists());
        assert!(store.exists(&id).await.unwrap());

        let meta = store.get_metadata(&id).await.unwrap();
        assert_eq!(meta.name, "a.docx");
        assert_eq!(meta.size, 3);
    }

    #[tokio::test]
    async fn missing_items_do_not_exist() {
        let (_dir, store) = store_with_folders();
        assert!(!store.exists("path:intake/nope.docx").await.unwrap());
        assert!(!store.exists("../etc").await.unwrap());
    }

    #[tokio::test]
    async fn create_folder_renames_on_conflict() {
        let (dir, store) = store_with_folders();
        store.create_folder("archive", "Sprint 7", ConflictPolicy::Rename).await.unwrap();
        store.create_folder("archive", "Sprint 7", ConflictPolicy::Rename).await.unwrap();
        assert!(dir.path().join("archive/Sprint 7 (1)").is_dir());
        assert!(store
            .create_folder("archive", "Sprint 7", ConflictPolicy::Fail)
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn copies_land_under_destination() {
        let (dir, store) = store_with_folders();
        fs::write(dir.path().join("intake/a.docx"), b"abc").unwrap();
        let id = store.list("intake").await.unwrap()[0].id.clone();
        let folder = store.create_folder("archive", "Sprint 7", ConflictPolicy::Rename).await.unwrap();

        store.copy_async(&id, &folder, "a.docx").await.unwrap();
        let mut found = None;
        for _ in 0..50 {
            found = store.find_child_by_name(&folder, "a.docx").await.unwrap();
            if found.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let copy = found.expect("copy never appeared");
        assert_ne!(copy.id, id);
        assert_eq!(fs::read(dir.path().join("archive/Sprint 7/a.docx")).unwrap(), b"abc");
        assert!(dir.path().join("intake/a.docx").exists());
    }
}
