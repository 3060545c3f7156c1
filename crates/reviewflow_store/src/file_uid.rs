//! Stable identities for files in a local document tree.
//!
//! Review rows key on the document id, so an id must survive the file being
//! moved between folders. Device and inode numbers do; paths do not, so
//! path-derived ids are only a fallback for platforms without them.

use std::fs::Metadata;
use std::path::Path;

pub const STRONG_PREFIXES: &[&str] = &["unix:", "win:"];

/// Identity for a file, preferring the filesystem's own.
pub fn file_uid(relative_path: &Path, metadata: &Metadata) -> String {
    strong_uid_from_metadata(metadata).unwrap_or_else(|| weak_uid_from_path(relative_path))
}

/// Whether `id` names a file by filesystem identity rather than by path.
pub fn is_strong(id: &str) -> bool {
    STRONG_PREFIXES.iter().any(|p| id.starts_with(p))
}

pub fn weak_uid_from_path(relative_path: &Path) -> String {
    format!("path:{}", normalize_path(relative_path))
}

fn normalize_path(path: &Path) -> String {
    let path_str = path.to_string_lossy();
    if cfg!(windows) {
        path_str.replace('\\', "/")
    } else {
        path_str.into_owned()
    }
}

#[allow(unreachable_code)]
fn strong_uid_from_metadata(metadata: &Metadata) -> Option<String> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        return Some(format!("unix:{}:{}", metadata.dev(), metadata.ino()));
    }

    #[cfg(not(unix))]
    {
        let _ = metadata;
        None
    }
}
