//! Local filesystem walker port
//!
//! Produces an ordered snapshot of a local folder tree. Paths inside the
//! snapshot are relative to the walked root; the root itself is not listed
//! as a folder.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A folder below the walked root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFolder {
    /// Path relative to the root
    pub relative_path: PathBuf,
    /// 1 for direct children of the root
    pub depth: usize,
}

/// A regular file somewhere in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Path relative to the root
    pub relative_path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl LocalFile {
    /// Relative path of the containing folder (empty for files in the root)
    #[must_use]
    pub fn parent(&self) -> PathBuf {
        self.relative_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// Snapshot of a local tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalTree {
    pub root: PathBuf,
    /// Sorted by depth, then by path
    pub folders: Vec<LocalFolder>,
    /// Sorted by path
    pub files: Vec<LocalFile>,
}

impl LocalTree {
    /// Sum of all file sizes
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[async_trait::async_trait]
pub trait ILocalWalker: Send + Sync {
    /// Walks `root` recursively without following symlinks
    async fn walk(&self, root: &Path) -> anyhow::Result<LocalTree>;

    /// Immediate subdirectories of `dir`, sorted by name
    async fn subdirectories(&self, dir: &Path) -> anyhow::Result<Vec<PathBuf>>;
}
