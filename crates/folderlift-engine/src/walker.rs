//! `tokio::fs` implementation of [`ILocalWalker`]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use folderlift_core::ports::{ILocalWalker, LocalFile, LocalFolder, LocalTree};

/// Walks real directories; symlinks and special files are skipped
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWalker;

impl FsWalker {
    pub fn new() -> Self {
        Self
    }

    fn walk_directory<'a>(
        &'a self,
        root: &'a Path,
        dir: &'a Path,
        depth: usize,
        tree: &'a mut LocalTree,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = tokio::fs::read_dir(dir)
                .await
                .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .with_context(|| format!("Failed to stat: {}", path.display()))?;

                let relative = match path.strip_prefix(root) {
                    Ok(r) => r.to_path_buf(),
                    Err(_) => {
                        warn!(path = %path.display(), "Entry outside walk root, skipping");
                        continue;
                    }
                };

                if file_type.is_symlink() {
                    debug!(path = %path.display(), "Skipping symlink");
                } else if file_type.is_dir() {
                    tree.folders.push(LocalFolder {
                        relative_path: relative,
                        depth: depth + 1,
                    });
                    self.walk_directory(root, &path, depth + 1, tree).await?;
                } else if file_type.is_file() {
                    let metadata = entry
                        .metadata()
                        .await
                        .with_context(|| format!("Failed to stat: {}", path.display()))?;
                    tree.files.push(LocalFile {
                        relative_path: relative,
                        size: metadata.len(),
                        modified: metadata.modified().ok(),
                    });
                }
            }

            Ok(())
        })
    }
}

#[async_trait::async_trait]
impl ILocalWalker for FsWalker {
    async fn walk(&self, root: &Path) -> Result<LocalTree> {
        let mut tree = LocalTree {
            root: root.to_path_buf(),
            ..LocalTree::default()
        };
        self.walk_directory(root, root, 0, &mut tree).await?;

        tree.folders.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
        tree.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        debug!(
            root = %root.display(),
            folders = tree.folders.len(),
            files = tree.files.len(),
            "Walked local tree"
        );
        Ok(tree)
    }

    async fn subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}
