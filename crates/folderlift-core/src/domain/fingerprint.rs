//! Folder identity fingerprints
//!
//! A folder's identity for upload purposes is its absolute, lexically
//! normalized path together with its modification time. The fingerprint
//! hash is the SHA-256 of `"{path}_{secs}.{nanos:09}"`.
//!
//! Only the folder's own mtime participates, so editing a file deep in the
//! tree does not change the fingerprint unless the top-level directory
//! entry list changed as well.

use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::DomainError;
use super::newtypes::FingerprintHash;

/// Identity of a local folder as an upload unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderFingerprint {
    path: PathBuf,
    modified: DateTime<Utc>,
    hash: FingerprintHash,
}

impl FolderFingerprint {
    /// Computes the fingerprint of the folder at `path`
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path cannot be resolved,
    /// is not a directory, or has no readable modification time.
    pub fn compute(path: &Path) -> Result<Self, DomainError> {
        let absolute = normalize_path(path)?;

        let metadata = std::fs::metadata(&absolute).map_err(|e| {
            DomainError::InvalidPath(format!("{}: {}", absolute.display(), e))
        })?;

        if !metadata.is_dir() {
            return Err(DomainError::InvalidPath(format!(
                "not a directory: {}",
                absolute.display()
            )));
        }

        let modified = metadata.modified().map_err(|e| {
            DomainError::InvalidPath(format!(
                "no modification time for {}: {}",
                absolute.display(),
                e
            ))
        })?;

        Ok(Self::from_parts(absolute, modified))
    }

    /// Builds a fingerprint from an already-normalized path and an mtime
    pub fn from_parts(path: PathBuf, modified: SystemTime) -> Self {
        let (secs, nanos) = match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
            Err(e) => (-(e.duration().as_secs() as i64), e.duration().subsec_nanos()),
        };

        let mut hasher = Sha256::new();
        hasher.update(format!("{}_{}.{:09}", path.display(), secs, nanos).as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        Self {
            path,
            modified: DateTime::<Utc>::from(modified),
            // A SHA-256 hex digest always satisfies the FingerprintHash format
            hash: FingerprintHash(digest),
        }
    }

    /// Absolute, normalized folder path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folder modification time at fingerprinting
    #[must_use]
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Hex digest identifying the folder
    #[must_use]
    pub fn hash(&self) -> &FingerprintHash {
        &self.hash
    }

    /// Final path component, used as the remote folder name
    #[must_use]
    pub fn folder_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Makes `path` absolute and removes `.` and `..` components lexically
///
/// Symlinks are not resolved.
///
/// # Errors
/// Returns `DomainError::InvalidPath` if `path` is relative and the current
/// directory cannot be determined.
pub fn normalize_path(path: &Path) -> Result<PathBuf, DomainError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| DomainError::InvalidPath(format!("cannot resolve current dir: {e}")))?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
