//! FolderLift Engine - Upload orchestration
//!
//! Provides:
//! - Idempotent uploads of local folder trees, keyed by folder fingerprints
//! - Coalesced remote folder resolution
//! - Bounded, batched file transfer with an optional deadline
//! - Exponential backoff with post-failure reconciliation
//! - Resumable chunked file uploads
//!
//! ## Modules
//!
//! - [`folder_cache`] - (parent, name) → remote folder id, one creation per key
//! - [`retry`] - Retry/backoff state machine and controller
//! - [`scheduler`] - Batched worker pool for transfer units
//! - [`chunked`] - Per-file chunked upload with resume
//! - [`planner`] - Tree walk, folder resolution and ledger bookkeeping
//! - [`walker`] - `tokio::fs` implementation of the local walker port

pub mod chunked;
pub mod folder_cache;
pub mod planner;
pub mod retry;
pub mod scheduler;
pub mod walker;

use std::path::PathBuf;

use folderlift_core::domain::{DomainError, ErrorKind};
use thiserror::Error;

pub use chunked::ChunkedUploader;
pub use folder_cache::FolderCache;
pub use planner::{SubtreeSync, SyncPlanner};
pub use retry::{Reconciled, RetryController, RetryPolicy, RetryState};
pub use scheduler::{ScheduleResult, TransferScheduler, UnitWorker};
pub use walker::FsWalker;

/// Errors that can stop an upload operation
#[derive(Debug, Error)]
pub enum UploadError {
    /// A remote call failed for good (non-retriable, or retries exhausted)
    #[error("{operation} failed ({kind}): {message}")]
    Remote {
        operation: String,
        kind: ErrorKind,
        message: String,
    },

    /// Reading local content or metadata failed
    #[error("Local I/O error on {path}: {message}")]
    LocalIo { path: PathBuf, message: String },

    /// The ledger could not be read or written
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// A domain-level error propagated from folderlift-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl UploadError {
    /// Classification used in reports
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Remote { kind, .. } => *kind,
            UploadError::LocalIo { .. } => ErrorKind::LocalIo,
            UploadError::Ledger(_) | UploadError::Domain(_) => ErrorKind::Other,
        }
    }

    pub(crate) fn local_io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        UploadError::LocalIo {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
