//! Per-unit outcomes and the run report

use std::path::PathBuf;

use serde::Serialize;

use super::errors::ErrorKind;
use super::newtypes::RemoteId;

/// Final result of one transfer unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The file was uploaded in this run
    Succeeded { remote_id: RemoteId },
    /// A same-named file already existed in the target folder
    SkippedExisting { remote_id: RemoteId },
    /// The unit could not be completed
    Failed {
        kind: ErrorKind,
        retriable: bool,
        message: String,
    },
}

impl UploadOutcome {
    /// Builds a failure whose retriability follows from `kind`
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        UploadOutcome::Failed {
            kind,
            retriable: kind.is_retriable(),
            message: message.into(),
        }
    }

    /// Succeeded or skipped
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, UploadOutcome::Failed { .. })
    }

    #[must_use]
    pub fn remote_id(&self) -> Option<&RemoteId> {
        match self {
            UploadOutcome::Succeeded { remote_id }
            | UploadOutcome::SkippedExisting { remote_id } => Some(remote_id),
            UploadOutcome::Failed { .. } => None,
        }
    }
}

/// A unit (file or folder) that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUnit {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub retriable: bool,
    pub message: String,
}

/// How a local subtree ended up after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubtreeStatus {
    /// Every file and folder made it; the ledger was updated
    Completed { remote_id: RemoteId },
    /// The ledger already had this fingerprint; nothing was sent
    AlreadyUploaded { remote_id: RemoteId },
    /// Some units failed or never started; the ledger was left untouched
    Partial { failed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtreeReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: SubtreeStatus,
}

/// Aggregate result of an `upload_tree` or `upload_all` run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    /// Remote folders resolved (found or created) for uploaded subtrees
    pub uploaded_folders: usize,
    /// Files transferred in this run
    pub uploaded_files: usize,
    /// Files that already existed remotely plus subtrees skipped via the ledger
    pub skipped: usize,
    pub failed: Vec<FailedUnit>,
    pub subtrees: Vec<SubtreeReport>,
    /// The scheduler fell back to sequential execution at least once
    pub degraded: bool,
    pub duration_ms: u64,
}

impl UploadReport {
    /// Accounts for one unit's outcome
    pub fn record_outcome(&mut self, path: PathBuf, outcome: &UploadOutcome) {
        match outcome {
            UploadOutcome::Succeeded { .. } => self.uploaded_files += 1,
            UploadOutcome::SkippedExisting { .. } => self.skipped += 1,
            UploadOutcome::Failed {
                kind,
                retriable,
                message,
            } => self.failed.push(FailedUnit {
                path,
                kind: *kind,
                retriable: *retriable,
                message: message.clone(),
            }),
        }
    }

    /// Folds another report into this one
    pub fn merge(&mut self, other: UploadReport) {
        self.uploaded_folders += other.uploaded_folders;
        self.uploaded_files += other.uploaded_files;
        self.skipped += other.skipped;
        self.failed.extend(other.failed);
        self.subtrees.extend(other.subtrees);
        self.degraded |= other.degraded;
    }

    /// True when no unit failed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of subtrees in each state: (completed, already uploaded, partial)
    #[must_use]
    pub fn subtree_counts(&self) -> (usize, usize, usize) {
        self.subtrees
            .iter()
            .fold((0, 0, 0), |(c, a, p), s| match s.status {
                SubtreeStatus::Completed { .. } => (c + 1, a, p),
                SubtreeStatus::AlreadyUploaded { .. } => (c, a + 1, p),
                SubtreeStatus::Partial { .. } => (c, a, p + 1),
            })
    }
}
