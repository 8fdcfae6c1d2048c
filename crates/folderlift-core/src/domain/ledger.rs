//! Ledger entries recording completed subtree uploads

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::fingerprint::FolderFingerprint;
use super::newtypes::{FingerprintHash, RemoteId};

/// Status stored alongside a ledger entry
///
/// Only complete subtrees are ever recorded, so there is a single variant;
/// it is persisted so older or foreign rows can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Completed,
}

impl LedgerStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerStatus::Completed => "completed",
        }
    }
}

impl Display for LedgerStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(LedgerStatus::Completed),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown ledger status: {other}"
            ))),
        }
    }
}

/// One successfully uploaded local folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Identity of the folder at the time of upload
    pub fingerprint: FingerprintHash,
    /// Absolute local path that was uploaded
    pub folder_path: PathBuf,
    /// Folder name as created remotely
    pub folder_name: String,
    /// Remote id of the folder created for the subtree root
    pub remote_id: RemoteId,
    /// When the subtree finished uploading
    pub uploaded_at: DateTime<Utc>,
    pub status: LedgerStatus,
}

impl LedgerEntry {
    /// Builds the entry for a subtree that just finished uploading
    pub fn completed(fingerprint: &FolderFingerprint, remote_id: RemoteId) -> Self {
        Self {
            fingerprint: fingerprint.hash().clone(),
            folder_path: fingerprint.path().to_path_buf(),
            folder_name: fingerprint.folder_name(),
            remote_id,
            uploaded_at: Utc::now(),
            status: LedgerStatus::Completed,
        }
    }
}
