//! Remote drive port (driven/secondary port)
//!
//! The remote is a hierarchical namespace of folders and files addressed by
//! parent id + name. File content goes through resumable upload sessions:
//! a session is opened once per file, chunks are sent at increasing
//! offsets, and the committed offset can be queried to resume.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` at the port boundary. Adapters attach a
//!   [`RemoteError`](crate::domain::RemoteError) so the engine can classify
//!   failures with [`ErrorKind::classify`](crate::domain::ErrorKind::classify).
//! - Uses `#[async_trait]` for async trait methods.

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::RemoteId;

/// A file as reported by the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: RemoteId,
    pub name: String,
    /// Size in bytes, when the remote reports one
    pub size: Option<u64>,
}

/// Handle to an open resumable upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Adapter-specific session locator (an upload URL for HTTP remotes)
    pub uri: String,
    /// Total number of bytes the session expects
    pub total: u64,
}

/// Progress of a resumable upload after a chunk or a status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadProgress {
    /// The remote holds bytes `[0, committed)`
    InProgress { committed: u64 },
    /// The object is finalized
    Complete(RemoteObject),
}

/// Remote drive operations needed by the upload engine
#[async_trait::async_trait]
pub trait IRemoteDrive: Send + Sync {
    /// Finds a non-trashed folder named `name` directly under `parent`
    async fn find_folder(&self, parent: &RemoteId, name: &str) -> anyhow::Result<Option<RemoteId>>;

    /// Creates a folder named `name` under `parent`
    async fn create_folder(&self, parent: &RemoteId, name: &str) -> anyhow::Result<RemoteId>;

    /// Finds a non-trashed, non-folder object named `name` directly under `parent`
    async fn find_file(&self, parent: &RemoteId, name: &str)
        -> anyhow::Result<Option<RemoteObject>>;

    /// Opens a resumable upload for a new file of `size` bytes
    async fn begin_upload(
        &self,
        parent: &RemoteId,
        name: &str,
        size: u64,
    ) -> anyhow::Result<UploadSession>;

    /// Sends `data` starting at byte `offset`
    async fn upload_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        data: Vec<u8>,
    ) -> anyhow::Result<UploadProgress>;

    /// Asks the remote how much of the session it has committed
    async fn query_upload(&self, session: &UploadSession) -> anyhow::Result<UploadProgress>;
}
