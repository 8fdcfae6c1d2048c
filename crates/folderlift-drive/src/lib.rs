//! FolderLift Drive - Google Drive v3 adapter
//!
//! Implements the `IRemoteDrive` port over the Drive v3 REST API:
//! - Folder and file lookups by parent and name (`files.list` with a `q` query)
//! - Folder creation (`files.create`)
//! - Resumable uploads (`uploadType=resumable`, `Content-Range`, `308 Resume Incomplete`)
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client and response error mapping
//! - [`provider`] - [`DriveRemote`](provider::DriveRemote), the port implementation
//! - [`upload`] - Resumable upload session requests

pub mod client;
pub mod provider;
pub mod upload;

use std::time::Duration;

use folderlift_core::domain::RemoteError;
use thiserror::Error;

pub use client::DriveClient;
pub use provider::DriveRemote;

/// Errors that can occur when talking to the Drive API
#[derive(Debug, Error)]
pub enum DriveError {
    /// The access token was rejected (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Permission denied for a reason other than quota (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The addressed file, folder or upload session does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate or quota limit hit (429, or 403 with a rate-limit reason)
    #[error("Too many requests: {message}")]
    TooManyRequests {
        message: String,
        /// Server hint from the `Retry-After` header
        retry_after: Option<Duration>,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<DriveError> for RemoteError {
    fn from(err: DriveError) -> Self {
        let message = err.to_string();
        match err {
            DriveError::Unauthorized(_) => RemoteError::AuthInvalid(message),
            DriveError::NotFound(_) => RemoteError::NotFound(message),
            DriveError::TooManyRequests { retry_after, .. } => RemoteError::RateLimited {
                message,
                retry_after,
            },
            DriveError::ServerError(_) => RemoteError::ServerTransient(message),
            DriveError::NetworkError(ref e)
                if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() =>
            {
                RemoteError::ServerTransient(message)
            }
            DriveError::NetworkError(_)
            | DriveError::Forbidden(_)
            | DriveError::Status { .. }
            | DriveError::InvalidResponse(_) => RemoteError::Other(message),
        }
    }
}
