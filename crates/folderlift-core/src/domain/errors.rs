//! Domain error types and the failure taxonomy
//!
//! [`DomainError`] covers validation failures and invalid state transitions.
//! [`RemoteError`] is the classified error remote adapters return through the
//! `anyhow` boundary of [`IRemoteDrive`](crate::ports::IRemoteDrive), and
//! [`ErrorKind`] is the classification the retry controller and the upload
//! report work with.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid fingerprint hash format (expected 64 lowercase hex chars)
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

// ============================================================================
// ErrorKind - failure classification
// ============================================================================

/// Classification of a failed remote or local operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The remote asked us to slow down (HTTP 429 or a rate-limit 403)
    RateLimited,
    /// 5xx responses and network-level failures
    ServerTransient,
    /// Credentials were rejected; never retried
    AuthInvalid,
    /// The addressed remote object does not exist
    NotFound,
    /// The run deadline passed before the unit was dispatched
    DeadlineExceeded,
    /// Reading local content failed
    LocalIo,
    /// Anything else
    Other,
}

impl ErrorKind {
    /// Whether a later run could succeed where this one failed
    #[must_use]
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::ServerTransient | ErrorKind::DeadlineExceeded
        )
    }

    /// Whether the retry controller backs off and tries again in-process
    #[must_use]
    pub fn is_backoff_eligible(self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::ServerTransient)
    }

    /// Stable snake_case name used in reports and logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerTransient => "server_transient",
            ErrorKind::AuthInvalid => "auth_invalid",
            ErrorKind::NotFound => "not_found",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::LocalIo => "local_io",
            ErrorKind::Other => "other",
        }
    }

    /// Classifies an error that crossed a port boundary
    ///
    /// A [`RemoteError`] anywhere in the cause chain wins. Otherwise the
    /// rendered message is matched against well-known transient markers
    /// (network, 429, 5xx), and a bare `std::io::Error` means local I/O.
    pub fn classify(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(remote) = cause.downcast_ref::<RemoteError>() {
                return remote.kind();
            }
        }

        let err_str = format!("{err:#}").to_lowercase();

        if err_str.contains("429")
            || err_str.contains("too many requests")
            || err_str.contains("rate limit")
        {
            return ErrorKind::RateLimited;
        }

        if err_str.contains("network")
            || err_str.contains("connection")
            || err_str.contains("timeout")
            || err_str.contains("dns")
            || err_str.contains("reset by peer")
            || err_str.contains("broken pipe")
            || err_str.contains("500")
            || err_str.contains("502")
            || err_str.contains("503")
            || err_str.contains("504")
            || err_str.contains("server error")
        {
            return ErrorKind::ServerTransient;
        }

        if err_str.contains("401") || err_str.contains("unauthorized") {
            return ErrorKind::AuthInvalid;
        }

        if err.chain().any(|c| c.downcast_ref::<std::io::Error>().is_some()) {
            return ErrorKind::LocalIo;
        }

        ErrorKind::Other
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RemoteError - classified adapter error
// ============================================================================

/// A remote failure already classified by the adapter that observed it
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Rate limit exceeded; `retry_after` carries the server's hint if any
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// A server-side (5xx) or network-level failure
    #[error("Transient server error: {0}")]
    ServerTransient(String),

    /// Credentials were rejected
    #[error("Authentication rejected: {0}")]
    AuthInvalid(String),

    /// The addressed object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other remote failure
    #[error("Remote error: {0}")]
    Other(String),
}

impl RemoteError {
    /// Returns the taxonomy entry for this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::RateLimited { .. } => ErrorKind::RateLimited,
            RemoteError::ServerTransient(_) => ErrorKind::ServerTransient,
            RemoteError::AuthInvalid(_) => ErrorKind::AuthInvalid,
            RemoteError::NotFound(_) => ErrorKind::NotFound,
            RemoteError::Other(_) => ErrorKind::Other,
        }
    }

    /// Extracts a server-supplied retry hint from anywhere in the cause chain
    pub fn retry_after_hint(err: &anyhow::Error) -> Option<Duration> {
        err.chain()
            .filter_map(|c| c.downcast_ref::<RemoteError>())
            .find_map(|r| match r {
                RemoteError::RateLimited { retry_after, .. } => *retry_after,
                _ => None,
            })
    }
}
