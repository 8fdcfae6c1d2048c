//! Google Drive API client
//!
//! Thin wrapper around `reqwest::Client` that adds the bearer token, builds
//! URLs against the metadata and upload endpoints, and turns non-success
//! responses into [`DriveError`]s.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use folderlift_drive::DriveClient;
//!
//! # fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token-here")?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{redirect, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::DriveError;

/// Base URL for Drive v3 metadata requests
pub const DRIVE_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for Drive v3 media uploads
pub const DRIVE_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// Whole-request timeout; a single chunk of up to 10 MiB must fit in it
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// `403` reasons that mean "slow down" rather than "not allowed"
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

// ============================================================================
// Drive error body
// ============================================================================

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Drive v3 calls
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    api_base_url: String,
    upload_base_url: String,
    access_token: String,
}

impl DriveClient {
    /// Creates a client against the public Drive endpoints
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        Self::with_base_urls(access_token, DRIVE_API_BASE_URL, DRIVE_UPLOAD_BASE_URL)
    }

    /// Creates a client with custom base URLs (useful for testing)
    pub fn with_base_urls(
        access_token: impl Into<String>,
        api_base_url: impl Into<String>,
        upload_base_url: impl Into<String>,
    ) -> Result<Self> {
        // 308 is "Resume Incomplete" for upload sessions, never a redirect
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            upload_base_url: upload_base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    /// Replaces the access token
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated DriveClient access token");
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn upload_base_url(&self) -> &str {
        &self.upload_base_url
    }

    /// Authenticated request against the metadata endpoint
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to the base URL (e.g. "/files")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_base_url, path);
        self.client.request(method, url).bearer_auth(&self.access_token)
    }

    /// Authenticated request against the upload endpoint
    pub fn upload_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.upload_base_url, path);
        self.client.request(method, url).bearer_auth(&self.access_token)
    }

    /// Authenticated request to an absolute URL, such as an upload session
    pub fn session_request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.access_token)
    }

    /// Sends a request and maps any failure to a [`DriveError`]
    ///
    /// `308 Permanent Redirect` is passed through as a normal response since
    /// upload sessions use it to report partial progress.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, DriveError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() || status == StatusCode::PERMANENT_REDIRECT {
            return Ok(response);
        }

        Err(error_from_response(response).await)
    }
}

/// Builds a [`DriveError`] from a failed response, reading its JSON body
pub(crate) async fn error_from_response(response: Response) -> DriveError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);

    let body = response.text().await.unwrap_or_default();
    let (message, reasons) = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => (
            envelope.error.message,
            envelope
                .error
                .errors
                .into_iter()
                .map(|d| d.reason)
                .collect::<Vec<_>>(),
        ),
        Err(_) => (body.trim().to_string(), Vec::new()),
    };
    let message = if message.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {message}")
    };

    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && reasons
                .iter()
                .any(|r| RATE_LIMIT_REASONS.contains(&r.as_str())));

    if rate_limited {
        warn!(%status, ?retry_after, "Drive API rate limit hit");
        return DriveError::TooManyRequests {
            message,
            retry_after,
        };
    }

    match status {
        StatusCode::UNAUTHORIZED => DriveError::Unauthorized(message),
        StatusCode::FORBIDDEN => DriveError::Forbidden(message),
        StatusCode::NOT_FOUND => DriveError::NotFound(message),
        s if s.is_server_error() => DriveError::ServerError(message),
        s => DriveError::Status {
            status: s.as_u16(),
            message,
        },
    }
}

/// Parses a `Retry-After` value given either as seconds or as an HTTP date
///
/// Dates in the past, or more than an hour out, are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let diff = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Some(secs) = u64::try_from(diff.num_seconds())
            .ok()
            .filter(|&s| s > 0 && s <= 3600)
        {
            return Some(Duration::from_secs(secs));
        }
    }

    warn!(value, "Could not parse Retry-After header, ignoring it");
    None
}
