//! Resumable upload sessions for Drive v3
//!
//! - [`create_upload_session`] - Opens a session; the session URL comes back in `Location`
//! - [`put_chunk`] - Sends one chunk with a `Content-Range` header
//! - [`query_session`] - Asks how many bytes the session has committed
//!
//! Drive answers an unfinished session with `308 Resume Incomplete` and a
//! `Range: bytes=0-N` header naming the last committed byte (no header means
//! nothing is committed yet). The final chunk gets `200`/`201` with the file
//! resource. Chunks other than the last must be multiples of 256 KiB.
//!
//! ## References
//!
//! - [Resumable upload](https://developers.google.com/drive/api/guides/manage-uploads#resumable)

use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Method, Response, StatusCode};
use serde_json::json;
use tracing::debug;

use folderlift_core::domain::RemoteId;
use folderlift_core::ports::{UploadProgress, UploadSession};

use crate::client::DriveClient;
use crate::provider::{DriveFile, FILE_FIELDS};
use crate::DriveError;

/// Opens a resumable upload for a new file named `name` under `parent`
///
/// # Returns
/// The session URL to send chunks to
pub async fn create_upload_session(
    client: &DriveClient,
    parent: &RemoteId,
    name: &str,
    size: u64,
) -> Result<String, DriveError> {
    let body = json!({
        "name": name,
        "parents": [parent.as_str()],
    });
    let request = client
        .upload_request(Method::POST, "/files")
        .query(&[
            ("uploadType", "resumable"),
            ("fields", FILE_FIELDS),
            ("supportsAllDrives", "true"),
        ])
        .header("X-Upload-Content-Length", size.to_string())
        .json(&body);

    let response = client.send(request).await?;
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            DriveError::InvalidResponse("upload session response has no Location header".into())
        })?;

    debug!(%parent, name, size, "Opened upload session");
    Ok(location)
}

/// Sends `data` as bytes `[offset, offset + len)` of the session
///
/// An empty `data` is only valid for a zero-byte file and finalizes it.
pub async fn put_chunk(
    client: &DriveClient,
    session: &UploadSession,
    offset: u64,
    data: Vec<u8>,
) -> Result<UploadProgress, DriveError> {
    let len = data.len() as u64;
    let request = client
        .session_request(Method::PUT, &session.uri)
        .header(CONTENT_RANGE, content_range(offset, len, session.total))
        .body(data);

    let progress = progress_from_response(client.send(request).await?).await?;
    debug!(offset, len, total = session.total, ?progress, "Chunk sent");
    Ok(progress)
}

/// Queries the committed offset of a session without sending data
pub async fn query_session(
    client: &DriveClient,
    session: &UploadSession,
) -> Result<UploadProgress, DriveError> {
    let request = client
        .session_request(Method::PUT, &session.uri)
        .header(CONTENT_RANGE, format!("bytes */{}", session.total))
        .body(Vec::new());

    let progress = progress_from_response(client.send(request).await?).await?;
    debug!(total = session.total, ?progress, "Queried upload session");
    Ok(progress)
}

/// `Content-Range` for a chunk of `len` bytes at `offset`
pub fn content_range(offset: u64, len: u64, total: u64) -> String {
    if len == 0 {
        format!("bytes */{total}")
    } else {
        format!("bytes {}-{}/{}", offset, offset + len - 1, total)
    }
}

/// Number of committed bytes from a `Range: bytes=0-N` header
pub fn committed_from_range(value: &str) -> Option<u64> {
    let last = value.trim().strip_prefix("bytes=")?.split_once('-')?.1;
    last.trim().parse::<u64>().ok().map(|n| n + 1)
}

async fn progress_from_response(response: Response) -> Result<UploadProgress, DriveError> {
    if response.status() == StatusCode::PERMANENT_REDIRECT {
        let committed = match response.headers().get(RANGE) {
            None => 0,
            Some(value) => value
                .to_str()
                .ok()
                .and_then(committed_from_range)
                .ok_or_else(|| DriveError::InvalidResponse(format!("bad Range header: {value:?}")))?,
        };
        return Ok(UploadProgress::InProgress { committed });
    }

    let file: DriveFile = response
        .json()
        .await
        .map_err(|e| DriveError::InvalidResponse(format!("upload completion: {e}")))?;
    Ok(UploadProgress::Complete(file.into_remote_object()?))
}
