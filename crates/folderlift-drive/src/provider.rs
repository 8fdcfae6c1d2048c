//! DriveRemote - IRemoteDrive implementation for Google Drive v3
//!
//! Wraps the [`DriveClient`] and delegates resumable uploads to the
//! [`upload`](crate::upload) module.
//!
//! ## Design Notes
//!
//! - Lookups use `files.list` with a `q` query scoped to one parent and
//!   excluding trashed items. Names are escaped for the query language.
//! - Every error leaves this module as a [`RemoteError`] inside an
//!   `anyhow::Error`, so the engine can classify it.

use anyhow::Result;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use folderlift_core::domain::{RemoteError, RemoteId};
use folderlift_core::ports::{IRemoteDrive, RemoteObject, UploadProgress, UploadSession};

use crate::client::DriveClient;
use crate::upload;
use crate::DriveError;

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested for single-file responses
pub(crate) const FILE_FIELDS: &str = "id,name,size";

// ============================================================================
// Drive API response types
// ============================================================================

/// A file resource as returned with `fields=id,name,size`
#[derive(Debug, Deserialize)]
pub(crate) struct DriveFile {
    id: String,
    name: String,
    /// Drive reports sizes as decimal strings; folders have none
    #[serde(default)]
    size: Option<String>,
}

impl DriveFile {
    pub(crate) fn into_remote_object(self) -> Result<RemoteObject, DriveError> {
        let id = RemoteId::new(self.id)
            .map_err(|e| DriveError::InvalidResponse(format!("bad file id: {e}")))?;
        Ok(RemoteObject {
            id,
            name: self.name,
            size: self.size.and_then(|s| s.parse().ok()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Escapes a value for use inside a single-quoted `q` string
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn child_query(parent: &RemoteId, name: &str, folders: bool) -> String {
    let op = if folders { "=" } else { "!=" };
    format!(
        "name = '{}' and '{}' in parents and mimeType {op} '{FOLDER_MIME_TYPE}' and trashed = false",
        escape_query_value(name),
        escape_query_value(parent.as_str()),
    )
}

fn remote_error(operation: &str, err: DriveError) -> anyhow::Error {
    anyhow::Error::new(RemoteError::from(err)).context(format!("Drive {operation} failed"))
}

// ============================================================================
// DriveRemote
// ============================================================================

pub struct DriveRemote {
    client: DriveClient,
}

impl DriveRemote {
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }

    /// First non-trashed child of `parent` named `name`, folder or not
    async fn find_child(
        &self,
        parent: &RemoteId,
        name: &str,
        folders: bool,
    ) -> Result<Option<DriveFile>, DriveError> {
        let q = child_query(parent, name, folders);
        debug!(%parent, name, folders, "Looking up Drive child");

        let request = self.client.request(Method::GET, "/files").query(&[
            ("q", q.as_str()),
            ("fields", "files(id,name,size)"),
            ("pageSize", "10"),
            ("spaces", "drive"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ]);
        let list: FileList = self
            .client
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| DriveError::InvalidResponse(format!("file list: {e}")))?;

        if list.files.len() > 1 {
            debug!(%parent, name, count = list.files.len(), "Several matches, using the first");
        }
        Ok(list.files.into_iter().next())
    }
}

#[async_trait::async_trait]
impl IRemoteDrive for DriveRemote {
    async fn find_folder(&self, parent: &RemoteId, name: &str) -> Result<Option<RemoteId>> {
        let found = self
            .find_child(parent, name, true)
            .await
            .map_err(|e| remote_error("find_folder", e))?;
        found
            .map(|f| f.into_remote_object().map(|o| o.id))
            .transpose()
            .map_err(|e| remote_error("find_folder", e))
    }

    async fn create_folder(&self, parent: &RemoteId, name: &str) -> Result<RemoteId> {
        let body = json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent.as_str()],
        });
        let request = self
            .client
            .request(Method::POST, "/files")
            .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
            .json(&body);

        let created: DriveFile = self
            .client
            .send(request)
            .await
            .map_err(|e| remote_error("create_folder", e))?
            .json()
            .await
            .map_err(|e| {
                remote_error(
                    "create_folder",
                    DriveError::InvalidResponse(format!("created folder: {e}")),
                )
            })?;
        let object = created
            .into_remote_object()
            .map_err(|e| remote_error("create_folder", e))?;

        info!(%parent, name, id = %object.id, "Created Drive folder");
        Ok(object.id)
    }

    async fn find_file(&self, parent: &RemoteId, name: &str) -> Result<Option<RemoteObject>> {
        let found = self
            .find_child(parent, name, false)
            .await
            .map_err(|e| remote_error("find_file", e))?;
        found
            .map(DriveFile::into_remote_object)
            .transpose()
            .map_err(|e| remote_error("find_file", e))
    }

    async fn begin_upload(&self, parent: &RemoteId, name: &str, size: u64) -> Result<UploadSession> {
        let uri = upload::create_upload_session(&self.client, parent, name, size)
            .await
            .map_err(|e| remote_error("begin_upload", e))?;
        Ok(UploadSession { uri, total: size })
    }

    async fn upload_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<UploadProgress> {
        upload::put_chunk(&self.client, session, offset, data)
            .await
            .map_err(|e| remote_error("upload_chunk", e))
    }

    async fn query_upload(&self, session: &UploadSession) -> Result<UploadProgress> {
        upload::query_session(&self.client, session)
            .await
            .map_err(|e| remote_error("query_upload", e))
    }
}
