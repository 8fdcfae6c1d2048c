//! Shared helpers for Drive adapter integration tests

use wiremock::MockServer;

use folderlift_core::domain::RemoteId;
use folderlift_drive::{DriveClient, DriveRemote};

pub const TOKEN: &str = "test-access-token";

/// Starts a mock server and returns a remote pointed at it
///
/// Metadata calls go to `{server}` and uploads to `{server}/upload`.
pub async fn setup_drive_mock() -> (MockServer, DriveRemote) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_urls(
        TOKEN,
        server.uri(),
        format!("{}/upload", server.uri()),
    )
    .expect("Failed to build client");
    (server, DriveRemote::new(client))
}

pub fn rid(s: &str) -> RemoteId {
    RemoteId::new(s.to_string()).unwrap()
}

/// The `q` query DriveRemote sends for a child lookup
pub fn child_query(parent: &str, name: &str, folders: bool) -> String {
    let op = if folders { "=" } else { "!=" };
    format!(
        "name = '{name}' and '{parent}' in parents and mimeType {op} \
         'application/vnd.google-apps.folder' and trashed = false"
    )
}
