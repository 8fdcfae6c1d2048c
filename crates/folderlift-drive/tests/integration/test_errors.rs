//! HTTP status and network error classification

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use folderlift_core::domain::{ErrorKind, RemoteError};
use folderlift_core::ports::{IRemoteDrive, UploadSession};
use folderlift_drive::{DriveClient, DriveRemote};

use crate::common::{rid, setup_drive_mock};

async fn mount_list_error(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(template)
        .mount(server)
        .await;
}

fn drive_error(code: u16, reason: &str, message: &str) -> serde_json::Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{ "domain": "usageLimits", "reason": reason, "message": message }]
        }
    })
}

#[tokio::test]
async fn test_429_is_rate_limited_with_retry_after() {
    let (server, drive) = setup_drive_mock().await;
    mount_list_error(
        &server,
        ResponseTemplate::new(429)
            .insert_header("Retry-After", "7")
            .set_body_json(drive_error(429, "rateLimitExceeded", "Rate Limit Exceeded")),
    )
    .await;

    let err = drive.find_folder(&rid("root"), "docs").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&err), ErrorKind::RateLimited);
    assert_eq!(
        RemoteError::retry_after_hint(&err),
        Some(Duration::from_secs(7))
    );
}

#[tokio::test]
async fn test_403_rate_limit_reason_is_rate_limited() {
    let (server, drive) = setup_drive_mock().await;
    mount_list_error(
        &server,
        ResponseTemplate::new(403).set_body_json(drive_error(
            403,
            "userRateLimitExceeded",
            "User Rate Limit Exceeded",
        )),
    )
    .await;

    let err = drive.find_file(&rid("root"), "a.txt").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&err), ErrorKind::RateLimited);
    assert_eq!(RemoteError::retry_after_hint(&err), None);
}

#[tokio::test]
async fn test_403_other_reason_is_not_retriable() {
    let (server, drive) = setup_drive_mock().await;
    mount_list_error(
        &server,
        ResponseTemplate::new(403).set_body_json(drive_error(
            403,
            "insufficientFilePermissions",
            "The user does not have sufficient permissions",
        )),
    )
    .await;

    let err = drive.find_file(&rid("root"), "a.txt").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&err), ErrorKind::Other);
    assert!(format!("{err:#}").contains("sufficient permissions"));
}

#[tokio::test]
async fn test_401_is_auth_invalid() {
    let (server, drive) = setup_drive_mock().await;
    mount_list_error(
        &server,
        ResponseTemplate::new(401).set_body_json(drive_error(401, "authError", "Invalid Credentials")),
    )
    .await;

    let err = drive.find_folder(&rid("root"), "docs").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&err), ErrorKind::AuthInvalid);
}

#[tokio::test]
async fn test_5xx_is_server_transient() {
    let (server, drive) = setup_drive_mock().await;
    mount_list_error(&server, ResponseTemplate::new(503).set_body_string("Service Unavailable")).await;

    let err = drive.find_folder(&rid("root"), "docs").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&err), ErrorKind::ServerTransient);
    assert!(ErrorKind::classify(&err).is_retriable());
}

#[tokio::test]
async fn test_404_session_is_not_found() {
    let (server, drive) = setup_drive_mock().await;
    Mock::given(method("PUT"))
        .and(path("/session/expired"))
        .respond_with(ResponseTemplate::new(404).set_body_json(drive_error(404, "notFound", "Not Found")))
        .mount(&server)
        .await;

    let session = UploadSession {
        uri: format!("{}/session/expired", server.uri()),
        total: 10,
    };
    let err = drive.query_upload(&session).await.unwrap_err();
    assert_eq!(ErrorKind::classify(&err), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_connection_failure_is_server_transient() {
    // Bind then drop a listener so its port refuses connections
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let client = DriveClient::with_base_urls("t", uri.clone(), format!("{uri}/upload")).unwrap();
    let drive = DriveRemote::new(client);

    let err = drive.find_folder(&rid("root"), "docs").await.unwrap_err();
    assert_eq!(ErrorKind::classify(&err), ErrorKind::ServerTransient);
}
