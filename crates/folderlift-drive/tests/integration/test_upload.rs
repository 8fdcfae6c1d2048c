//! Resumable upload sessions

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use folderlift_core::domain::{ErrorKind, RemoteId};
use folderlift_core::ports::{IRemoteDrive, UploadProgress, UploadSession};

use crate::common::{rid, setup_drive_mock};

const TOTAL: u64 = 300_000;
const CHUNK: usize = 262_144;

#[tokio::test]
async fn test_resumable_upload_flow() {
    let (server, drive) = setup_drive_mock().await;
    let session_url = format!("{}/session/s1", server.uri());

    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .and(query_param("uploadType", "resumable"))
        .and(header("X-Upload-Content-Length", "300000"))
        .and(body_partial_json(json!({ "name": "video.mp4", "parents": ["fld_1"] })))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session_url.as_str()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/session/s1"))
        .and(header("Content-Range", "bytes 0-262143/300000"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-262143"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/session/s1"))
        .and(header("Content-Range", "bytes 262144-299999/300000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file_1",
            "name": "video.mp4",
            "size": "300000"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = drive
        .begin_upload(&rid("fld_1"), "video.mp4", TOTAL)
        .await
        .unwrap();
    assert_eq!(session.uri, session_url);
    assert_eq!(session.total, TOTAL);

    let first = drive
        .upload_chunk(&session, 0, vec![0u8; CHUNK])
        .await
        .unwrap();
    assert_eq!(
        first,
        UploadProgress::InProgress {
            committed: CHUNK as u64
        }
    );

    let rest = (TOTAL as usize) - CHUNK;
    let last = drive
        .upload_chunk(&session, CHUNK as u64, vec![1u8; rest])
        .await
        .unwrap();
    match last {
        UploadProgress::Complete(object) => {
            assert_eq!(object.id, rid("file_1"));
            assert_eq!(object.size, Some(TOTAL));
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_query_upload_reports_committed_offset() {
    let (server, drive) = setup_drive_mock().await;

    Mock::given(method("PUT"))
        .and(path("/session/partial"))
        .and(header("Content-Range", "bytes */300000"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-99"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/fresh"))
        .and(header("Content-Range", "bytes */300000"))
        .respond_with(ResponseTemplate::new(308))
        .mount(&server)
        .await;

    let partial = UploadSession {
        uri: format!("{}/session/partial", server.uri()),
        total: TOTAL,
    };
    let fresh = UploadSession {
        uri: format!("{}/session/fresh", server.uri()),
        total: TOTAL,
    };

    assert_eq!(
        drive.query_upload(&partial).await.unwrap(),
        UploadProgress::InProgress { committed: 100 }
    );
    assert_eq!(
        drive.query_upload(&fresh).await.unwrap(),
        UploadProgress::InProgress { committed: 0 }
    );
}

#[tokio::test]
async fn test_query_upload_on_finished_session() {
    let (server, drive) = setup_drive_mock().await;

    Mock::given(method("PUT"))
        .and(path("/session/done"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "file_7",
            "name": "a.txt",
            "size": "5"
        })))
        .mount(&server)
        .await;

    let session = UploadSession {
        uri: format!("{}/session/done", server.uri()),
        total: 5,
    };
    match drive.query_upload(&session).await.unwrap() {
        UploadProgress::Complete(object) => assert_eq!(object.id, rid("file_7")),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_file_is_finalized_with_star_range() {
    let (server, drive) = setup_drive_mock().await;

    Mock::given(method("PUT"))
        .and(path("/session/empty"))
        .and(header("Content-Range", "bytes */0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file_0",
            "name": "empty.txt",
            "size": "0"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = UploadSession {
        uri: format!("{}/session/empty", server.uri()),
        total: 0,
    };
    let progress = drive.upload_chunk(&session, 0, Vec::new()).await.unwrap();
    assert!(matches!(progress, UploadProgress::Complete(ref o) if o.size == Some(0)));
}

#[tokio::test]
async fn test_session_without_location_is_rejected() {
    let (server, drive) = setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = drive
        .begin_upload(&RemoteId::new("fld_1".to_string()).unwrap(), "a.txt", 1)
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::classify(&err), ErrorKind::Other);
    assert!(format!("{err:#}").contains("Location"));
}
