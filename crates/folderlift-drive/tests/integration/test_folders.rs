//! Folder and file lookups, folder creation

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use folderlift_core::ports::IRemoteDrive;
use folderlift_drive::provider::FOLDER_MIME_TYPE;

use crate::common::{child_query, rid, setup_drive_mock, TOKEN};

#[tokio::test]
async fn test_find_folder_returns_first_match() {
    let (server, drive) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(query_param("q", child_query("root", "docs", true).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                { "id": "fld_1", "name": "docs" },
                { "id": "fld_2", "name": "docs" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = drive.find_folder(&rid("root"), "docs").await.unwrap();
    assert_eq!(found, Some(rid("fld_1")));
}

#[tokio::test]
async fn test_find_folder_without_match() {
    let (server, drive) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .mount(&server)
        .await;

    assert_eq!(drive.find_folder(&rid("root"), "missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_find_file_escapes_name_and_parses_size() {
    let (server, drive) = setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", child_query("fld_1", "it\\'s.txt", false).as_str()))
        .and(query_param("fields", "files(id,name,size)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "file_9", "name": "it's.txt", "size": "2048" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let object = drive
        .find_file(&rid("fld_1"), "it's.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(object.id, rid("file_9"));
    assert_eq!(object.name, "it's.txt");
    assert_eq!(object.size, Some(2048));
}

#[tokio::test]
async fn test_create_folder_sends_parent_and_mime_type() {
    let (server, drive) = setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/files"))
        .and(query_param("fields", "id,name,size"))
        .and(body_partial_json(json!({
            "name": "reports",
            "mimeType": FOLDER_MIME_TYPE,
            "parents": ["root"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "fld_new",
            "name": "reports"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = drive.create_folder(&rid("root"), "reports").await.unwrap();
    assert_eq!(id, rid("fld_new"));
}

#[tokio::test]
async fn test_create_folder_with_malformed_body_is_an_error() {
    let (server, drive) = setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = drive.create_folder(&rid("root"), "reports").await.unwrap_err();
    assert!(format!("{err:#}").contains("Invalid response"));
}
