//! upload_tree: folder mirroring, ledger bookkeeping and failure isolation

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use folderlift_core::config::UploadOptions;
use folderlift_core::domain::{ErrorKind, RemoteError, SubtreeStatus};
use folderlift_core::ports::ILedger;
use folderlift_engine::{FolderCache, FsWalker, SyncPlanner, UploadError};

use crate::common::{
    fast_retry, memory_ledger, planner, root_id, sample_tree, write_file, FakeDrive, Failure, Op,
};

#[tokio::test]
async fn test_upload_tree_mirrors_folders_and_records_ledger() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_tree(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    let ledger = memory_ledger().await;

    let report = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert!(report.is_complete(), "failures: {:?}", report.failed);
    assert_eq!(report.uploaded_files, 4);
    assert_eq!(report.uploaded_folders, 4);
    assert_eq!(report.skipped, 0);

    let project = drive.folder_id(&root_id(), "project").unwrap();
    let src = drive.folder_id(&project, "src").unwrap();
    let util = drive.folder_id(&src, "util").unwrap();
    assert!(drive.folder_id(&project, "docs").is_some());
    assert_eq!(drive.folder_count(), 4);
    assert_eq!(drive.file_content(&util, "mod.rs").unwrap(), b"pub mod x;");
    assert_eq!(drive.file_content(&project, "readme.txt").unwrap(), b"hello");

    assert_eq!(report.subtrees.len(), 1);
    assert_eq!(
        report.subtrees[0].status,
        SubtreeStatus::Completed {
            remote_id: project.clone()
        }
    );

    let entries = ledger.list_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].remote_id, project);
    assert_eq!(entries[0].folder_name, "project");
}

#[tokio::test]
async fn test_second_run_is_skipped_by_ledger() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_tree(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    let ledger = memory_ledger().await;

    let first = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();
    assert!(first.is_complete());
    let creates = drive.calls.get(Op::CreateFolder);
    let sessions = drive.calls.get(Op::BeginUpload);

    // Fresh planner, so nothing is served from the folder cache
    let second = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert_eq!(second.skipped, 1);
    assert_eq!(second.uploaded_files, 0);
    assert!(matches!(
        second.subtrees[0].status,
        SubtreeStatus::AlreadyUploaded { .. }
    ));
    assert_eq!(drive.calls.get(Op::CreateFolder), creates);
    assert_eq!(drive.calls.get(Op::BeginUpload), sessions);
}

#[tokio::test]
async fn test_folder_changed_mid_upload_is_left_partial() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_tree(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    let ledger = memory_ledger().await;

    let touched = root.clone();
    drive.on_first_upload(move || {
        write_file(&touched, "late.txt", b"added while uploading");
        std::fs::File::open(&touched)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
    });

    let report = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.uploaded_files, 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, root);
    assert!(report.failed[0].retriable);
    assert!(matches!(
        report.subtrees[0].status,
        SubtreeStatus::Partial { failed: 1 }
    ));
    assert!(ledger.list_all().await.unwrap().is_empty());

    // The next run picks up the new file and records the folder
    let rerun = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert!(rerun.is_complete(), "failures: {:?}", rerun.failed);
    assert_eq!(rerun.uploaded_files, 1);
    let project = drive.folder_id(&root_id(), "project").unwrap();
    assert!(drive.file_content(&project, "late.txt").is_some());
    assert_eq!(ledger.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_force_reuses_remote_folders_and_files() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_tree(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    let ledger = memory_ledger().await;

    planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();
    let first_recorded = ledger.list_all().await.unwrap()[0].uploaded_at;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let forced = UploadOptions {
        force: true,
        ..UploadOptions::default()
    };
    let report = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &forced)
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.uploaded_files, 0);
    assert_eq!(report.skipped, 4);
    assert_eq!(drive.calls.get(Op::CreateFolder), 4);
    assert_eq!(drive.calls.get(Op::BeginUpload), 4);
    assert_eq!(drive.folder_count(), 4);
    assert!(matches!(
        report.subtrees[0].status,
        SubtreeStatus::Completed { .. }
    ));
    let entries = ledger.list_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].uploaded_at > first_recorded);
}

#[tokio::test]
async fn test_one_failing_file_does_not_affect_siblings() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("batch");
    for i in 0..10 {
        write_file(&root, &format!("f{i}.txt"), format!("file {i}").as_bytes());
    }

    let drive = Arc::new(FakeDrive::new());
    drive.fail(Failure::new(
        Op::BeginUpload,
        "f5.txt",
        1,
        RemoteError::NotFound("parent vanished".into()),
    ));
    let ledger = memory_ledger().await;

    let report = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert_eq!(report.uploaded_files, 9);
    assert_eq!(report.failed.len(), 1);
    let failed = &report.failed[0];
    assert!(failed.path.ends_with("f5.txt"));
    assert_eq!(failed.kind, ErrorKind::NotFound);
    assert!(!failed.retriable);
    assert_eq!(
        report.subtrees[0].status,
        SubtreeStatus::Partial { failed: 1 }
    );
    assert!(ledger.list_all().await.unwrap().is_empty());

    // The rerun only sends the file that failed
    let rerun = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();
    assert!(rerun.is_complete());
    assert_eq!(rerun.uploaded_files, 1);
    assert_eq!(rerun.skipped, 9);
    assert_eq!(drive.file_count(), 10);
    assert_eq!(ledger.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_files_under_unresolved_folder_are_not_dispatched() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_tree(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    drive.fail(Failure::new(
        Op::CreateFolder,
        "src",
        1,
        RemoteError::Other("name rejected".into()),
    ));
    let ledger = memory_ledger().await;

    let report = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    // src, src/util, src/main.rs and src/util/mod.rs
    assert_eq!(report.failed.len(), 4);
    assert!(report.failed.iter().all(|f| f.kind == ErrorKind::Other));
    assert_eq!(report.uploaded_files, 2);
    assert_eq!(drive.calls.get(Op::BeginUpload), 2);
    assert_eq!(
        report.subtrees[0].status,
        SubtreeStatus::Partial { failed: 4 }
    );
    assert!(ledger.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_tree(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    drive.fail(Failure::new(
        Op::FindFile,
        "readme.txt",
        2,
        RemoteError::ServerTransient("HTTP 503".into()),
    ));
    drive.fail(Failure::new(
        Op::FindFolder,
        "docs",
        1,
        RemoteError::RateLimited {
            message: "HTTP 429".into(),
            retry_after: None,
        },
    ));
    let ledger = memory_ledger().await;

    let report = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert!(report.is_complete(), "failures: {:?}", report.failed);
    assert_eq!(report.uploaded_files, 4);
    assert_eq!(ledger.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_lost_create_response_does_not_duplicate_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_tree(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    drive.fail(
        Failure::new(
            Op::CreateFolder,
            "docs",
            1,
            RemoteError::ServerTransient("connection reset".into()),
        )
        .after_applying(),
    );
    let ledger = memory_ledger().await;

    let report = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(drive.folder_count(), 4);
    assert_eq!(drive.calls.get(Op::CreateFolder), 4);
}

#[tokio::test]
async fn test_auth_error_stops_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_tree(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    drive.fail(Failure::any(
        Op::FindFolder,
        1,
        RemoteError::AuthInvalid("token expired".into()),
    ));
    let ledger = memory_ledger().await;

    let err = planner(drive.clone(), ledger.clone())
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthInvalid);
    assert_eq!(drive.calls.get(Op::FindFolder), 1);
    assert_eq!(drive.calls.get(Op::CreateFolder), 0);
    assert!(ledger.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_existing_remote_file_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("photos");
    write_file(&root, "a.jpg", b"aaaa");
    write_file(&root, "b.jpg", b"bbbb");

    let drive = Arc::new(FakeDrive::new());
    let ledger = memory_ledger().await;
    let planner = planner(drive.clone(), ledger.clone());

    // Resolve the remote folder up front and drop a file into it
    let folder = planner
        .cache()
        .get_or_create(&root_id(), "photos", || async {
            Ok::<_, ()>(folderlift_core::domain::RemoteId::new("pre_made".to_string()).unwrap())
        })
        .await
        .unwrap();
    let seeded = drive.seed_file(&folder, "a.jpg", b"aaaa");

    let report = planner
        .upload_tree(&root, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.skipped, 1);
    assert_eq!(report.uploaded_files, 1);
    assert_eq!(drive.calls.get(Op::BeginUpload), 1);
    assert_eq!(drive.calls.get(Op::FindFolder), 0);
    assert!(seeded.as_str().starts_with("file"));
}

#[tokio::test]
async fn test_invalid_options_rejected_before_any_remote_call() {
    let tmp = tempfile::tempdir().unwrap();
    let root = sample_tree(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    let ledger = memory_ledger().await;

    let options = UploadOptions {
        workers: 0,
        ..UploadOptions::default()
    };
    let err = planner(drive.clone(), ledger)
        .upload_tree(&root, &root_id(), &options)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Domain(_)));
    assert_eq!(drive.calls.get(Op::FindFolder), 0);
}

#[tokio::test]
async fn test_missing_root_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let drive = Arc::new(FakeDrive::new());
    let ledger = memory_ledger().await;

    let result = planner(drive.clone(), ledger)
        .upload_tree(&tmp.path().join("absent"), &root_id(), &UploadOptions::default())
        .await;

    assert!(result.is_err());
    assert_eq!(drive.calls.get(Op::FindFolder), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_trees_share_folder_creation() {
    let tmp = tempfile::tempdir().unwrap();
    let one = tmp.path().join("one/project");
    let two = tmp.path().join("two/project");
    write_file(&one, "shared/x.txt", b"x");
    write_file(&two, "shared/y.txt", b"y");

    let drive = Arc::new(FakeDrive::with_create_delay(Duration::from_millis(50)));
    let ledger = memory_ledger().await;
    let cache = Arc::new(FolderCache::new());

    let make = || {
        SyncPlanner::with_cache(
            drive.clone(),
            ledger.clone(),
            Arc::new(FsWalker::new()),
            fast_retry(),
            cache.clone(),
        )
    };
    let (p1, p2) = (make(), make());

    let rid = root_id();
    let opts = UploadOptions::default();
    let (a, b) = tokio::join!(
        p1.upload_tree(&one, &rid, &opts),
        p2.upload_tree(&two, &rid, &opts),
    );

    assert!(a.unwrap().is_complete());
    assert!(b.unwrap().is_complete());
    assert_eq!(drive.calls.get(Op::CreateFolder), 2);
    assert_eq!(drive.folder_count(), 2);
    assert_eq!(drive.file_count(), 2);
    assert_eq!(ledger.list_all().await.unwrap().len(), 2);
}
