//! upload_all: independent subtrees, size ordering, shared deadline

use std::sync::Arc;
use std::time::Duration;

use folderlift_core::config::UploadOptions;
use folderlift_core::domain::{ErrorKind, SubtreeStatus};
use folderlift_core::ports::ILedger;
use folderlift_engine::{FsWalker, SyncPlanner};

use crate::common::{
    fast_retry, memory_ledger, planner, root_id, write_file, FakeDrive, MemoryLedger, Op,
};

fn pending_dir(base: &std::path::Path) -> std::path::PathBuf {
    let pending = base.join("pending");
    write_file(&pending, "big/data.bin", &[7u8; 3000]);
    write_file(&pending, "small/data.bin", &[1u8; 10]);
    write_file(&pending, "mid/data.bin", &[3u8; 100]);
    write_file(&pending, "mid/extra/more.bin", &[3u8; 50]);
    pending
}

fn subtree_names(report: &folderlift_core::domain::UploadReport) -> Vec<String> {
    report
        .subtrees
        .iter()
        .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_upload_all_smallest_first() {
    let tmp = tempfile::tempdir().unwrap();
    let pending = pending_dir(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    let ledger = memory_ledger().await;

    let report = planner(drive.clone(), ledger.clone())
        .upload_all(&pending, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert!(report.is_complete(), "failures: {:?}", report.failed);
    assert_eq!(subtree_names(&report), vec!["small", "mid", "big"]);
    assert_eq!(report.subtree_counts(), (3, 0, 0));
    assert_eq!(report.uploaded_files, 4);
    // small, mid, mid/extra, big
    assert_eq!(report.uploaded_folders, 4);
    assert_eq!(ledger.list_all().await.unwrap().len(), 3);

    let first_chunks: Vec<u64> = drive
        .chunk_offsets
        .lock()
        .unwrap()
        .iter()
        .map(|(_, o)| *o)
        .collect();
    assert_eq!(first_chunks, vec![0, 0, 0, 0]);
}

#[tokio::test]
async fn test_upload_all_skips_recorded_subtrees() {
    let tmp = tempfile::tempdir().unwrap();
    let pending = pending_dir(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    let ledger = memory_ledger().await;

    planner(drive.clone(), ledger.clone())
        .upload_all(&pending, &root_id(), &UploadOptions::default())
        .await
        .unwrap();
    let sessions = drive.calls.get(Op::BeginUpload);
    let lookups = drive.calls.get(Op::FindFolder);

    let report = planner(drive.clone(), ledger.clone())
        .upload_all(&pending, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert_eq!(report.skipped, 3);
    assert_eq!(report.subtree_counts(), (0, 3, 0));
    assert_eq!(drive.calls.get(Op::BeginUpload), sessions);
    assert_eq!(drive.calls.get(Op::FindFolder), lookups);
}

#[tokio::test]
async fn test_upload_all_partial_subtree_is_not_recorded() {
    let tmp = tempfile::tempdir().unwrap();
    let pending = pending_dir(tmp.path());
    let drive = Arc::new(FakeDrive::new());
    drive.fail(crate::common::Failure::new(
        Op::CreateFolder,
        "extra",
        1,
        folderlift_core::domain::RemoteError::Other("quota".into()),
    ));
    let ledger = memory_ledger().await;

    let report = planner(drive.clone(), ledger.clone())
        .upload_all(&pending, &root_id(), &UploadOptions::default())
        .await
        .unwrap();

    assert_eq!(report.subtree_counts(), (2, 0, 1));
    let recorded: Vec<String> = ledger
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.folder_name)
        .collect();
    assert_eq!(recorded, vec!["small", "big"]);
}

#[tokio::test(start_paused = true)]
async fn test_upload_all_deadline_leaves_later_subtrees_unstarted() {
    let tmp = tempfile::tempdir().unwrap();
    let pending = tmp.path().join("pending");
    write_file(&pending, "a/one.txt", b"1");
    write_file(&pending, "b/two.txt", b"22");

    // Creating a folder takes longer than the whole run is allowed
    let drive = Arc::new(FakeDrive::with_create_delay(Duration::from_secs(61)));
    let ledger = Arc::new(MemoryLedger::default());
    let planner = SyncPlanner::new(
        drive.clone(),
        ledger.clone(),
        Arc::new(FsWalker::new()),
        fast_retry(),
    );

    let options = UploadOptions {
        timeout_minutes: Some(1),
        ..UploadOptions::default()
    };
    let report = planner
        .upload_all(&pending, &root_id(), &options)
        .await
        .unwrap();

    assert_eq!(subtree_names(&report), vec!["a", "b"]);
    assert_eq!(report.subtree_counts(), (0, 0, 2));
    assert_eq!(report.subtrees[0].status, SubtreeStatus::Partial { failed: 1 });
    assert_eq!(report.subtrees[1].status, SubtreeStatus::Partial { failed: 0 });
    assert_eq!(report.failed.len(), 2);
    assert!(report
        .failed
        .iter()
        .all(|f| f.kind == ErrorKind::DeadlineExceeded && f.retriable));

    // "b" was never touched remotely
    assert_eq!(drive.calls.get(Op::CreateFolder), 1);
    assert_eq!(drive.calls.get(Op::BeginUpload), 0);
    assert!(ledger.list_all().await.unwrap().is_empty());
}
