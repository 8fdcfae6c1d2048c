//! Remote sync planner
//!
//! Turns a local folder into remote work and keeps the ledger honest:
//!
//! - [`SyncPlanner::sync_folder`] mirrors one subtree. The subtree root is
//!   resolved under the given remote parent, then every subfolder level by
//!   level (parents always before children) through the shared
//!   [`FolderCache`]. All files of the subtree then go through a single
//!   scheduler run.
//! - [`SyncPlanner::upload_tree`] wraps that with the ledger: a subtree whose
//!   fingerprint is already recorded is skipped unless `force` is set, and a
//!   subtree is recorded only after every unit in it succeeded.
//! - [`SyncPlanner::upload_all`] treats each immediate subdirectory of a
//!   pending directory as its own ledger unit, smallest first, under one
//!   shared deadline.
//!
//! Files whose folder could not be resolved are reported with that folder's
//! error kind and never reach the scheduler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use folderlift_core::config::UploadOptions;
use folderlift_core::domain::{
    DomainError, ErrorKind, FailedUnit, FolderFingerprint, LedgerEntry, RemoteId, SubtreeReport,
    SubtreeStatus, TransferUnit, UploadOutcome, UploadReport,
};
use folderlift_core::ports::{ILedger, ILocalWalker, IRemoteDrive};

use crate::chunked::ChunkedUploader;
use crate::folder_cache::FolderCache;
use crate::retry::{Reconciled, RetryController};
use crate::scheduler::TransferScheduler;
use crate::UploadError;

/// Result of mirroring one local subtree
#[derive(Debug, Clone)]
pub struct SubtreeSync {
    /// Remote id of the subtree root
    pub root_remote_id: RemoteId,
    /// Remote folders found or created, the root included
    pub folders_resolved: usize,
    /// One entry per file, plus one per folder that failed to resolve,
    /// keyed by absolute local path
    pub outcomes: Vec<(PathBuf, UploadOutcome)>,
    /// Present only when every unit succeeded
    pub ledger_candidate: Option<LedgerEntry>,
    pub degraded: bool,
}

impl SubtreeSync {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.is_success()).count()
    }
}

type FolderResolution = Result<RemoteId, (ErrorKind, String)>;

pub struct SyncPlanner {
    remote: Arc<dyn IRemoteDrive>,
    ledger: Arc<dyn ILedger>,
    walker: Arc<dyn ILocalWalker>,
    cache: Arc<FolderCache>,
    retry: RetryController,
    uploader: Arc<ChunkedUploader>,
}

impl SyncPlanner {
    pub fn new(
        remote: Arc<dyn IRemoteDrive>,
        ledger: Arc<dyn ILedger>,
        walker: Arc<dyn ILocalWalker>,
        retry: RetryController,
    ) -> Self {
        Self::with_cache(remote, ledger, walker, retry, Arc::new(FolderCache::new()))
    }

    /// Builds a planner that shares an existing folder cache
    pub fn with_cache(
        remote: Arc<dyn IRemoteDrive>,
        ledger: Arc<dyn ILedger>,
        walker: Arc<dyn ILocalWalker>,
        retry: RetryController,
        cache: Arc<FolderCache>,
    ) -> Self {
        let uploader = Arc::new(ChunkedUploader::new(remote.clone(), retry.clone()));
        Self {
            remote,
            ledger,
            walker,
            cache,
            retry,
            uploader,
        }
    }

    pub fn cache(&self) -> &Arc<FolderCache> {
        &self.cache
    }

    // ========================================================================
    // upload_tree / upload_all
    // ========================================================================

    /// Uploads one local folder tree under `parent`
    ///
    /// Returns `Err` only when the run cannot start (invalid options or
    /// path, ledger unreadable) or the subtree root cannot be resolved.
    /// Per-file failures are reported in the returned [`UploadReport`].
    #[tracing::instrument(level = "info", skip_all, fields(root = %local_root.display()))]
    pub async fn upload_tree(
        &self,
        local_root: &Path,
        parent: &RemoteId,
        options: &UploadOptions,
    ) -> Result<UploadReport, UploadError> {
        let options = options.clone().validated()?;
        let started = std::time::Instant::now();
        let deadline = options.timeout().map(|t| Instant::now() + t);

        let fingerprint = FolderFingerprint::compute(local_root)?;
        info!(
            path = %fingerprint.path().display(),
            parent = %parent,
            fingerprint = %fingerprint.hash(),
            "Starting tree upload"
        );

        let mut report = UploadReport::default();
        match self.already_uploaded(&fingerprint, &options).await? {
            Some(entry) => skip_recorded(&mut report, &fingerprint, entry),
            None => {
                let subtree = self
                    .sync_and_record(&fingerprint, parent, &options, deadline)
                    .await?;
                report.merge(subtree);
            }
        }

        report.duration_ms = elapsed_ms(started);
        log_report(&report);
        Ok(report)
    }

    /// Uploads every immediate subdirectory of `pending_dir` as an
    /// independent subtree, smallest first
    ///
    /// An `AuthInvalid` failure aborts the whole run; any other per-subtree
    /// error is recorded and the next subtree is attempted.
    #[tracing::instrument(level = "info", skip_all, fields(pending_dir = %pending_dir.display()))]
    pub async fn upload_all(
        &self,
        pending_dir: &Path,
        parent: &RemoteId,
        options: &UploadOptions,
    ) -> Result<UploadReport, UploadError> {
        let options = options.clone().validated()?;
        let started = std::time::Instant::now();
        let deadline = options.timeout().map(|t| Instant::now() + t);

        let subdirs = self
            .walker
            .subdirectories(pending_dir)
            .await
            .map_err(|e| UploadError::local_io(pending_dir, format!("{e:#}")))?;
        info!(
            pending_dir = %pending_dir.display(),
            subtrees = subdirs.len(),
            "Starting bulk upload"
        );

        let mut report = UploadReport::default();
        let mut queue: Vec<(u64, FolderFingerprint)> = Vec::new();

        for dir in subdirs {
            let fingerprint = match FolderFingerprint::compute(&dir) {
                Ok(fp) => fp,
                Err(e) => {
                    push_failed_subtree(&mut report, dir, ErrorKind::LocalIo, e.to_string());
                    continue;
                }
            };

            if let Some(entry) = self.already_uploaded(&fingerprint, &options).await? {
                skip_recorded(&mut report, &fingerprint, entry);
                continue;
            }

            match self.walker.walk(fingerprint.path()).await {
                Ok(tree) => queue.push((tree.total_size(), fingerprint)),
                Err(e) => {
                    push_failed_subtree(&mut report, dir, ErrorKind::LocalIo, format!("{e:#}"));
                }
            }
        }

        queue.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.path().cmp(b.1.path())));

        for (size, fingerprint) in queue {
            let path = fingerprint.path().to_path_buf();

            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(path = %path.display(), "Deadline passed, subtree not started");
                report.failed.push(FailedUnit {
                    path: path.clone(),
                    kind: ErrorKind::DeadlineExceeded,
                    retriable: true,
                    message: "deadline passed before the subtree was started".to_string(),
                });
                report.subtrees.push(SubtreeReport {
                    path,
                    status: SubtreeStatus::Partial { failed: 0 },
                });
                continue;
            }

            debug!(path = %path.display(), bytes = size, "Uploading subtree");
            match self
                .sync_and_record(&fingerprint, parent, &options, deadline)
                .await
            {
                Ok(subtree) => report.merge(subtree),
                Err(e) if e.kind() == ErrorKind::AuthInvalid => return Err(e),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Subtree upload failed");
                    push_failed_subtree(&mut report, path, e.kind(), e.to_string());
                }
            }
        }

        report.duration_ms = elapsed_ms(started);
        log_report(&report);
        Ok(report)
    }

    async fn already_uploaded(
        &self,
        fingerprint: &FolderFingerprint,
        options: &UploadOptions,
    ) -> Result<Option<LedgerEntry>, UploadError> {
        if options.force {
            return Ok(None);
        }
        self.ledger
            .lookup(fingerprint.hash())
            .await
            .map_err(|e| UploadError::Ledger(format!("{e:#}")))
    }

    /// Mirrors a subtree and records it when it completed
    ///
    /// The entry is only written if the folder fingerprint at the end of the
    /// run equals the one taken before it started. A folder that changed
    /// mid-upload is reported partial with a retriable failure and is
    /// uploaded again next time.
    async fn sync_and_record(
        &self,
        fingerprint: &FolderFingerprint,
        parent: &RemoteId,
        options: &UploadOptions,
        deadline: Option<Instant>,
    ) -> Result<UploadReport, UploadError> {
        let sync = self
            .sync_folder(fingerprint.path(), parent, options, deadline)
            .await?;

        let mut report = UploadReport {
            uploaded_folders: sync.folders_resolved,
            degraded: sync.degraded,
            ..UploadReport::default()
        };
        for (path, outcome) in &sync.outcomes {
            report.record_outcome(path.clone(), outcome);
        }

        let path = fingerprint.path().to_path_buf();
        let failed = sync.failed_count();
        let status = match sync.ledger_candidate {
            Some(entry) if entry.fingerprint == *fingerprint.hash() => {
                match self.ledger.record(&entry).await {
                    Ok(()) => {
                        info!(
                            path = %path.display(),
                            remote_id = %entry.remote_id,
                            "Subtree recorded in ledger"
                        );
                        SubtreeStatus::Completed {
                            remote_id: sync.root_remote_id,
                        }
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to record subtree");
                        report.failed.push(FailedUnit {
                            path: path.clone(),
                            kind: ErrorKind::Other,
                            retriable: true,
                            message: format!("ledger write failed: {e:#}"),
                        });
                        SubtreeStatus::Partial { failed: 1 }
                    }
                }
            }
            Some(_) => {
                warn!(
                    path = %path.display(),
                    "Folder changed during upload, not recording it in the ledger"
                );
                report.failed.push(FailedUnit {
                    path: path.clone(),
                    kind: ErrorKind::Other,
                    retriable: true,
                    message: "folder changed during upload".to_string(),
                });
                SubtreeStatus::Partial { failed: 1 }
            }
            None => SubtreeStatus::Partial { failed },
        };

        report.subtrees.push(SubtreeReport { path, status });
        Ok(report)
    }

    // ========================================================================
    // sync_folder
    // ========================================================================

    /// Mirrors `local_path` as a folder of the same name under `parent`
    pub async fn sync_folder(
        &self,
        local_path: &Path,
        parent: &RemoteId,
        options: &UploadOptions,
        deadline: Option<Instant>,
    ) -> Result<SubtreeSync, UploadError> {
        let root_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                DomainError::InvalidPath(format!(
                    "{} has no folder name",
                    local_path.display()
                ))
            })?;

        let tree = self
            .walker
            .walk(local_path)
            .await
            .map_err(|e| UploadError::local_io(local_path, format!("{e:#}")))?;

        let root_id = resolve_folder(
            self.remote.clone(),
            self.cache.clone(),
            self.retry.clone(),
            parent.clone(),
            root_name,
        )
        .await?;
        debug!(path = %local_path.display(), id = %root_id, "Subtree root resolved");

        let mut outcomes = Vec::new();
        let folders = self
            .resolve_subfolders(&tree.folders, &root_id, options.workers, deadline)
            .await;

        let mut folders_resolved = 1;
        for folder in &tree.folders {
            match folders.get(&folder.relative_path) {
                Some(Ok(_)) => folders_resolved += 1,
                Some(Err((kind, message))) => outcomes.push((
                    local_path.join(&folder.relative_path),
                    UploadOutcome::failed(*kind, message.clone()),
                )),
                None => outcomes.push((
                    local_path.join(&folder.relative_path),
                    UploadOutcome::failed(ErrorKind::Other, "folder resolution did not finish"),
                )),
            }
        }

        let mut units = Vec::new();
        for file in &tree.files {
            let rel_parent = file.parent();
            let local_file = local_path.join(&file.relative_path);
            let parent_id = if rel_parent.as_os_str().is_empty() {
                Ok(root_id.clone())
            } else {
                folders.get(&rel_parent).cloned().unwrap_or_else(|| {
                    Err((ErrorKind::Other, "folder resolution did not finish".to_string()))
                })
            };

            match parent_id {
                Ok(id) => units.push(TransferUnit::new(
                    local_file,
                    file.relative_path.clone(),
                    file.size,
                    id,
                )),
                Err((kind, message)) => outcomes.push((
                    local_file,
                    UploadOutcome::failed(kind, format!("parent folder unresolved: {message}")),
                )),
            }
        }

        let unit_paths: Vec<PathBuf> = units.iter().map(|u| u.local_path.clone()).collect();
        let scheduler = TransferScheduler::new(options.workers, options.batch_size);
        let result = scheduler
            .run(self.uploader.clone(), units, deadline)
            .await;
        outcomes.extend(unit_paths.into_iter().zip(result.outcomes));

        let ledger_candidate = if outcomes.iter().all(|(_, o)| o.is_success()) {
            let fingerprint = FolderFingerprint::compute(local_path)?;
            Some(LedgerEntry::completed(&fingerprint, root_id.clone()))
        } else {
            None
        };

        Ok(SubtreeSync {
            root_remote_id: root_id,
            folders_resolved,
            outcomes,
            ledger_candidate,
            degraded: result.degraded,
        })
    }

    /// Resolves subfolders level by level, concurrently within a level
    async fn resolve_subfolders(
        &self,
        folders: &[folderlift_core::ports::LocalFolder],
        root_id: &RemoteId,
        workers: usize,
        deadline: Option<Instant>,
    ) -> HashMap<PathBuf, FolderResolution> {
        let mut resolved: HashMap<PathBuf, FolderResolution> = HashMap::new();
        let permits = Arc::new(Semaphore::new(workers.clamp(1, Semaphore::MAX_PERMITS)));

        let mut start = 0;
        while start < folders.len() {
            let depth = folders[start].depth;
            let end = folders[start..]
                .iter()
                .position(|f| f.depth != depth)
                .map_or(folders.len(), |n| start + n);
            let level = &folders[start..end];
            start = end;

            if deadline.is_some_and(|d| Instant::now() >= d) {
                for folder in level {
                    resolved.insert(
                        folder.relative_path.clone(),
                        Err((
                            ErrorKind::DeadlineExceeded,
                            "deadline passed before the folder was resolved".to_string(),
                        )),
                    );
                }
                continue;
            }

            let mut tasks = JoinSet::new();
            for folder in level {
                let rel = folder.relative_path.clone();
                let parent_rel = rel.parent().map(Path::to_path_buf).unwrap_or_default();
                let parent_id = if parent_rel.as_os_str().is_empty() {
                    Ok(root_id.clone())
                } else {
                    resolved.get(&parent_rel).cloned().unwrap_or_else(|| {
                        Err((ErrorKind::Other, "folder resolution did not finish".to_string()))
                    })
                };

                let parent_id = match parent_id {
                    Ok(id) => id,
                    Err(e) => {
                        resolved.insert(rel, Err(e));
                        continue;
                    }
                };

                let name = rel
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let remote = self.remote.clone();
                let cache = self.cache.clone();
                let retry = self.retry.clone();
                let permits = permits.clone();

                tasks.spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    let result = resolve_folder(remote, cache, retry, parent_id, name)
                        .await
                        .map_err(|e| (e.kind(), e.to_string()));
                    (rel, result)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((rel, result)) => {
                        resolved.insert(rel, result);
                    }
                    Err(e) => warn!(error = %e, "Folder resolution task failed"),
                }
            }
        }

        resolved
    }
}

/// Find-or-create through the cache; one remote creation per (parent, name)
async fn resolve_folder(
    remote: Arc<dyn IRemoteDrive>,
    cache: Arc<FolderCache>,
    retry: RetryController,
    parent: RemoteId,
    name: String,
) -> Result<RemoteId, UploadError> {
    cache
        .get_or_create(&parent, &name, || {
            find_or_create_folder(remote.as_ref(), &retry, &parent, &name)
        })
        .await
}

async fn find_or_create_folder(
    remote: &dyn IRemoteDrive,
    retry: &RetryController,
    parent: &RemoteId,
    name: &str,
) -> Result<RemoteId, UploadError> {
    let found = retry
        .execute("find_folder", |_| remote.find_folder(parent, name))
        .await?;
    if let Some(id) = found {
        debug!(parent = %parent, name, id = %id, "Found existing remote folder");
        return Ok(id);
    }

    let created = retry
        .execute_reconciled(
            "create_folder",
            |_| remote.create_folder(parent, name),
            || remote.find_folder(parent, name),
        )
        .await?;
    let id = match created {
        Reconciled::Completed(id) | Reconciled::Existing(id) => id,
    };
    info!(parent = %parent, name, id = %id, "Remote folder ready");
    Ok(id)
}

fn skip_recorded(report: &mut UploadReport, fingerprint: &FolderFingerprint, entry: LedgerEntry) {
    info!(
        path = %fingerprint.path().display(),
        remote_id = %entry.remote_id,
        uploaded_at = %entry.uploaded_at,
        "Folder already uploaded, skipping"
    );
    report.skipped += 1;
    report.subtrees.push(SubtreeReport {
        path: fingerprint.path().to_path_buf(),
        status: SubtreeStatus::AlreadyUploaded {
            remote_id: entry.remote_id,
        },
    });
}

fn push_failed_subtree(report: &mut UploadReport, path: PathBuf, kind: ErrorKind, message: String) {
    report.failed.push(FailedUnit {
        path: path.clone(),
        kind,
        retriable: kind.is_retriable(),
        message,
    });
    report.subtrees.push(SubtreeReport {
        path,
        status: SubtreeStatus::Partial { failed: 1 },
    });
}

fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn log_report(report: &UploadReport) {
    let (completed, already, partial) = report.subtree_counts();
    info!(
        folders = report.uploaded_folders,
        files = report.uploaded_files,
        skipped = report.skipped,
        failed = report.failed.len(),
        completed,
        already_uploaded = already,
        partial,
        degraded = report.degraded,
        duration_ms = report.duration_ms,
        "Upload finished"
    );
}
