//! Chunked file transfer
//!
//! Moves one [`TransferUnit`] to the remote through a resumable upload
//! session:
//!
//! 1. If a file with the same name already sits in the target folder the
//!    unit is reported as `SkippedExisting` and nothing is sent.
//! 2. A session is opened for the full size. If opening fails but the file
//!    shows up remotely anyway, the unit counts as uploaded.
//! 3. Chunks of `unit.chunk_size` bytes are read from disk and sent in
//!    order. After a failed chunk the session is queried: if the remote
//!    finished the file the unit counts as uploaded, otherwise the next
//!    attempt starts at whatever offset the remote reports as committed.
//!
//! Every outcome is folded into an [`UploadOutcome`]; errors never escape
//! [`ChunkedUploader::upload`].

use std::io::SeekFrom;
use std::sync::{Arc, Mutex};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use folderlift_core::domain::{ErrorKind, TransferUnit, UploadOutcome};
use folderlift_core::ports::{IRemoteDrive, RemoteObject, UploadProgress, UploadSession};

use crate::retry::{Reconciled, RetryController};
use crate::scheduler::UnitWorker;
use crate::UploadError;

pub struct ChunkedUploader {
    remote: Arc<dyn IRemoteDrive>,
    retry: RetryController,
}

impl ChunkedUploader {
    pub fn new(remote: Arc<dyn IRemoteDrive>, retry: RetryController) -> Self {
        Self { remote, retry }
    }

    /// Uploads a single file and reports how it went
    #[tracing::instrument(
        level = "debug",
        skip(self, unit),
        fields(file = %unit.relative_path.display(), size = unit.size)
    )]
    pub async fn upload(&self, unit: &TransferUnit) -> UploadOutcome {
        match self.try_upload(unit).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "File upload failed");
                UploadOutcome::failed(e.kind(), e.to_string())
            }
        }
    }

    async fn try_upload(&self, unit: &TransferUnit) -> Result<UploadOutcome, UploadError> {
        let remote = self.remote.as_ref();

        let existing = self
            .retry
            .execute("find_file", |_| remote.find_file(&unit.parent_id, &unit.name))
            .await?;
        if let Some(object) = existing {
            debug!(id = %object.id, "File already exists remotely, skipping");
            return Ok(UploadOutcome::SkippedExisting {
                remote_id: object.id,
            });
        }

        let mut file = File::open(&unit.local_path)
            .await
            .map_err(|e| UploadError::local_io(&unit.local_path, e))?;

        let opened = self
            .retry
            .execute_reconciled(
                "begin_upload",
                |_| remote.begin_upload(&unit.parent_id, &unit.name, unit.size),
                || remote.find_file(&unit.parent_id, &unit.name),
            )
            .await?;
        let session = match opened {
            Reconciled::Completed(session) => session,
            Reconciled::Existing(object) => return Ok(finished(unit, object)),
        };

        debug!(chunks = unit.chunk_count(), chunk_size = unit.chunk_size, "Upload session opened");
        self.send_chunks(unit, &mut file, &session).await
    }

    async fn send_chunks(
        &self,
        unit: &TransferUnit,
        file: &mut File,
        session: &UploadSession,
    ) -> Result<UploadOutcome, UploadError> {
        let remote = self.remote.as_ref();
        let mut offset: u64 = 0;
        let mut stalls: u32 = 0;

        loop {
            let len = unit.chunk_size.min(unit.size - offset);
            let data = read_chunk(file, offset, len)
                .await
                .map_err(|e| UploadError::local_io(&unit.local_path, e))?;

            // Committed offset seen by the last reconciliation, if it got one
            let observed: Mutex<Option<u64>> = Mutex::new(None);

            let sent = self
                .retry
                .execute_reconciled(
                    "upload_chunk",
                    |attempt| {
                        let data = data.clone();
                        let observed = &observed;
                        async move {
                            if attempt > 0 {
                                let seen = observed.lock().ok().and_then(|mut o| o.take());
                                let committed = match seen {
                                    Some(committed) => committed,
                                    None => match remote.query_upload(session).await? {
                                        UploadProgress::InProgress { committed } => committed,
                                        complete => return Ok(complete),
                                    },
                                };
                                if committed != offset {
                                    return Ok(UploadProgress::InProgress { committed });
                                }
                            }
                            remote.upload_chunk(session, offset, data).await
                        }
                    },
                    || {
                        let observed = &observed;
                        async move {
                            remote.query_upload(session).await.map(|progress| match progress {
                                UploadProgress::Complete(object) => Some(object),
                                UploadProgress::InProgress { committed } => {
                                    if let Ok(mut o) = observed.lock() {
                                        *o = Some(committed);
                                    }
                                    None
                                }
                            })
                        }
                    },
                )
                .await?;

            let committed = match sent {
                Reconciled::Completed(UploadProgress::Complete(object))
                | Reconciled::Existing(object) => return Ok(finished(unit, object)),
                Reconciled::Completed(UploadProgress::InProgress { committed }) => committed,
            };

            if committed > unit.size {
                return Ok(UploadOutcome::failed(
                    ErrorKind::Other,
                    format!("remote committed {committed} bytes of a {} byte file", unit.size),
                ));
            }

            if committed == unit.size {
                // Every byte is there but the remote has not finalized yet
                return match remote.query_upload(session).await {
                    Ok(UploadProgress::Complete(object)) => Ok(finished(unit, object)),
                    Ok(UploadProgress::InProgress { .. }) => Ok(UploadOutcome::failed(
                        ErrorKind::Other,
                        "remote holds all bytes but did not finalize the upload",
                    )),
                    Err(e) => Ok(UploadOutcome::failed(ErrorKind::classify(&e), format!("{e:#}"))),
                };
            }

            if committed <= offset {
                stalls += 1;
                if stalls > self.retry.policy().max_retries {
                    return Ok(UploadOutcome::failed(
                        ErrorKind::ServerTransient,
                        format!("upload stalled at offset {offset}"),
                    ));
                }
                debug!(offset, committed, stalls, "Chunk made no progress");
            } else {
                stalls = 0;
            }

            offset = committed;
        }
    }
}

#[async_trait::async_trait]
impl UnitWorker for ChunkedUploader {
    async fn process(&self, unit: TransferUnit) -> UploadOutcome {
        self.upload(&unit).await
    }
}

fn finished(unit: &TransferUnit, object: RemoteObject) -> UploadOutcome {
    if let Some(size) = object.size {
        if size != unit.size {
            return UploadOutcome::failed(
                ErrorKind::Other,
                format!("remote size {size} does not match local size {}", unit.size),
            );
        }
    }
    info!(id = %object.id, name = %unit.name, "File uploaded");
    UploadOutcome::Succeeded {
        remote_id: object.id,
    }
}

async fn read_chunk(file: &mut File, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
    let len = usize::try_from(len)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "chunk too large"))?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}
