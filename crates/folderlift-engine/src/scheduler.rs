//! Transfer unit scheduler
//!
//! Splits transfer units into batches of `batch_size`, processed in order.
//! Inside a batch at most `workers` units run at once, bounded by a
//! [`Semaphore`]; each unit runs in its own task so a panicking worker only
//! fails its own unit.
//!
//! An optional deadline is checked before every dispatch. Once it has
//! passed, units already running finish and every unit not yet dispatched
//! is reported as `DeadlineExceeded` (retriable).
//!
//! If the pool cannot be built (zero workers, or more than the semaphore
//! supports) the scheduler logs a warning and runs the same units one at a
//! time, flagging the result as degraded.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use folderlift_core::domain::{ErrorKind, TransferUnit, UploadOutcome};

/// Processes a single transfer unit to a final outcome
#[async_trait::async_trait]
pub trait UnitWorker: Send + Sync + 'static {
    async fn process(&self, unit: TransferUnit) -> UploadOutcome;
}

/// Outcomes of a scheduler run, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleResult {
    pub outcomes: Vec<UploadOutcome>,
    /// The worker pool could not be built and units ran sequentially
    pub degraded: bool,
    /// At least one unit was not dispatched because the deadline passed
    pub deadline_hit: bool,
}

#[derive(Debug, Clone)]
pub struct TransferScheduler {
    workers: usize,
    batch_size: usize,
}

impl TransferScheduler {
    pub fn new(workers: usize, batch_size: usize) -> Self {
        Self {
            workers,
            batch_size,
        }
    }

    fn build_pool(&self) -> Option<Arc<Semaphore>> {
        if self.workers == 0 || self.workers > Semaphore::MAX_PERMITS {
            return None;
        }
        Some(Arc::new(Semaphore::new(self.workers)))
    }

    /// Runs every unit through `worker` and returns one outcome per unit
    pub async fn run<W: UnitWorker>(
        &self,
        worker: Arc<W>,
        units: Vec<TransferUnit>,
        deadline: Option<Instant>,
    ) -> ScheduleResult {
        let total = units.len();
        let batch_size = self.batch_size.max(1);
        let mut outcomes: Vec<Option<UploadOutcome>> = vec![None; total];
        let mut deadline_hit = false;

        let pool = self.build_pool();
        let degraded = pool.is_none();
        if degraded {
            warn!(
                workers = self.workers,
                units = total,
                "Cannot build worker pool, falling back to sequential transfers"
            );
        }

        info!(
            units = total,
            batches = total.div_ceil(batch_size),
            workers = self.workers,
            "Scheduling transfer units"
        );

        let mut indexed = units.into_iter().enumerate().peekable();
        let mut batch_no = 0usize;

        while indexed.peek().is_some() {
            let batch: Vec<(usize, TransferUnit)> = indexed.by_ref().take(batch_size).collect();
            batch_no += 1;
            debug!(batch = batch_no, size = batch.len(), "Starting batch");

            let mut handles = Vec::with_capacity(batch.len());

            for (index, unit) in batch {
                if deadline_passed(deadline) {
                    deadline_hit = true;
                    outcomes[index] = Some(deadline_outcome());
                    continue;
                }

                let permit = match pool {
                    Some(ref semaphore) => match semaphore.clone().acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => None,
                    },
                    None => None,
                };

                // Waiting for a permit may have taken us past the deadline
                if deadline_passed(deadline) {
                    deadline_hit = true;
                    outcomes[index] = Some(deadline_outcome());
                    continue;
                }

                let worker = worker.clone();
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    worker.process(unit).await
                });

                if pool.is_some() {
                    handles.push((index, handle));
                } else {
                    outcomes[index] = Some(join_outcome(handle.await));
                }
            }

            for (index, handle) in handles {
                outcomes[index] = Some(join_outcome(handle.await));
            }
        }

        let outcomes: Vec<UploadOutcome> = outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| UploadOutcome::failed(ErrorKind::Other, "unit was never scheduled")))
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            units = total,
            failed,
            degraded,
            deadline_hit,
            "Transfer scheduling finished"
        );

        ScheduleResult {
            outcomes,
            degraded,
            deadline_hit,
        }
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn deadline_outcome() -> UploadOutcome {
    UploadOutcome::failed(
        ErrorKind::DeadlineExceeded,
        "deadline passed before the unit was dispatched",
    )
}

fn join_outcome(result: Result<UploadOutcome, tokio::task::JoinError>) -> UploadOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "Transfer worker task failed");
            UploadOutcome::failed(ErrorKind::Other, format!("worker task failed: {e}"))
        }
    }
}
