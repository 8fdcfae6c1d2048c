//! Retry/backoff controller
//!
//! Every remote call made by the engine goes through a [`RetryController`].
//! It classifies each failure, backs off exponentially on `RateLimited` and
//! `ServerTransient`, and gives up immediately on everything else.
//!
//! Each call is tracked by an explicit [`RetryState`] machine:
//!
//! ```text
//! Pending ──dispatch──→ InFlight(n) ──success──→ Succeeded
//!                          │    ▲
//!                   retry  │    │ dispatch
//!                          ▼    │
//!                       Backoff(n, until)
//!
//! InFlight(n) ──give up──→ Failed(kind)
//! ```
//!
//! For create-type operations [`RetryController::execute_reconciled`] runs
//! a reconciliation check after each failed attempt: if the object the
//! operation was meant to create now exists, that object is returned
//! instead of retrying or failing.

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use folderlift_core::config::RetryConfig;
use folderlift_core::domain::{DomainError, ErrorKind, RemoteError};

use crate::UploadError;

// ============================================================================
// RetryPolicy
// ============================================================================

/// Backoff parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_secs(cfg.base_delay_secs),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

// ============================================================================
// RetryState - per-operation state machine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Pending,
    InFlight { attempt: u32 },
    Backoff { attempt: u32, until: Instant },
    Succeeded,
    Failed(ErrorKind),
}

/// Inputs that move a [`RetryState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryEvent {
    Dispatch,
    Success,
    Retry { until: Instant },
    GiveUp(ErrorKind),
}

impl RetryState {
    fn name(&self) -> String {
        match self {
            RetryState::Pending => "Pending".to_string(),
            RetryState::InFlight { attempt } => format!("InFlight({attempt})"),
            RetryState::Backoff { attempt, .. } => format!("Backoff({attempt})"),
            RetryState::Succeeded => "Succeeded".to_string(),
            RetryState::Failed(kind) => format!("Failed({kind})"),
        }
    }

    /// Applies `event`, rejecting transitions the machine does not allow
    pub fn transition(&mut self, event: RetryEvent) -> Result<(), DomainError> {
        let next = match (*self, event) {
            (RetryState::Pending, RetryEvent::Dispatch) => RetryState::InFlight { attempt: 0 },
            (RetryState::Backoff { attempt, .. }, RetryEvent::Dispatch) => RetryState::InFlight {
                attempt: attempt + 1,
            },
            (RetryState::InFlight { .. }, RetryEvent::Success) => RetryState::Succeeded,
            (RetryState::InFlight { attempt }, RetryEvent::Retry { until }) => {
                RetryState::Backoff { attempt, until }
            }
            (RetryState::InFlight { .. }, RetryEvent::GiveUp(kind)) => RetryState::Failed(kind),
            (from, event) => {
                return Err(DomainError::InvalidState {
                    from: from.name(),
                    to: format!("{event:?}"),
                })
            }
        };
        *self = next;
        Ok(())
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::Failed(_))
    }
}

// ============================================================================
// RetryController
// ============================================================================

/// Result of a reconciled operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled<T, E> {
    /// The operation itself succeeded
    Completed(T),
    /// The operation failed but its target turned out to exist remotely
    Existing(E),
}

#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds, fails permanently, or exhausts
    /// the retry budget
    ///
    /// `operation` receives the 0-based attempt number.
    pub async fn execute<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T, UploadError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let never = || std::future::ready(Ok::<Option<Infallible>, anyhow::Error>(None));
        match self.run(operation_name, operation, never, false).await? {
            Reconciled::Completed(value) => Ok(value),
            Reconciled::Existing(never) => match never {},
        }
    }

    /// Like [`execute`](Self::execute), but after every failure other than
    /// `AuthInvalid` asks `reconcile` whether the target already exists
    pub async fn execute_reconciled<T, E, F, Fut, R, RFut>(
        &self,
        operation_name: &str,
        operation: F,
        reconcile: R,
    ) -> Result<Reconciled<T, E>, UploadError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        R: FnMut() -> RFut,
        RFut: Future<Output = anyhow::Result<Option<E>>>,
    {
        self.run(operation_name, operation, reconcile, true).await
    }

    async fn run<T, E, F, Fut, R, RFut>(
        &self,
        operation_name: &str,
        mut operation: F,
        mut reconcile: R,
        reconcile_enabled: bool,
    ) -> Result<Reconciled<T, E>, UploadError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        R: FnMut() -> RFut,
        RFut: Future<Output = anyhow::Result<Option<E>>>,
    {
        let mut state = RetryState::Pending;
        let mut attempt: u32 = 0;

        loop {
            state.transition(RetryEvent::Dispatch)?;

            let err = match operation(attempt).await {
                Ok(value) => {
                    state.transition(RetryEvent::Success)?;
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempt, "Operation succeeded after retry"
                        );
                    }
                    return Ok(Reconciled::Completed(value));
                }
                Err(err) => err,
            };

            let kind = ErrorKind::classify(&err);

            if reconcile_enabled && kind != ErrorKind::AuthInvalid {
                match reconcile().await {
                    Ok(Some(existing)) => {
                        info!(
                            operation = operation_name,
                            attempt,
                            error = %err,
                            "Target exists remotely despite error, treating as done"
                        );
                        state.transition(RetryEvent::Success)?;
                        return Ok(Reconciled::Existing(existing));
                    }
                    Ok(None) => {}
                    Err(check_err) => {
                        debug!(
                            operation = operation_name,
                            error = %check_err,
                            "Reconciliation check failed"
                        );
                    }
                }
            }

            if kind.is_backoff_eligible() && attempt < self.policy.max_retries {
                let mut delay = self.policy.delay_for(attempt);
                if let Some(hint) = RemoteError::retry_after_hint(&err) {
                    delay = delay.max(hint).min(self.policy.max_delay);
                }
                let until = Instant::now() + delay;
                state.transition(RetryEvent::Retry { until })?;

                warn!(
                    operation = operation_name,
                    attempt,
                    %kind,
                    delay_secs = delay.as_secs_f64(),
                    error = %err,
                    "Transient error, retrying"
                );

                tokio::time::sleep_until(until).await;
                attempt += 1;
                continue;
            }

            state.transition(RetryEvent::GiveUp(kind))?;
            warn!(
                operation = operation_name,
                attempts = attempt + 1,
                %kind,
                error = %err,
                "Operation failed"
            );
            return Err(UploadError::Remote {
                operation: operation_name.to_string(),
                kind,
                message: format!("{err:#}"),
            });
        }
    }
}
