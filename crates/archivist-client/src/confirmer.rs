//! Waiting for ledger confirmation
//!
//! Records are accepted immediately and settle later. [`ConfirmationWaiter`]
//! polls through a [`ResourceReader`] with capped exponential backoff until the
//! record is CONFIRMED, FAILED, or the `max_time` budget runs out.
//!
//! Callers depend only on [`ResourceReader`] and the waiter's result, so a
//! push-based confirmation source can replace polling without changing them.

use crate::config::BackoffPolicy;
use crate::error::{ArchivistError, ArchivistResult};
use archivist_model::{Confirmable, ConfirmationStatus};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Deadline used when `max_time` overflows the clock, roughly thirty years
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Reads a record by identity
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Record type
    type Resource: Confirmable + Send;

    /// Fetch the current state of `identity`
    async fn read_resource(&self, identity: &str) -> ArchivistResult<Self::Resource>;
}

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    /// Settled successfully
    Settled(T),
    /// Not yet settled; carries the status observed
    Pending(Option<ConfirmationStatus>),
}

/// Polls records until they settle
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationWaiter {
    backoff: BackoffPolicy,
    max_time: Duration,
}

impl ConfirmationWaiter {
    /// Create waiter
    #[inline]
    #[must_use]
    pub fn new(backoff: BackoffPolicy, max_time: Duration) -> Self {
        Self { backoff, max_time }
    }

    /// Total wait budget
    #[inline]
    #[must_use]
    pub fn max_time(&self) -> Duration {
        self.max_time
    }

    /// Backoff between polls
    #[inline]
    #[must_use]
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// With a different budget
    #[inline]
    #[must_use]
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = max_time;
        self
    }

    /// Wait until `identity` is CONFIRMED
    ///
    /// # Errors
    /// - `ArchivistError::Confirmation` as soon as FAILED (or no status) is observed
    /// - `ArchivistError::Timeout` when `max_time` elapses first
    /// - read errors unchanged
    pub async fn wait<R>(&self, reader: &R, identity: &str) -> ArchivistResult<R::Resource>
    where
        R: ResourceReader + ?Sized,
    {
        self.poll(identity, move || async move {
            let resource = reader.read_resource(identity).await?;
            match resource.confirmation_status() {
                Some(ConfirmationStatus::Confirmed) => Ok(Probe::Settled(resource)),
                Some(ConfirmationStatus::Failed) => Err(ArchivistError::confirmation(
                    identity,
                    "status FAILED",
                )),
                None => Err(ArchivistError::confirmation(
                    identity,
                    "no confirmation status",
                )),
                status @ Some(ConfirmationStatus::Pending | ConfirmationStatus::Created) => {
                    Ok(Probe::Pending(status))
                }
            }
        })
        .await
    }

    /// Run `probe` with backoff until it settles, fails, or the budget runs out
    ///
    /// The last poll happens at the deadline; no sleep extends past it.
    pub async fn poll<T, F, Fut>(&self, identity: &str, mut probe: F) -> ArchivistResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ArchivistResult<Probe<T>>>,
    {
        let start = Instant::now();
        let deadline = start
            .checked_add(self.max_time)
            .unwrap_or_else(|| start + FAR_FUTURE);
        let mut attempt: u32 = 0;

        loop {
            let last_status = match probe().await? {
                Probe::Settled(value) => {
                    tracing::debug!(identity, attempts = attempt + 1, "confirmed");
                    return Ok(value);
                }
                Probe::Pending(status) => status,
            };

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(identity, attempts = attempt + 1, "confirmation timed out");
                return Err(ArchivistError::Timeout {
                    identity: identity.to_string(),
                    elapsed: now - start,
                    last_status,
                });
            }

            let delay = self.backoff.delay_for_attempt(attempt).min(deadline - now);
            tracing::trace!(identity, attempt, ?delay, ?last_status, "not yet confirmed");
            sleep(delay).await;
            attempt = attempt.saturating_add(1);
        }
    }
}

impl Default for ConfirmationWaiter {
    fn default() -> Self {
        Self::new(
            BackoffPolicy::default(),
            Duration::from_secs_f64(crate::config::DEFAULT_MAX_TIME_SECS),
        )
    }
}
