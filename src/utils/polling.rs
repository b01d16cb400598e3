// src/utils/polling.rs
//! Cancellable fixed-interval / backoff poll loop.
//!
//! Used wherever the ceremony waits on remote state it does not control:
//! DID publication and the authorization redirect. A poll attempt answers
//! `Some(value)` when done, `None` for "not yet", or an error that aborts the
//! loop immediately.

use crate::error::{PollError, UpstreamError};
use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Poll schedule: start at `interval`, multiply by `backoff` after every
/// "not yet", never sleep longer than `max_interval`, and give up once
/// `deadline` has elapsed since the first attempt.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    max_interval: Duration,
    backoff: f64,
    deadline: Option<Duration>,
}

impl Poller {
    /// Fixed-interval poller with no deadline.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            backoff: 1.0,
            deadline: None,
        }
    }

    /// Grows the interval by `factor` (clamped to at least 1.0) up to `max_interval`.
    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff = factor.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff)
            .map_or(self.max_interval, |next| next.min(self.max_interval))
    }

    /// Runs `attempt` until it yields a value.
    ///
    /// # Arguments
    /// * `cancel` - Token that stops the loop with [`PollError::Cancelled`]
    /// * `attempt` - One upstream check; `Ok(None)` means "keep waiting"
    ///
    /// An attempt still in flight is abandoned when `cancel` fires or the
    /// deadline passes. A zero deadline means exactly one attempt, which is
    /// only bounded by `cancel`.
    ///
    /// # Errors
    /// - [`PollError::Cancelled`] if `cancel` fires at any point
    /// - [`PollError::Timeout`] once the deadline has passed
    /// - [`PollError::Upstream`] as soon as an attempt fails
    pub async fn poll<T, F, Fut>(&self, cancel: &CancellationToken, mut attempt: F) -> Result<T, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, UpstreamError>>,
    {
        let started = Instant::now();
        let attempt_deadline = self
            .deadline
            .filter(|deadline| !deadline.is_zero())
            .and_then(|deadline| started.checked_add(deadline));
        let mut interval = self.interval;
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            attempts += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                outcome = attempt() => outcome?,
                _ = until(attempt_deadline) => {
                    return Err(PollError::Timeout { waited: started.elapsed() })
                }
            };
            if let Some(value) = outcome {
                debug!("poll completed after {attempts} attempt(s)");
                return Ok(value);
            }

            let waited = started.elapsed();
            let mut pause = interval;
            if let Some(deadline) = self.deadline {
                if waited >= deadline {
                    return Err(PollError::Timeout { waited });
                }
                // never sleep past the deadline
                pause = pause.min(deadline - waited);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = sleep(pause) => {}
            }
            interval = self.next_interval(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_first_ready_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let poller = Poller::new(Duration::from_millis(1));
        let counter = calls.clone();

        let value = poller
            .poll(&CancellationToken::new(), || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, UpstreamError>((n == 2).then_some("ready")) }
            })
            .await
            .unwrap();

        assert_eq!(value, "ready");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn expired_deadline_makes_a_single_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let poller = Poller::new(Duration::from_millis(5)).with_deadline(Some(Duration::ZERO));
        let counter = calls.clone();

        let result: Result<(), _> = poller
            .poll(&CancellationToken::new(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            })
            .await;

        assert!(matches!(result, Err(PollError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let counter = calls.clone();

        let result: Result<(), _> = Poller::new(Duration::from_millis(5))
            .poll(&cancel, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            })
            .await;

        assert!(matches!(result, Err(PollError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = Poller::new(Duration::from_secs(60))
            .poll(&cancel, || async { Ok(None) })
            .await;

        assert!(matches!(result, Err(PollError::Cancelled)));
    }

    #[tokio::test]
    async fn upstream_errors_abort_immediately() {
        let result: Result<(), _> = Poller::new(Duration::from_millis(1))
            .poll(&CancellationToken::new(), || async {
                Err(UpstreamError::Decode {
                    url: "http://capture".to_string(),
                    reason: "not an array".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(PollError::Upstream(_))));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_hanging_attempt() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = tokio::time::timeout(
            Duration::from_secs(2),
            Poller::new(Duration::from_millis(1))
                .poll(&cancel, || std::future::pending::<Result<Option<()>, UpstreamError>>()),
        )
        .await
        .expect("poll loop kept waiting on the attempt");

        assert!(matches!(result, Err(PollError::Cancelled)));
    }

    #[tokio::test]
    async fn deadline_interrupts_a_hanging_attempt() {
        let result: Result<(), _> = tokio::time::timeout(
            Duration::from_secs(2),
            Poller::new(Duration::from_millis(1))
                .with_deadline(Some(Duration::from_millis(50)))
                .poll(&CancellationToken::new(), || {
                    std::future::pending::<Result<Option<()>, UpstreamError>>()
                }),
        )
        .await
        .expect("poll loop kept waiting on the attempt");

        assert!(matches!(result, Err(PollError::Timeout { .. })));
    }

    #[tokio::test]
    async fn oversized_backoff_saturates_at_the_cap() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let poller = Poller::new(Duration::from_millis(1))
            .with_backoff(f64::INFINITY, Duration::from_millis(5));

        let value = poller
            .poll(&CancellationToken::new(), || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, UpstreamError>((n == 3).then_some(n)) }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(poller.next_interval(Duration::from_millis(5)), Duration::from_millis(5));
    }

    #[test]
    fn backoff_is_capped() {
        let poller = Poller::new(Duration::from_secs(1)).with_backoff(2.0, Duration::from_secs(3));
        let second = poller.next_interval(Duration::from_secs(1));
        let third = poller.next_interval(second);
        assert_eq!(second, Duration::from_secs(2));
        assert_eq!(third, Duration::from_secs(3));
    }
}
