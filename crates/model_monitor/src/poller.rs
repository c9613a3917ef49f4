//! Waiting for control-plane resources to settle.
//!
//! A resource is polled until its status leaves the in-progress set. Polling
//! is bounded by an optional timeout and can be cancelled from outside.

use core::future::Future;
use core::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use monitor_structs::Lifecycle;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Interval between status checks used by the managed-service walkthroughs.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(45);

/// Upper bound on how long a single wait may take by default.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// How often and for how long to poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Delay before the second status check
    pub interval: Duration,
    /// Cap on the delay when backing off
    pub max_interval: Duration,
    /// Multiplier applied to the delay after every check; 1.0 keeps it fixed
    pub backoff_factor: f32,
    /// Give up after this long; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_POLL_INTERVAL)
    }
}

impl PollPolicy {
    /// Checks every `interval`, timing out after [`DEFAULT_POLL_TIMEOUT`].
    #[must_use]
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            backoff_factor: 1.0,
            timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }

    /// Grows the delay by `factor` after every check, up to `max_interval`.
    #[must_use]
    pub fn with_backoff(mut self, factor: f32, max_interval: Duration) -> Self {
        self.backoff_factor = factor.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    /// Replaces the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.interval)
            .with_max_delay(self.max_interval)
            .with_factor(self.backoff_factor)
            .without_max_times()
    }
}

/// Why a wait ended without a settled status.
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timed out after {elapsed:?} waiting for {resource} (last status {last_status})")]
    TimedOut {
        resource: String,
        elapsed: Duration,
        last_status: String,
    },

    #[error("cancelled while waiting for {resource}")]
    Cancelled { resource: String },

    #[error("failed to fetch the status of {resource}")]
    Fetch {
        resource: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Outcome of one status check that did not settle the wait.
enum Observation {
    Pending(&'static str),
    Failed(anyhow::Error),
}

/// Polls `fetch` until it reports a status that is not in progress.
///
/// The first check happens immediately; later checks follow `policy`. The
/// returned value is always one whose status is settled. A failing `fetch`
/// ends the wait at once.
///
/// # Errors
///
/// Returns [`WaitError::TimedOut`] when the policy's timeout elapses,
/// [`WaitError::Cancelled`] when `cancel` fires, and [`WaitError::Fetch`]
/// when a status check fails.
pub async fn wait_until_settled<T, F, Fut>(
    resource: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    fetch: F,
) -> Result<T, WaitError>
where
    T: Lifecycle,
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let started = Instant::now();
    let mut last_status = "unknown";

    let check = || {
        let pending = fetch();
        async move {
            let observed = pending.await.map_err(Observation::Failed)?;
            debug!(resource, status = observed.state(), "Observed status");

            if observed.is_in_progress() {
                Err(Observation::Pending(observed.state()))
            } else {
                Ok(observed)
            }
        }
    };

    let settled = check
        .retry(policy.backoff())
        .when(|observation| matches!(observation, Observation::Pending(_)))
        .notify(|observation, delay| {
            if let Observation::Pending(status) = observation {
                last_status = status;
                debug!(resource, status, ?delay, "Still in progress");
            }
        });

    let bounded = async {
        match policy.timeout {
            Some(limit) => tokio::time::timeout(limit, settled).await.ok(),
            None => Some(settled.await),
        }
    };

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            return Err(WaitError::Cancelled {
                resource: resource.to_owned(),
            });
        }
        outcome = bounded => outcome,
    };

    match outcome {
        Some(Ok(observed)) => {
            info!(
                resource,
                status = observed.state(),
                elapsed = ?started.elapsed(),
                "Resource settled"
            );
            Ok(observed)
        }
        Some(Err(Observation::Failed(source))) => Err(WaitError::Fetch {
            resource: resource.to_owned(),
            source,
        }),
        Some(Err(Observation::Pending(status))) => Err(WaitError::TimedOut {
            resource: resource.to_owned(),
            elapsed: started.elapsed(),
            last_status: status.to_owned(),
        }),
        None => Err(WaitError::TimedOut {
            resource: resource.to_owned(),
            elapsed: started.elapsed(),
            last_status: last_status.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use monitor_structs::{EndpointStatus, ProcessingJobStatus};

    use super::*;

    /// Returns the scripted statuses in order, repeating the last one.
    fn scripted<T: Copy>(script: &[T], calls: &AtomicUsize) -> T {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        script[call.min(script.len() - 1)]
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_after_first_settled_status() {
        let script = [
            EndpointStatus::Creating,
            EndpointStatus::Creating,
            EndpointStatus::InService,
        ];
        let calls = AtomicUsize::new(0);
        let started = Instant::now();

        let status = wait_until_settled(
            "endpoint demo",
            &PollPolicy::default(),
            &CancellationToken::new(),
            || {
                let status = scripted(&script, &calls);
                async move { Ok(status) }
            },
        )
        .await
        .unwrap();

        assert_eq!(status, EndpointStatus::InService);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_POLL_INTERVAL * 2, "elapsed {elapsed:?}");
        assert!(elapsed < DEFAULT_POLL_INTERVAL * 3, "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_immediately_does_not_sleep() {
        let started = Instant::now();

        let status = wait_until_settled(
            "job",
            &PollPolicy::default(),
            &CancellationToken::new(),
            || async { Ok(ProcessingJobStatus::Failed) },
        )
        .await
        .unwrap();

        assert_eq!(status, ProcessingJobStatus::Failed);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_delay_up_to_cap() {
        let script = [
            ProcessingJobStatus::InProgress,
            ProcessingJobStatus::InProgress,
            ProcessingJobStatus::InProgress,
            ProcessingJobStatus::Completed,
        ];
        let calls = AtomicUsize::new(0);
        let started = Instant::now();
        let policy = PollPolicy::fixed(Duration::from_secs(1))
            .with_backoff(2.0, Duration::from_secs(3));

        wait_until_settled("job", &policy, &CancellationToken::new(), || {
            let status = scripted(&script, &calls);
            async move { Ok(status) }
        })
        .await
        .unwrap();

        // 1s, 2s, then capped at 3s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(7), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_while_in_progress() {
        let policy = PollPolicy::default().with_timeout(Some(Duration::from_secs(600)));

        let error = wait_until_settled("endpoint demo", &policy, &CancellationToken::new(), || {
            async { Ok(EndpointStatus::Creating) }
        })
        .await
        .unwrap_err();

        match error {
            WaitError::TimedOut {
                resource,
                last_status,
                ..
            } => {
                assert_eq!(resource, "endpoint demo");
                assert_eq!(last_status, "Creating");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_waiting() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(100)).await;
            trigger.cancel();
        });

        let policy = PollPolicy::default().with_timeout(None);
        let error = wait_until_settled("endpoint demo", &policy, &cancel, || async {
            Ok(EndpointStatus::Creating)
        })
        .await
        .unwrap_err();

        assert!(matches!(error, WaitError::Cancelled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_is_not_retried() {
        let calls = AtomicUsize::new(0);

        let error = wait_until_settled(
            "job",
            &PollPolicy::default(),
            &CancellationToken::new(),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<ProcessingJobStatus, _>(anyhow::anyhow!("throttled")) }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(error, WaitError::Fetch { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
