//! Task polling state machine
//!
//! A submitted task is polled until one terminal outcome is reached:
//!
//! 1. `endTime` present: the snapshot is returned as-is, even if `isError` is set
//! 2. `isError` set: [`SwimError::RemoteTask`]
//! 3. Elapsed time reached the timeout: [`SwimError::TaskTimeout`]
//! 4. Otherwise sleep for the retry interval and poll again
//!
//! Transport failures from the status call propagate immediately.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::client::TaskApi;
use crate::error::{Result, SwimError};
use crate::types::{TaskHandle, TaskStatus};

/// Default upper bound on how long a task may run
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(3600);
/// Default wait between status checks
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Timeout and cadence for one polling run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub retry_interval: Duration,
}

impl PollPolicy {
    pub fn new(timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            timeout,
            retry_interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_TIMEOUT, DEFAULT_RETRY_INTERVAL)
    }
}

/// Outcome of evaluating one snapshot
#[derive(Debug)]
enum Step {
    Done(TaskStatus),
    Failed(SwimError),
    Wait,
}

/// Classify a snapshot given the time spent polling so far
///
/// Errors are attributed to the polled handle, not to whatever id the
/// snapshot carries.
fn evaluate(
    handle: &TaskHandle,
    status: TaskStatus,
    elapsed: Duration,
    policy: &PollPolicy,
) -> Step {
    if status.is_terminal() {
        return Step::Done(status);
    }

    if status.is_error {
        return Step::Failed(SwimError::RemoteTask {
            task_id: handle.as_str().to_string(),
            progress: status.progress,
        });
    }

    if elapsed >= policy.timeout {
        return Step::Failed(SwimError::TaskTimeout {
            task_id: handle.as_str().to_string(),
            timeout: policy.timeout,
        });
    }

    Step::Wait
}

/// Polls a task's status endpoint until it reaches a terminal state
#[derive(Debug)]
pub struct TaskPoller<'a, A: TaskApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: TaskApi + ?Sized> TaskPoller<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Poll until terminal, blocking the caller for as long as it takes
    pub async fn poll_until_terminal(
        &self,
        handle: &TaskHandle,
        policy: PollPolicy,
    ) -> Result<TaskStatus> {
        self.poll_until_terminal_with_cancel(handle, policy, &CancellationToken::new())
            .await
    }

    /// Poll until terminal, giving up early if `cancel` fires during a wait
    #[instrument(skip(self, cancel), fields(task_id = %handle))]
    pub async fn poll_until_terminal_with_cancel(
        &self,
        handle: &TaskHandle,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<TaskStatus> {
        let start = Instant::now();

        loop {
            let status = self.api.fetch_status(handle).await?;
            debug!(
                "Task {} snapshot: is_error={} end_time={:?} progress={:?}",
                handle, status.is_error, status.end_time, status.progress
            );

            match evaluate(handle, status, start.elapsed(), &policy) {
                Step::Done(status) => {
                    info!("Task {} completed", handle);
                    return Ok(status);
                }
                Step::Failed(err) => return Err(err),
                Step::Wait => {}
            }

            info!(
                "Task {} has not completed yet. Sleeping {} seconds...",
                handle,
                policy.retry_interval.as_secs()
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(SwimError::Cancelled {
                        task_id: handle.as_str().to_string(),
                    });
                }
                _ = tokio::time::sleep(policy.retry_interval) => {}
            }
        }
    }
}
