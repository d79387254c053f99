//! Submit-and-wait composition used by each upgrade phase

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::client::TaskApi;
use crate::error::{Result, SwimError};
use crate::poller::{PollPolicy, TaskPoller};
use crate::types::{OperationRequest, TaskStatus};

/// Terminal snapshot of a finished operation, or the classified failure
pub type OperationResult = Result<TaskStatus>;

/// Runs one remote operation to completion
///
/// Each call is self-contained; the orchestrator only borrows the API, so
/// independent calls for different devices may run concurrently.
#[derive(Debug)]
pub struct Orchestrator<'a, A: TaskApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: TaskApi + ?Sized> Orchestrator<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Submit `request` and wait for its task to reach a terminal state
    pub async fn run_operation(
        &self,
        request: &OperationRequest,
        policy: PollPolicy,
    ) -> OperationResult {
        self.run_operation_with_cancel(request, policy, &CancellationToken::new())
            .await
    }

    /// Like [`Self::run_operation`], but nothing is submitted once `cancel`
    /// has fired, and a cancellation during a wait ends polling
    #[instrument(skip(self, request, cancel), fields(kind = %request.kind()))]
    pub async fn run_operation_with_cancel(
        &self,
        request: &OperationRequest,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> OperationResult {
        if cancel.is_cancelled() {
            return Err(SwimError::NotSubmitted {
                operation: request.kind(),
            });
        }

        let handle = self.api.submit(request).await?;
        let status = TaskPoller::new(self.api)
            .poll_until_terminal_with_cancel(&handle, policy, cancel)
            .await?;

        info!("{} task {} finished: {}", request.kind(), handle, status.progress);
        Ok(status)
    }

    /// Distribute an image to a device
    pub async fn distribute(
        &self,
        device_uuid: &str,
        image_uuid: &str,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> OperationResult {
        let request = OperationRequest::distribution(device_uuid, image_uuid);
        self.run_operation_with_cancel(&request, policy, cancel)
            .await
    }

    /// Activate an already-distributed image on a device
    pub async fn activate(
        &self,
        device_uuid: &str,
        image_uuid: &str,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> OperationResult {
        let request = OperationRequest::activation(device_uuid, image_uuid);
        self.run_operation_with_cancel(&request, policy, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{OperationKind, TaskHandle, Timestamp};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records submissions; every task finishes on the first status check
    #[derive(Default)]
    struct RecordingApi {
        submitted: Mutex<Vec<OperationRequest>>,
        fetched: Mutex<Vec<TaskHandle>>,
        fail_submit: bool,
    }

    #[async_trait]
    impl TaskApi for RecordingApi {
        async fn submit(&self, request: &OperationRequest) -> Result<TaskHandle> {
            if self.fail_submit {
                return Err(SwimError::status(500, "Internal Server Error"));
            }
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(request.clone());
            Ok(TaskHandle::new(format!("T{}", submitted.len())))
        }

        async fn fetch_status(&self, handle: &TaskHandle) -> Result<TaskStatus> {
            self.fetched.lock().unwrap().push(handle.clone());
            Ok(TaskStatus {
                task_id: handle.to_string(),
                is_error: false,
                end_time: Some(Timestamp::EpochMillis(1_704_067_260_000)),
                progress: "completed".into(),
                start_time: None,
                failure_reason: None,
                service_type: None,
                parent_id: None,
            })
        }
    }

    fn quick() -> PollPolicy {
        PollPolicy::new(Duration::from_secs(10), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_distribute_then_activate() {
        let api = RecordingApi::default();
        let orchestrator = Orchestrator::new(&api);
        let cancel = CancellationToken::new();

        let dist = orchestrator
            .distribute("dev-1", "img-1", quick(), &cancel)
            .await
            .unwrap();
        assert_eq!(dist.task_id, "T1");

        let act = orchestrator
            .activate("dev-1", "img-1", quick(), &cancel)
            .await
            .unwrap();
        assert_eq!(act.task_id, "T2");

        let submitted = api.submitted.lock().unwrap();
        assert_eq!(submitted[0].kind(), OperationKind::Distribution);
        assert_eq!(submitted[1].kind(), OperationKind::Activation);
        assert_eq!(submitted[1], OperationRequest::activation("dev-1", "img-1"));
    }

    #[tokio::test]
    async fn test_submit_failure_skips_polling() {
        let api = RecordingApi {
            fail_submit: true,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(&api);

        let err = orchestrator
            .run_operation(&OperationRequest::distribution("dev-1", "img-1"), quick())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(api.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_submits_nothing() {
        let api = RecordingApi::default();
        let orchestrator = Orchestrator::new(&api);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator
            .distribute("dev-1", "img-1", quick(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SwimError::NotSubmitted {
                operation: OperationKind::Distribution
            }
        ));
        assert!(api.submitted.lock().unwrap().is_empty());
        assert!(api.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_usable_through_trait_object() {
        let api = RecordingApi::default();
        let dyn_api: &dyn TaskApi = &api;
        let orchestrator = Orchestrator::new(dyn_api);

        let status = orchestrator
            .run_operation(&OperationRequest::distribution("dev-1", "img-1"), quick())
            .await
            .unwrap();
        assert!(status.is_terminal());
    }
}
