//! Upgrade command - distribute then activate an image on one device

use anyhow::{bail, Context, Result};
use serde::Serialize;
use swim_client::{
    CancellationToken, ControllerClient, DeviceRecord, ImageRecord, Orchestrator, PollPolicy,
    TaskHandle, TaskStatus,
};

use crate::output::OutputContext;

/// What to upgrade and how long to wait for each phase
#[derive(Debug, Clone)]
pub struct UpgradeArgs {
    pub hostname: String,
    pub version: String,
    pub policy: PollPolicy,
    pub skip_activate: bool,
}

/// One finished phase with its child tasks
#[derive(Debug, Serialize)]
pub struct PhaseReport {
    pub task: TaskStatus,
    pub children: Vec<TaskStatus>,
}

/// Everything that happened during a run
#[derive(Debug, Serialize)]
pub struct UpgradeReport {
    pub image: ImageRecord,
    pub device: DeviceRecord,
    pub distribution: PhaseReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<PhaseReport>,
}

/// Distribute the image for `version` to `hostname`, then activate it
///
/// Activation only starts after distribution finished; any failure aborts the
/// remaining phases.
pub async fn upgrade(
    client: &ControllerClient,
    args: &UpgradeArgs,
    cancel: &CancellationToken,
    ctx: &OutputContext,
) -> Result<UpgradeReport> {
    let image = client
        .resolve_image(&args.version)
        .await
        .with_context(|| format!("Failed to resolve image {}", args.version))?;
    let device = client
        .resolve_device(&args.hostname)
        .await
        .with_context(|| format!("Failed to resolve device {}", args.hostname))?;

    ctx.info(&format!(
        "Image {} -> {}, device {} -> {}",
        args.version, image.image_uuid, args.hostname, device.id
    ));

    let orchestrator = Orchestrator::new(client);

    ensure_not_cancelled(cancel, "distribution")?;
    ctx.info("Distributing image...");
    let distributed = orchestrator
        .distribute(&device.id, &image.image_uuid, args.policy, cancel)
        .await
        .context("Image distribution failed")?;
    let distribution = phase_report(client, distributed).await?;
    ctx.task("Distribution", &distribution.task, &distribution.children);

    let activation = if args.skip_activate {
        ctx.info("Skipping activation");
        None
    } else {
        ensure_not_cancelled(cancel, "activation")?;
        ctx.info("Activating image...");
        let activated = orchestrator
            .activate(&device.id, &image.image_uuid, args.policy, cancel)
            .await
            .context("Image activation failed")?;
        let report = phase_report(client, activated).await?;
        ctx.task("Activation", &report.task, &report.children);
        Some(report)
    };

    ctx.success(&format!(
        "Upgrade of {} to {} completed",
        args.hostname, args.version
    ));

    Ok(UpgradeReport {
        image,
        device,
        distribution,
        activation,
    })
}

fn ensure_not_cancelled(cancel: &CancellationToken, next: &str) -> Result<()> {
    if cancel.is_cancelled() {
        bail!("Upgrade cancelled before {}", next);
    }
    Ok(())
}

async fn phase_report(client: &ControllerClient, task: TaskStatus) -> Result<PhaseReport> {
    let children = client
        .child_tasks(&TaskHandle::new(task.task_id.clone()))
        .await
        .with_context(|| format!("Failed to fetch child tasks of {}", task.task_id))?;
    Ok(PhaseReport { task, children })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use serde_json::json;
    use std::time::Duration;
    use swim_client::testing::{MockController, TestServer};
    use swim_client::{ErrorKind, SwimError};

    fn args(skip_activate: bool) -> UpgradeArgs {
        UpgradeArgs {
            hostname: "edge1".into(),
            version: "17.9.4".into(),
            policy: PollPolicy::new(Duration::from_secs(5), Duration::from_millis(20)),
            skip_activate,
        }
    }

    fn mock() -> MockController {
        MockController::new()
            .with_image("17.9.4", "img-1")
            .with_device("edge1", "dev-1")
    }

    async fn connect(server: &TestServer) -> ControllerClient {
        let config = TestServer::config_builder(server.addr).build();
        ControllerClient::connect(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_upgrade_runs_both_phases() {
        let mock = mock();
        let server = TestServer::start(mock.router()).await.unwrap();
        let client = connect(&server).await;
        let ctx = OutputContext::new(OutputFormat::Text, true, true);

        let report = upgrade(&client, &args(false), &CancellationToken::new(), &ctx)
            .await
            .unwrap();

        assert_eq!(report.distribution.task.task_id, "T1");
        assert_eq!(report.activation.unwrap().task.task_id, "T2");
        assert_eq!(report.distribution.children.len(), 1);
        assert_eq!(mock.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_skip_activate() {
        let mock = mock();
        let server = TestServer::start(mock.router()).await.unwrap();
        let client = connect(&server).await;
        let ctx = OutputContext::new(OutputFormat::Text, true, true);

        let report = upgrade(&client, &args(true), &CancellationToken::new(), &ctx)
            .await
            .unwrap();

        assert!(report.activation.is_none());
        assert_eq!(mock.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_sends_no_operation() {
        let mock = mock();
        let server = TestServer::start(mock.router()).await.unwrap();
        let client = connect(&server).await;
        let ctx = OutputContext::new(OutputFormat::Text, true, true);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = upgrade(&client, &args(false), &cancel, &ctx)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("cancelled before distribution"));
        assert!(mock.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_failed_distribution_skips_activation() {
        let mock = mock().script_next_task(vec![
            json!({ "isError": true, "progress": "disk full" }),
        ]);
        let server = TestServer::start(mock.router()).await.unwrap();
        let client = connect(&server).await;
        let ctx = OutputContext::new(OutputFormat::Text, true, true);

        let err = upgrade(&client, &args(false), &CancellationToken::new(), &ctx)
            .await
            .unwrap_err();

        let swim = err.downcast_ref::<SwimError>().unwrap();
        assert_eq!(swim.kind(), ErrorKind::RemoteTask);
        assert!(err.to_string().contains("Image distribution failed"));
        assert_eq!(mock.submissions().len(), 1);
    }
}
