//! Waiting for asynchronous provider state transitions (exponential backoff)
//!
//! Every suspension point here honours the pass's [`CancellationToken`]: the
//! backoff sleep and each provider call are raced against cancellation.

use crate::error::{ReconcileError, Result};
use crate::settings::WaitConfig;
use computeflow_cloud::{ComputeApi, Instance, InstanceState, Volume, VolumeStatus};
use std::future::Future;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Run a provider call, aborting with `Cancelled` if the token fires first
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = computeflow_cloud::Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled),
        result = call => result.map_err(ReconcileError::from),
    }
}

/// Poll `probe` until it yields `Some`, sleeping with backoff between polls
async fn poll_until<T, F, Fut>(
    resource: &str,
    target: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let deadline = started + config.timeout();

    let mut attempt: u32 = 0;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let delay = config.delay_for_attempt(attempt).min(remaining);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReconcileError::Cancelled),
            _ = sleep(delay) => {}
        }

        if let Some(reached) = probe().await? {
            tracing::debug!(resource, target, attempt, "state reached");
            return Ok(reached);
        }

        if Instant::now() >= deadline {
            return Err(ReconcileError::WaitTimeout {
                resource: resource.to_string(),
                target: target.to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
        attempt = attempt.saturating_add(1);
    }
}

/// Block until the instance reports `target`
pub async fn wait_for_instance_state(
    api: &dyn ComputeApi,
    instance_id: &str,
    target: InstanceState,
    config: &WaitConfig,
    cancel: &CancellationToken,
) -> Result<Instance> {
    let target_name = target.to_string();
    poll_until(instance_id, &target_name, config, cancel, move || async move {
        let instance = cancellable(cancel, api.describe_instance(instance_id))
            .await?
            .ok_or_else(|| ReconcileError::InstanceNotFound(instance_id.to_string()))?;

        tracing::debug!(instance_id, state = %instance.state, "polled instance state");
        Ok((instance.state == target).then_some(instance))
    })
    .await
}

/// Block until the volume reports `target`
pub async fn wait_for_volume_status(
    api: &dyn ComputeApi,
    volume_id: &str,
    target: VolumeStatus,
    config: &WaitConfig,
    cancel: &CancellationToken,
) -> Result<Volume> {
    let target_name = target.to_string();
    poll_until(volume_id, &target_name, config, cancel, move || async move {
        let volume = cancellable(cancel, api.describe_volume(volume_id))
            .await?
            .ok_or_else(|| {
                ReconcileError::Cloud(computeflow_cloud::CloudError::ResourceNotFound(
                    volume_id.to_string(),
                ))
            })?;

        tracing::debug!(volume_id, status = %volume.status, "polled volume status");
        Ok((volume.status == target).then_some(volume))
    })
    .await
}
