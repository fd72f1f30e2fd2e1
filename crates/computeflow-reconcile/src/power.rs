//! Power-cycle coordination: stop, wait for stopped, mutate, start

use crate::error::{ReconcileError, Result};
use crate::settings::WaitConfig;
use crate::waiter::{cancellable, wait_for_instance_state};
use computeflow_cloud::{ComputeApi, InstanceState};
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub struct PowerCycle<'a> {
    api: &'a dyn ComputeApi,
    wait: &'a WaitConfig,
    cancel: &'a CancellationToken,
    restart_on_failure: bool,
}

impl<'a> PowerCycle<'a> {
    pub fn new(
        api: &'a dyn ComputeApi,
        wait: &'a WaitConfig,
        cancel: &'a CancellationToken,
        restart_on_failure: bool,
    ) -> Self {
        Self {
            api,
            wait,
            cancel,
            restart_on_failure,
        }
    }

    /// Stop `instance_id`, run `mutation` once it is observed stopped, then
    /// issue a start without waiting for `running`.
    ///
    /// An instance still `pending` from an earlier start is waited on until
    /// `running` first, since it cannot be stopped yet.
    ///
    /// If anything fails after the stop was issued the instance may be left
    /// stopped. With `restart_on_failure` a best-effort start is attempted.
    pub async fn run<T, F>(&self, instance_id: &str, mutation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.settle(instance_id).await?;

        tracing::info!(instance_id, "stopping instance");
        cancellable(self.cancel, self.api.stop_instance(instance_id)).await?;

        let outcome: Result<T> = async {
            wait_for_instance_state(
                self.api,
                instance_id,
                InstanceState::Stopped,
                self.wait,
                self.cancel,
            )
            .await?;
            tracing::info!(instance_id, "instance stopped, applying changes");

            let value = mutation.await?;

            tracing::info!(instance_id, "starting instance");
            cancellable(self.cancel, self.api.start_instance(instance_id)).await?;
            Ok(value)
        }
        .await;

        if let Err(e) = &outcome {
            self.recover(instance_id, e).await;
        }
        outcome
    }

    async fn settle(&self, instance_id: &str) -> Result<()> {
        let instance = cancellable(self.cancel, self.api.describe_instance(instance_id))
            .await?
            .ok_or_else(|| ReconcileError::InstanceNotFound(instance_id.to_string()))?;

        if instance.state == InstanceState::Pending {
            tracing::info!(instance_id, "instance still starting, waiting for running");
            wait_for_instance_state(
                self.api,
                instance_id,
                InstanceState::Running,
                self.wait,
                self.cancel,
            )
            .await?;
        }
        Ok(())
    }

    async fn recover(&self, instance_id: &str, error: &ReconcileError) {
        if !self.restart_on_failure {
            tracing::warn!(
                instance_id,
                error = %error,
                "power cycle failed, instance may be left stopped"
            );
            return;
        }

        tracing::warn!(
            instance_id,
            error = %error,
            "power cycle failed, attempting best-effort start"
        );
        // not raced against the token: cancellation is the usual reason to get here
        if let Err(start_err) = self.api.start_instance(instance_id).await {
            tracing::warn!(
                instance_id,
                error = %start_err,
                "best-effort start failed, instance left stopped"
            );
        }
    }
}
