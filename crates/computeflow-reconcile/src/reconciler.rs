//! Entry points for one managed compute instance

use crate::attribute::{Attribute, UpdatePlan};
use crate::comparator::{DiffContext, Differ};
use crate::error::{ReconcileError, Result};
use crate::settings::ReconcileSettings;
use crate::update::{UpdateContext, UpdateOrchestrator};
use crate::waiter::cancellable;
use computeflow_cloud::{ComputeApi, DesiredConfig, Instance, InstanceState};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of a successful reconciliation pass
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub plan: UpdatePlan,
    pub applied: Vec<Attribute>,
    pub skipped: Vec<Attribute>,
    /// Instance as observed after the last applied operation
    pub instance: Instance,
}

impl ReconcileOutcome {
    /// `true` when at least one operation was applied
    pub fn plan_applied(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Observe-only view of the managed instance
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub exists: bool,
    pub up_to_date: bool,
    pub instance: Option<Instance>,
    pub plan: UpdatePlan,
}

pub struct Reconciler {
    api: Arc<dyn ComputeApi>,
    settings: ReconcileSettings,
    differ: Differ,
    orchestrator: UpdateOrchestrator,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(api: Arc<dyn ComputeApi>, settings: ReconcileSettings) -> Self {
        tracing::debug!(provider = api.name(), "reconciler ready");
        Self {
            api,
            settings,
            differ: Differ::standard(),
            orchestrator: UpdateOrchestrator::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_differ(mut self, differ: Differ) -> Self {
        self.differ = differ;
        self
    }

    pub fn with_orchestrator(mut self, orchestrator: UpdateOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Cancelling this token aborts the pass at its next suspension point
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Compare `current` with `desired` without mutating anything
    pub async fn diff(&self, current: &Instance, desired: &DesiredConfig) -> Result<UpdatePlan> {
        let ctx = DiffContext {
            current,
            desired,
            api: self.api.as_ref(),
            settings: &self.settings,
            cancel: &self.cancel,
        };
        self.differ.diff(&ctx).await
    }

    /// Diff, then apply every flagged attribute
    pub async fn reconcile(
        &self,
        current: Instance,
        desired: &DesiredConfig,
    ) -> Result<ReconcileOutcome> {
        desired.validate()?;
        let plan = self.diff(&current, desired).await?;
        if !plan.has_updates() {
            return Ok(ReconcileOutcome {
                plan,
                applied: Vec::new(),
                skipped: Vec::new(),
                instance: current,
            });
        }

        let mut ctx = UpdateContext {
            current,
            desired,
            api: self.api.as_ref(),
            settings: &self.settings,
            cancel: &self.cancel,
        };
        let report = self.orchestrator.execute(&plan, &mut ctx).await?;
        tracing::info!(
            instance_id = %ctx.current.id,
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "reconciliation finished"
        );

        Ok(ReconcileOutcome {
            plan,
            applied: report.applied,
            skipped: report.skipped,
            instance: ctx.current,
        })
    }

    /// Locate the instance by id, or by its display-name tag when no id is known
    pub async fn find(&self, instance_id: Option<&str>, name: &str) -> Result<Option<Instance>> {
        let found = match instance_id {
            Some(id) => {
                match cancellable(&self.cancel, self.api.describe_instance(id)).await {
                    Ok(found) => found,
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e),
                }
            }
            None => cancellable(&self.cancel, self.api.describe_instance_by_tag(name)).await?,
        };
        Ok(found.filter(|i| i.state != InstanceState::Terminated))
    }

    /// Report whether the instance exists and, if so, what would change
    pub async fn observe(
        &self,
        instance_id: Option<&str>,
        desired: &DesiredConfig,
    ) -> Result<Observation> {
        let Some(instance) = self.find(instance_id, &desired.name).await? else {
            tracing::info!(name = %desired.name, "instance does not exist");
            return Ok(Observation {
                exists: false,
                up_to_date: false,
                instance: None,
                plan: UpdatePlan::new(),
            });
        };

        let plan = self.diff(&instance, desired).await?;
        Ok(Observation {
            exists: true,
            up_to_date: !plan.has_updates(),
            instance: Some(instance),
            plan,
        })
    }

    /// Launch a new instance from `desired`
    pub async fn create(&self, desired: &DesiredConfig) -> Result<Instance> {
        desired.validate()?;
        tracing::info!(
            name = %desired.name,
            instance_type = %desired.instance_type,
            image_id = %desired.image_id,
            "creating instance"
        );
        let instance = cancellable(&self.cancel, self.api.create_instance(desired)).await?;
        tracing::info!(instance_id = %instance.id, "instance created");
        Ok(instance)
    }

    /// Terminate an existing instance; a missing one is an error
    pub async fn delete(&self, instance_id: &str) -> Result<()> {
        let instance = cancellable(&self.cancel, self.api.describe_instance(instance_id))
            .await?
            .ok_or_else(|| ReconcileError::InstanceNotFound(instance_id.to_string()))?;

        tracing::info!(instance_id = %instance.id, state = %instance.state, "terminating instance");
        cancellable(&self.cancel, self.api.terminate_instance(&instance.id)).await
    }
}
