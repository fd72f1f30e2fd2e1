//! Runs flagged update operations in a fixed order

use super::{UpdateContext, UpdateRegistry};
use crate::attribute::{Attribute, UpdatePlan};
use crate::error::{ReconcileError, Result};
use crate::waiter::cancellable;
use serde::Serialize;

/// Non-disruptive attributes first, power-cycling ones last
pub const EXECUTION_ORDER: [Attribute; 5] = [
    Attribute::Name,
    Attribute::Tags,
    Attribute::SecurityGroups,
    Attribute::InstanceType,
    Attribute::Volumes,
];

/// What a successful orchestration did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Applied attributes, in execution order
    pub applied: Vec<Attribute>,
    /// Flagged attributes with no operation to apply them
    pub skipped: Vec<Attribute>,
}

pub struct UpdateOrchestrator {
    registry: UpdateRegistry,
}

impl UpdateOrchestrator {
    pub fn new(registry: UpdateRegistry) -> Self {
        Self { registry }
    }

    /// Execute every flagged attribute's operation in [`EXECUTION_ORDER`],
    /// refreshing `ctx.current` after each one.
    ///
    /// Stops at the first failure. Nothing already applied is rolled back;
    /// the error lists what was.
    pub async fn execute(&self, plan: &UpdatePlan, ctx: &mut UpdateContext<'_>) -> Result<UpdateReport> {
        let mut report = UpdateReport::default();

        for attribute in EXECUTION_ORDER {
            if !plan.needs_update(attribute) {
                tracing::debug!(%attribute, "no update needed, skipping");
                continue;
            }
            let Some(operation) = self.registry.get(attribute) else {
                tracing::info!(%attribute, "no update operation registered, skipping");
                report.skipped.push(attribute);
                continue;
            };

            tracing::info!(%attribute, instance_id = %ctx.current.id, "applying update");
            if let Err(e) = operation.execute(ctx).await {
                tracing::error!(%attribute, error = %e, "update failed, aborting plan");
                return Err(ReconcileError::UpdateFailed {
                    attribute,
                    applied: report.applied,
                    source: Box::new(e),
                });
            }
            report.applied.push(attribute);

            if let Err(e) = refresh(ctx).await {
                return Err(ReconcileError::UpdateFailed {
                    attribute,
                    applied: report.applied,
                    source: Box::new(e),
                });
            }
        }

        for attribute in plan.pending() {
            if !EXECUTION_ORDER.contains(&attribute) {
                tracing::info!(%attribute, "attribute is reported only, skipping");
                report.skipped.push(attribute);
            }
        }

        Ok(report)
    }
}

impl Default for UpdateOrchestrator {
    fn default() -> Self {
        Self::new(UpdateRegistry::standard())
    }
}

/// Replace the context's instance with a fresh describe
async fn refresh(ctx: &mut UpdateContext<'_>) -> Result<()> {
    let instance_id = ctx.current.id.clone();
    let fresh = cancellable(ctx.cancel, ctx.api.describe_instance(&instance_id))
        .await?
        .ok_or(ReconcileError::InstanceNotFound(instance_id))?;
    tracing::debug!(instance_id = %fresh.id, state = %fresh.state, "refreshed instance");
    ctx.current = fresh;
    Ok(())
}
