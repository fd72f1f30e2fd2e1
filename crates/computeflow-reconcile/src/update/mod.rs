//! Update operations and their orchestration

mod operations;
mod orchestrator;

pub use operations::{
    InstanceTypeOperation, NameOperation, SecurityGroupsOperation, TagsOperation,
    VolumesOperation,
};
pub use orchestrator::{EXECUTION_ORDER, UpdateOrchestrator, UpdateReport};

use crate::attribute::Attribute;
use crate::error::Result;
use crate::power::PowerCycle;
use crate::settings::ReconcileSettings;
use async_trait::async_trait;
use computeflow_cloud::{ComputeApi, DesiredConfig, Instance};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// State threaded through every operation of one pass
///
/// `current` is owned by the pass and replaced by the orchestrator after
/// every successful operation.
pub struct UpdateContext<'a> {
    pub current: Instance,
    pub desired: &'a DesiredConfig,
    pub api: &'a dyn ComputeApi,
    pub settings: &'a ReconcileSettings,
    pub cancel: &'a CancellationToken,
}

impl<'a> UpdateContext<'a> {
    pub fn power_cycle(&self) -> PowerCycle<'a> {
        PowerCycle::new(
            self.api,
            &self.settings.wait,
            self.cancel,
            self.settings.restart_on_failure,
        )
    }
}

#[async_trait]
pub trait UpdateOperation: Send + Sync {
    fn attribute(&self) -> Attribute;

    async fn execute(&self, ctx: &UpdateContext<'_>) -> Result<()>;
}

/// Attribute → operation table, built once and handed to the orchestrator
#[derive(Default)]
pub struct UpdateRegistry {
    operations: HashMap<Attribute, Box<dyn UpdateOperation>>,
}

impl UpdateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations for Name, Tags, SecurityGroups, InstanceType and Volumes.
    /// AMI has none: a changed image is reported but never applied.
    pub fn standard() -> Self {
        Self::new()
            .register(NameOperation)
            .register(TagsOperation)
            .register(SecurityGroupsOperation)
            .register(InstanceTypeOperation)
            .register(VolumesOperation)
    }

    /// Register an operation, replacing any previous one for its attribute
    pub fn register(mut self, operation: impl UpdateOperation + 'static) -> Self {
        self.operations
            .insert(operation.attribute(), Box::new(operation));
        self
    }

    pub fn get(&self, attribute: Attribute) -> Option<&dyn UpdateOperation> {
        self.operations.get(&attribute).map(|op| op.as_ref())
    }
}
