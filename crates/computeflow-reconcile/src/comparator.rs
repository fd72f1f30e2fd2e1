//! Attribute comparators: does an attribute group need to change?

use crate::attribute::{Attribute, UpdatePlan};
use crate::error::{ReconcileError, Result};
use crate::settings::{ReconcileSettings, VolumeProbeFailure};
use crate::volume::{VolumeSnapshot, analyze};
use crate::waiter::cancellable;
use async_trait::async_trait;
use computeflow_cloud::{ComputeApi, DesiredConfig, Instance, NAME_TAG_KEY};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Machine image differs (exact string comparison)
pub fn ami_differs(current: &Instance, desired: &DesiredConfig) -> bool {
    current.image_id != desired.image_id
}

pub fn instance_type_differs(current: &Instance, desired: &DesiredConfig) -> bool {
    current.instance_type != desired.instance_type
}

/// Display-name tag differs. An instance without the tag predates name
/// tracking and is left alone.
pub fn name_differs(current: &Instance, desired: &DesiredConfig) -> bool {
    current.name().is_some_and(|name| name != desired.name)
}

/// Two-way tag diff. The display-name key on the current side never counts
/// as an extra tag.
pub fn tags_differ(current: &Instance, desired: &DesiredConfig) -> bool {
    let missing_or_changed = desired
        .tags
        .iter()
        .any(|(key, value)| current.tags.get(key) != Some(value));

    let extra = current
        .tags
        .keys()
        .any(|key| key != NAME_TAG_KEY && !desired.tags.contains_key(key));

    missing_or_changed || extra
}

/// Security-group membership differs as a set
pub fn security_groups_differ(current: &Instance, desired: &DesiredConfig) -> bool {
    let current: HashSet<&str> = current.security_group_ids.iter().map(String::as_str).collect();
    let desired: HashSet<&str> = desired
        .networking
        .security_group_ids
        .iter()
        .map(String::as_str)
        .collect();
    current != desired
}

/// Everything a comparator may look at
pub struct DiffContext<'a> {
    pub current: &'a Instance,
    pub desired: &'a DesiredConfig,
    pub api: &'a dyn ComputeApi,
    pub settings: &'a ReconcileSettings,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait AttributeComparator: Send + Sync {
    fn attribute(&self) -> Attribute;

    async fn needs_update(&self, ctx: &DiffContext<'_>) -> Result<bool>;
}

/// Comparator backed by one of the pure functions above
pub struct FieldComparator {
    attribute: Attribute,
    differs: fn(&Instance, &DesiredConfig) -> bool,
}

impl FieldComparator {
    pub const fn new(attribute: Attribute, differs: fn(&Instance, &DesiredConfig) -> bool) -> Self {
        Self {
            attribute,
            differs,
        }
    }
}

#[async_trait]
impl AttributeComparator for FieldComparator {
    fn attribute(&self) -> Attribute {
        self.attribute
    }

    async fn needs_update(&self, ctx: &DiffContext<'_>) -> Result<bool> {
        Ok((self.differs)(ctx.current, ctx.desired))
    }
}

/// Describes the attached volumes and runs the analyzer; any command means
/// an update is needed
pub struct VolumesComparator;

#[async_trait]
impl AttributeComparator for VolumesComparator {
    fn attribute(&self) -> Attribute {
        Attribute::Volumes
    }

    async fn needs_update(&self, ctx: &DiffContext<'_>) -> Result<bool> {
        let volumes =
            match cancellable(ctx.cancel, ctx.api.describe_volumes(&ctx.current.id)).await {
                Ok(volumes) => volumes,
                Err(ReconcileError::Cancelled) => return Err(ReconcileError::Cancelled),
                Err(e) => match ctx.settings.volume_probe_failure {
                    VolumeProbeFailure::AssumeInSync => {
                        tracing::warn!(
                            instance_id = %ctx.current.id,
                            error = %e,
                            "describe volumes failed, treating volumes as up to date"
                        );
                        return Ok(false);
                    }
                    VolumeProbeFailure::Propagate => return Err(e),
                },
            };

        let snapshot = VolumeSnapshot::from_attached(&ctx.current.id, &volumes);
        let commands = analyze(ctx.current, &snapshot, ctx.desired);
        for command in &commands {
            tracing::debug!(instance_id = %ctx.current.id, "pending volume command: {}", command);
        }
        Ok(!commands.is_empty())
    }
}

/// Runs every registered comparator and collects the results into a plan
pub struct Differ {
    comparators: Vec<Box<dyn AttributeComparator>>,
}

impl Differ {
    pub fn new() -> Self {
        Self {
            comparators: Vec::new(),
        }
    }

    /// Name, Tags, SecurityGroups, InstanceType, AMI and Volumes
    pub fn standard() -> Self {
        Self::new()
            .register(FieldComparator::new(Attribute::Name, name_differs))
            .register(FieldComparator::new(Attribute::Tags, tags_differ))
            .register(FieldComparator::new(
                Attribute::SecurityGroups,
                security_groups_differ,
            ))
            .register(FieldComparator::new(
                Attribute::InstanceType,
                instance_type_differs,
            ))
            .register(FieldComparator::new(Attribute::Ami, ami_differs))
            .register(VolumesComparator)
    }

    pub fn register(mut self, comparator: impl AttributeComparator + 'static) -> Self {
        self.comparators.push(Box::new(comparator));
        self
    }

    pub async fn diff(&self, ctx: &DiffContext<'_>) -> Result<UpdatePlan> {
        let mut plan = UpdatePlan::new();
        for comparator in &self.comparators {
            let needs_update = comparator.needs_update(ctx).await?;
            plan.set(comparator.attribute(), needs_update);
        }

        if plan.has_updates() {
            for (attribute, needs_update) in plan.iter() {
                tracing::debug!(%attribute, needs_update, "attribute compared");
            }
            tracing::info!(
                instance_id = %ctx.current.id,
                current_type = %ctx.current.instance_type,
                desired_type = %ctx.desired.instance_type,
                current_image = %ctx.current.image_id,
                desired_image = %ctx.desired.image_id,
                "instance out of date ({})",
                plan
            );
        } else {
            tracing::debug!(instance_id = %ctx.current.id, "instance up to date");
        }

        Ok(plan)
    }
}

impl Default for Differ {
    fn default() -> Self {
        Self::standard()
    }
}
