//! Volume commands: data describing one provider mutation each

use crate::error::{ReconcileError, Result};
use crate::settings::WaitConfig;
use crate::waiter::{cancellable, wait_for_volume_status};
use computeflow_cloud::{CloudError, ComputeApi, VolumeStatus};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// A single volume mutation, computed from one snapshot and run exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum VolumeCommand {
    /// Desired device has no volume: create one in the subnet's zone and attach it
    CreateAndAttach {
        instance_id: String,
        device_name: String,
        kind: String,
        size: i32,
        subnet_id: String,
    },
    /// Grow an existing volume
    Resize {
        volume_id: String,
        from_size: i32,
        to_size: i32,
    },
    /// Change an existing volume's disk kind
    ChangeType {
        volume_id: String,
        from_kind: String,
        to_kind: String,
    },
    /// Attached device no longer declared
    Detach {
        volume_id: String,
        device_name: String,
        instance_id: String,
    },
}

/// What a command needs from the pass to run
pub struct CommandContext<'a> {
    pub api: &'a dyn ComputeApi,
    pub wait: &'a WaitConfig,
    pub cancel: &'a CancellationToken,
}

impl VolumeCommand {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            VolumeCommand::CreateAndAttach { .. } => "create-and-attach",
            VolumeCommand::Resize { .. } => "resize",
            VolumeCommand::ChangeType { .. } => "change-type",
            VolumeCommand::Detach { .. } => "detach",
        }
    }

    /// Check the command carries everything it needs before any of the batch runs
    pub fn validate(&self) -> Result<()> {
        let missing = |field: &str| {
            Err(ReconcileError::InvalidCommand(format!(
                "{}: {} is empty",
                self.kind(),
                field
            )))
        };

        match self {
            VolumeCommand::CreateAndAttach {
                instance_id,
                device_name,
                kind,
                size,
                subnet_id,
            } => {
                if instance_id.is_empty() {
                    return missing("instance_id");
                }
                if device_name.is_empty() {
                    return missing("device_name");
                }
                if kind.is_empty() {
                    return missing("kind");
                }
                if subnet_id.is_empty() {
                    return missing("subnet_id");
                }
                if *size <= 0 {
                    return Err(ReconcileError::InvalidCommand(format!(
                        "create-and-attach {}: size must be positive",
                        device_name
                    )));
                }
            }
            VolumeCommand::Resize {
                volume_id,
                from_size,
                to_size,
            } => {
                if volume_id.is_empty() {
                    return missing("volume_id");
                }
                if to_size <= from_size {
                    return Err(ReconcileError::InvalidCommand(format!(
                        "resize {}: volumes can only grow ({} -> {})",
                        volume_id, from_size, to_size
                    )));
                }
            }
            VolumeCommand::ChangeType {
                volume_id, to_kind, ..
            } => {
                if volume_id.is_empty() {
                    return missing("volume_id");
                }
                if to_kind.is_empty() {
                    return missing("to_kind");
                }
            }
            VolumeCommand::Detach {
                volume_id,
                device_name,
                instance_id,
            } => {
                if volume_id.is_empty() {
                    return missing("volume_id");
                }
                if device_name.is_empty() {
                    return missing("device_name");
                }
                if instance_id.is_empty() {
                    return missing("instance_id");
                }
            }
        }
        Ok(())
    }

    /// Execute the command against the provider
    pub async fn run(&self, ctx: &CommandContext<'_>) -> Result<()> {
        tracing::info!(command = self.kind(), "running volume command");

        match self {
            VolumeCommand::CreateAndAttach {
                instance_id,
                device_name,
                kind,
                size,
                subnet_id,
            } => {
                let subnet = cancellable(ctx.cancel, ctx.api.describe_subnet(subnet_id))
                    .await
                    .map_err(|e| match e {
                        ReconcileError::Cloud(CloudError::ResourceNotFound(_)) => {
                            ReconcileError::SubnetNotFound(subnet_id.clone())
                        }
                        other => other,
                    })?;

                let volume = cancellable(
                    ctx.cancel,
                    ctx.api
                        .create_volume(kind, *size, &subnet.availability_zone),
                )
                .await?;
                tracing::debug!(
                    volume_id = %volume.id,
                    zone = %subnet.availability_zone,
                    "volume created, waiting until available"
                );

                wait_for_volume_status(
                    ctx.api,
                    &volume.id,
                    VolumeStatus::Available,
                    ctx.wait,
                    ctx.cancel,
                )
                .await?;

                cancellable(
                    ctx.cancel,
                    ctx.api.attach_volume(&volume.id, instance_id, device_name),
                )
                .await
            }
            VolumeCommand::Resize {
                volume_id, to_size, ..
            } => {
                cancellable(ctx.cancel, ctx.api.modify_volume_size(volume_id, *to_size)).await
            }
            VolumeCommand::ChangeType {
                volume_id, to_kind, ..
            } => {
                cancellable(ctx.cancel, ctx.api.modify_volume_type(volume_id, to_kind)).await
            }
            VolumeCommand::Detach {
                volume_id,
                device_name,
                instance_id,
            } => {
                cancellable(
                    ctx.cancel,
                    ctx.api.detach_volume(volume_id, instance_id, device_name),
                )
                .await
            }
        }
    }
}

impl std::fmt::Display for VolumeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeCommand::CreateAndAttach {
                device_name,
                kind,
                size,
                ..
            } => write!(f, "create {} ({}, {}GiB) and attach", device_name, kind, size),
            VolumeCommand::Resize {
                volume_id,
                from_size,
                to_size,
            } => write!(f, "resize {} {}GiB -> {}GiB", volume_id, from_size, to_size),
            VolumeCommand::ChangeType {
                volume_id,
                from_kind,
                to_kind,
            } => write!(f, "change type of {} {} -> {}", volume_id, from_kind, to_kind),
            VolumeCommand::Detach {
                volume_id,
                device_name,
                ..
            } => write!(f, "detach {} from {}", volume_id, device_name),
        }
    }
}
