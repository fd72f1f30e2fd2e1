//! Reduces current vs desired volumes into an ordered command list

use super::command::VolumeCommand;
use computeflow_cloud::{DesiredConfig, Instance, Volume};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// One currently attached volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeInformation {
    pub volume_id: String,
    pub device_name: String,
    pub kind: String,
    pub size: i32,
}

/// Attached volumes of one instance keyed by device name
///
/// Built once per pass; every command of the pass is derived from the same
/// snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeSnapshot {
    devices: BTreeMap<String, VolumeInformation>,
}

impl VolumeSnapshot {
    /// Keep only volumes attached to `instance_id`. A device seen twice keeps
    /// its first volume.
    pub fn from_attached(instance_id: &str, volumes: &[Volume]) -> Self {
        let mut devices = BTreeMap::new();
        for volume in volumes {
            let Some(attachment) = &volume.attachment else {
                continue;
            };
            if attachment.instance_id != instance_id {
                continue;
            }
            devices
                .entry(attachment.device.clone())
                .or_insert_with(|| VolumeInformation {
                    volume_id: volume.id.clone(),
                    device_name: attachment.device.clone(),
                    kind: volume.kind.clone(),
                    size: volume.size,
                });
        }
        Self { devices }
    }

    pub fn get(&self, device_name: &str) -> Option<&VolumeInformation> {
        self.devices.get(device_name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Attached volumes in device-name order
    pub fn iter(&self) -> impl Iterator<Item = &VolumeInformation> {
        self.devices.values()
    }
}

/// Compute the commands converging `snapshot` to `desired.storage`.
///
/// Per-device create/resize/retype commands follow the desired list order;
/// detachments come last, sorted by device name. Shrinking is never
/// requested.
pub fn analyze(
    instance: &Instance,
    snapshot: &VolumeSnapshot,
    desired: &DesiredConfig,
) -> Vec<VolumeCommand> {
    let subnet_id = instance
        .subnet_id
        .clone()
        .unwrap_or_else(|| desired.networking.subnet_id.clone());

    let mut commands = Vec::new();
    let mut declared = HashSet::new();

    for spec in &desired.storage {
        declared.insert(spec.device_name.as_str());

        let Some(current) = snapshot.get(&spec.device_name) else {
            commands.push(VolumeCommand::CreateAndAttach {
                instance_id: instance.id.clone(),
                device_name: spec.device_name.clone(),
                kind: spec.kind.clone(),
                size: spec.size,
                subnet_id: subnet_id.clone(),
            });
            continue;
        };

        if spec.size > current.size {
            commands.push(VolumeCommand::Resize {
                volume_id: current.volume_id.clone(),
                from_size: current.size,
                to_size: spec.size,
            });
        } else if spec.size < current.size {
            tracing::debug!(
                device = %spec.device_name,
                current = current.size,
                desired = spec.size,
                "desired size is smaller than current, keeping current size"
            );
        }

        if spec.kind != current.kind {
            commands.push(VolumeCommand::ChangeType {
                volume_id: current.volume_id.clone(),
                from_kind: current.kind.clone(),
                to_kind: spec.kind.clone(),
            });
        }
    }

    for current in snapshot.iter() {
        if !declared.contains(current.device_name.as_str()) {
            commands.push(VolumeCommand::Detach {
                volume_id: current.volume_id.clone(),
                device_name: current.device_name.clone(),
                instance_id: instance.id.clone(),
            });
        }
    }

    commands
}
