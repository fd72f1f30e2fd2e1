//! Observed state reported by the compute provider

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tag key that carries the instance's display name.
pub const NAME_TAG_KEY: &str = "Name";

/// Provider's current view of a compute instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Provider-assigned instance identifier
    pub id: String,

    /// Lifecycle state
    pub state: InstanceState,

    /// Machine image identifier
    pub image_id: String,

    /// Instance type identifier (e.g. "t3.micro")
    pub instance_type: String,

    /// Tags keyed by tag key
    #[serde(default)]
    pub tags: HashMap<String, String>,

    /// Attached security group identifiers
    #[serde(default)]
    pub security_group_ids: Vec<String>,

    /// Subnet the primary interface lives in
    pub subnet_id: Option<String>,

    /// When the instance was launched
    pub launch_time: Option<DateTime<Utc>>,
}

impl Instance {
    /// Value of the display-name tag, if present
    pub fn name(&self) -> Option<&str> {
        self.tags.get(NAME_TAG_KEY).map(String::as_str)
    }
}

/// Lifecycle state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    Unknown,
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::Pending => write!(f, "pending"),
            InstanceState::Running => write!(f, "running"),
            InstanceState::Stopping => write!(f, "stopping"),
            InstanceState::Stopped => write!(f, "stopped"),
            InstanceState::ShuttingDown => write!(f, "shutting-down"),
            InstanceState::Terminated => write!(f, "terminated"),
            InstanceState::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<&str> for InstanceState {
    fn from(value: &str) -> Self {
        match value {
            "pending" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "stopping" => InstanceState::Stopping,
            "stopped" => InstanceState::Stopped,
            "shutting-down" => InstanceState::ShuttingDown,
            "terminated" => InstanceState::Terminated,
            _ => InstanceState::Unknown,
        }
    }
}

/// Block-storage volume as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,

    /// Disk kind (e.g. "gp3")
    pub kind: String,

    /// Size in GiB
    pub size: i32,

    pub status: VolumeStatus,

    /// First attachment, if the volume is attached anywhere
    pub attachment: Option<VolumeAttachment>,
}

/// Where a volume is attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAttachment {
    pub instance_id: String,

    /// Device slot name (e.g. "/dev/sdb")
    pub device: String,
}

/// Volume lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeStatus {
    Creating,
    Available,
    InUse,
    Deleting,
    Deleted,
    Error,
    Unknown,
}

impl std::fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeStatus::Creating => write!(f, "creating"),
            VolumeStatus::Available => write!(f, "available"),
            VolumeStatus::InUse => write!(f, "in-use"),
            VolumeStatus::Deleting => write!(f, "deleting"),
            VolumeStatus::Deleted => write!(f, "deleted"),
            VolumeStatus::Error => write!(f, "error"),
            VolumeStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<&str> for VolumeStatus {
    fn from(value: &str) -> Self {
        match value {
            "creating" => VolumeStatus::Creating,
            "available" => VolumeStatus::Available,
            "in-use" => VolumeStatus::InUse,
            "deleting" => VolumeStatus::Deleting,
            "deleted" => VolumeStatus::Deleted,
            "error" => VolumeStatus::Error,
            _ => VolumeStatus::Unknown,
        }
    }
}

/// Subnet, used to resolve the availability zone for new volumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: Option<String>,
}
