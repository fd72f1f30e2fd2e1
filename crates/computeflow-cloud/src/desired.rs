//! Desired state supplied by the user

use crate::error::{CloudError, Result};
use crate::model::NAME_TAG_KEY;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Target specification for a single compute instance and its attachments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredConfig {
    /// Display name, carried as the `Name` tag
    pub name: String,

    /// Machine image identifier
    #[serde(alias = "ami")]
    pub image_id: String,

    /// Instance type identifier
    pub instance_type: String,

    #[serde(default)]
    pub tags: HashMap<String, String>,

    pub networking: NetworkingSpec,

    /// Volumes in the order they should be reconciled
    #[serde(default)]
    pub storage: Vec<StorageSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkingSpec {
    pub subnet_id: String,

    #[serde(default)]
    pub security_group_ids: Vec<String>,
}

/// A volume the instance should have at `device_name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSpec {
    pub device_name: String,

    /// Disk kind (e.g. "gp3")
    pub kind: String,

    /// Size in GiB
    pub size: i32,
}

impl StorageSpec {
    pub fn new(device_name: impl Into<String>, kind: impl Into<String>, size: i32) -> Self {
        Self {
            device_name: device_name.into(),
            kind: kind.into(),
            size,
        }
    }
}

impl DesiredConfig {
    /// Tags to apply at launch time, including the display-name tag
    pub fn launch_tags(&self) -> HashMap<String, String> {
        let mut tags = self.tags.clone();
        tags.insert(NAME_TAG_KEY.to_string(), self.name.clone());
        tags
    }

    /// Reject configurations that cannot be applied
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("name", &self.name),
            ("image_id", &self.image_id),
            ("instance_type", &self.instance_type),
            ("networking.subnet_id", &self.networking.subnet_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CloudError::InvalidConfig(format!("{} must not be empty", field)));
            }
        }

        // name and tags both write the display-name tag; they must agree
        if let Some(tagged) = self.tags.get(NAME_TAG_KEY) {
            if tagged != &self.name {
                return Err(CloudError::InvalidConfig(format!(
                    "tags.{} ({}) conflicts with name ({})",
                    NAME_TAG_KEY, tagged, self.name
                )));
            }
        }

        let mut devices = HashSet::new();
        for storage in &self.storage {
            if storage.device_name.trim().is_empty() {
                return Err(CloudError::InvalidConfig(
                    "storage.device_name must not be empty".to_string(),
                ));
            }
            if storage.size <= 0 {
                return Err(CloudError::InvalidConfig(format!(
                    "storage {}: size must be positive (got {})",
                    storage.device_name, storage.size
                )));
            }
            if !devices.insert(storage.device_name.as_str()) {
                return Err(CloudError::InvalidConfig(format!(
                    "storage {}: device name declared more than once",
                    storage.device_name
                )));
            }
        }

        Ok(())
    }
}
