//! Compute provider trait definition

use crate::desired::DesiredConfig;
use crate::error::Result;
use crate::model::{Instance, SecurityGroup, Subnet, Volume};
use async_trait::async_trait;
use std::collections::HashMap;

/// Compute provider abstraction trait
///
/// Every call is a single request against the provider. Implementations hold
/// no per-reconciliation state, so one handle can be shared by all comparators
/// and update operations of a pass.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Returns the provider name (e.g., "aws-ec2")
    fn name(&self) -> &str;

    /// Describe an instance by id. `Ok(None)` when it does not exist.
    async fn describe_instance(&self, instance_id: &str) -> Result<Option<Instance>>;

    /// Find a live instance by the value of its display-name tag
    async fn describe_instance_by_tag(&self, name: &str) -> Result<Option<Instance>>;

    /// Volumes attached to the given instance
    async fn describe_volumes(&self, instance_id: &str) -> Result<Vec<Volume>>;

    /// Describe a single volume. `Ok(None)` when it does not exist.
    async fn describe_volume(&self, volume_id: &str) -> Result<Option<Volume>>;

    /// Describe a subnet. Fails with `ResourceNotFound` when it does not exist.
    async fn describe_subnet(&self, subnet_id: &str) -> Result<Subnet>;

    /// Describe security groups; unknown ids are simply absent from the result
    async fn describe_security_groups(&self, group_ids: &[String]) -> Result<Vec<SecurityGroup>>;

    /// Launch a new instance from the desired configuration
    async fn create_instance(&self, desired: &DesiredConfig) -> Result<Instance>;

    async fn terminate_instance(&self, instance_id: &str) -> Result<()>;

    async fn stop_instance(&self, instance_id: &str) -> Result<()>;

    async fn start_instance(&self, instance_id: &str) -> Result<()>;

    async fn modify_instance_type(&self, instance_id: &str, instance_type: &str) -> Result<()>;

    /// Replace the instance's security group set
    async fn modify_instance_security_groups(
        &self,
        instance_id: &str,
        group_ids: &[String],
    ) -> Result<()>;

    /// Create or overwrite tags
    async fn create_tags(&self, instance_id: &str, tags: &HashMap<String, String>) -> Result<()>;

    /// Delete tags by key
    async fn delete_tags(&self, instance_id: &str, keys: &[String]) -> Result<()>;

    async fn create_volume(
        &self,
        kind: &str,
        size: i32,
        availability_zone: &str,
    ) -> Result<Volume>;

    async fn attach_volume(&self, volume_id: &str, instance_id: &str, device: &str)
    -> Result<()>;

    async fn detach_volume(&self, volume_id: &str, instance_id: &str, device: &str)
    -> Result<()>;

    async fn modify_volume_size(&self, volume_id: &str, size: i32) -> Result<()>;

    async fn modify_volume_type(&self, volume_id: &str, kind: &str) -> Result<()>;
}
