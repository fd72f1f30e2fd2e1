//! EC2 compute provider

use crate::convert;
use crate::error::AwsError;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{
    AttributeValue, BlockDeviceMapping, EbsBlockDevice, Filter, InstanceType, ResourceType, Tag,
    TagSpecification, VolumeType,
};
use computeflow_cloud::{
    CloudError, ComputeApi, DesiredConfig, Instance, NAME_TAG_KEY, Result, SecurityGroup, Subnet,
    Volume,
};
use std::collections::HashMap;

/// Map an SDK failure, keeping EC2's `*.NotFound` codes distinguishable
fn sdk_error<E, R>(operation: &'static str, resource: &str, err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    if convert::is_not_found_code(err.code()) {
        return AwsError::NotFound(resource.to_string()).into();
    }
    AwsError::Sdk {
        operation,
        message: DisplayErrorContext(&err).to_string(),
    }
    .into()
}

fn tag(key: &str, value: &str) -> Tag {
    Tag::builder().key(key).value(value).build()
}

pub struct Ec2ComputeApi {
    client: Client,
    region: String,
}

impl Ec2ComputeApi {
    /// Build a client for `region` from the default credential chain
    pub async fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;
        Self::from_client(Client::new(&config), region)
    }

    pub fn from_client(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn first_instance(
        &self,
        filters: Vec<Filter>,
        ids: Vec<String>,
        resource: &str,
    ) -> Result<Option<Instance>> {
        let output = self
            .client
            .describe_instances()
            .set_instance_ids((!ids.is_empty()).then_some(ids))
            .set_filters((!filters.is_empty()).then_some(filters))
            .send()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) if convert::is_not_found_code(e.code()) => return Ok(None),
            Err(e) => return Err(sdk_error("DescribeInstances", resource, e)),
        };

        let raw = output
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .next();
        raw.map(convert::instance).transpose().map_err(CloudError::from)
    }
}

#[async_trait]
impl ComputeApi for Ec2ComputeApi {
    fn name(&self) -> &str {
        "aws-ec2"
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Option<Instance>> {
        tracing::debug!(instance_id, "DescribeInstances");
        self.first_instance(Vec::new(), vec![instance_id.to_string()], instance_id)
            .await
    }

    async fn describe_instance_by_tag(&self, name: &str) -> Result<Option<Instance>> {
        tracing::debug!(name, "DescribeInstances by name tag");
        let filters = vec![
            Filter::builder()
                .name(format!("tag:{}", NAME_TAG_KEY))
                .values(name)
                .build(),
            Filter::builder()
                .name("instance-state-name")
                .values("pending")
                .values("running")
                .values("stopping")
                .values("stopped")
                .build(),
        ];
        self.first_instance(filters, Vec::new(), name).await
    }

    async fn describe_volumes(&self, instance_id: &str) -> Result<Vec<Volume>> {
        tracing::debug!(instance_id, "DescribeVolumes");
        let output = self
            .client
            .describe_volumes()
            .filters(
                Filter::builder()
                    .name("attachment.instance-id")
                    .values(instance_id)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| sdk_error("DescribeVolumes", instance_id, e))?;

        output
            .volumes()
            .iter()
            .map(|v| convert::volume(v).map_err(CloudError::from))
            .collect()
    }

    async fn describe_volume(&self, volume_id: &str) -> Result<Option<Volume>> {
        tracing::debug!(volume_id, "DescribeVolumes");
        let output = match self
            .client
            .describe_volumes()
            .volume_ids(volume_id)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if convert::is_not_found_code(e.code()) => return Ok(None),
            Err(e) => return Err(sdk_error("DescribeVolumes", volume_id, e)),
        };

        output
            .volumes()
            .first()
            .map(convert::volume)
            .transpose()
            .map_err(CloudError::from)
    }

    async fn describe_subnet(&self, subnet_id: &str) -> Result<Subnet> {
        tracing::debug!(subnet_id, "DescribeSubnets");
        let output = self
            .client
            .describe_subnets()
            .subnet_ids(subnet_id)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeSubnets", subnet_id, e))?;

        let subnet = output
            .subnets()
            .first()
            .ok_or_else(|| CloudError::ResourceNotFound(subnet_id.to_string()))?;
        let availability_zone = subnet
            .availability_zone()
            .ok_or(AwsError::MissingField("AvailabilityZone"))?;

        Ok(Subnet {
            id: subnet_id.to_string(),
            availability_zone: availability_zone.to_string(),
        })
    }

    async fn describe_security_groups(&self, group_ids: &[String]) -> Result<Vec<SecurityGroup>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(groups = %group_ids.join(","), "DescribeSecurityGroups");
        // filter instead of GroupIds so unknown ids are simply absent
        let output = self
            .client
            .describe_security_groups()
            .filters(
                Filter::builder()
                    .name("group-id")
                    .set_values(Some(group_ids.to_vec()))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| sdk_error("DescribeSecurityGroups", &group_ids.join(","), e))?;

        Ok(output
            .security_groups()
            .iter()
            .filter_map(|sg| {
                Some(SecurityGroup {
                    id: sg.group_id()?.to_string(),
                    name: sg.group_name().map(str::to_string),
                })
            })
            .collect())
    }

    async fn create_instance(&self, desired: &DesiredConfig) -> Result<Instance> {
        tracing::info!(name = %desired.name, "RunInstances");

        let tags: Vec<Tag> = desired
            .launch_tags()
            .iter()
            .map(|(k, v)| tag(k, v))
            .collect();

        let mappings: Vec<BlockDeviceMapping> = desired
            .storage
            .iter()
            .map(|spec| {
                BlockDeviceMapping::builder()
                    .device_name(&spec.device_name)
                    .ebs(
                        EbsBlockDevice::builder()
                            .volume_size(spec.size)
                            .volume_type(VolumeType::from(spec.kind.as_str()))
                            .delete_on_termination(true)
                            .encrypted(true)
                            .build(),
                    )
                    .build()
            })
            .collect();

        let output = self
            .client
            .run_instances()
            .image_id(&desired.image_id)
            .instance_type(InstanceType::from(desired.instance_type.as_str()))
            .min_count(1)
            .max_count(1)
            .subnet_id(&desired.networking.subnet_id)
            .set_security_group_ids(Some(desired.networking.security_group_ids.clone()))
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Instance)
                    .set_tags(Some(tags))
                    .build(),
            )
            .set_block_device_mappings((!mappings.is_empty()).then_some(mappings))
            .send()
            .await
            .map_err(|e| sdk_error("RunInstances", &desired.name, e))?;

        let raw = output
            .instances()
            .first()
            .ok_or(AwsError::MissingField("Instances"))?;
        Ok(convert::instance(raw)?)
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        tracing::info!(instance_id, "TerminateInstances");
        self.client
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| sdk_error("TerminateInstances", instance_id, e))?;
        Ok(())
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<()> {
        tracing::debug!(instance_id, "StopInstances");
        self.client
            .stop_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| sdk_error("StopInstances", instance_id, e))?;
        Ok(())
    }

    async fn start_instance(&self, instance_id: &str) -> Result<()> {
        tracing::debug!(instance_id, "StartInstances");
        self.client
            .start_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| sdk_error("StartInstances", instance_id, e))?;
        Ok(())
    }

    async fn modify_instance_type(&self, instance_id: &str, instance_type: &str) -> Result<()> {
        tracing::debug!(instance_id, instance_type, "ModifyInstanceAttribute");
        self.client
            .modify_instance_attribute()
            .instance_id(instance_id)
            .instance_type(AttributeValue::builder().value(instance_type).build())
            .send()
            .await
            .map_err(|e| sdk_error("ModifyInstanceAttribute", instance_id, e))?;
        Ok(())
    }

    async fn modify_instance_security_groups(
        &self,
        instance_id: &str,
        group_ids: &[String],
    ) -> Result<()> {
        tracing::debug!(instance_id, groups = %group_ids.join(","), "ModifyInstanceAttribute");
        self.client
            .modify_instance_attribute()
            .instance_id(instance_id)
            .set_groups(Some(group_ids.to_vec()))
            .send()
            .await
            .map_err(|e| sdk_error("ModifyInstanceAttribute", instance_id, e))?;
        Ok(())
    }

    async fn create_tags(&self, instance_id: &str, tags: &HashMap<String, String>) -> Result<()> {
        tracing::debug!(instance_id, count = tags.len(), "CreateTags");
        self.client
            .create_tags()
            .resources(instance_id)
            .set_tags(Some(tags.iter().map(|(k, v)| tag(k, v)).collect()))
            .send()
            .await
            .map_err(|e| sdk_error("CreateTags", instance_id, e))?;
        Ok(())
    }

    async fn delete_tags(&self, instance_id: &str, keys: &[String]) -> Result<()> {
        tracing::debug!(instance_id, keys = %keys.join(","), "DeleteTags");
        self.client
            .delete_tags()
            .resources(instance_id)
            .set_tags(Some(
                keys.iter()
                    .map(|k| Tag::builder().key(k).build())
                    .collect(),
            ))
            .send()
            .await
            .map_err(|e| sdk_error("DeleteTags", instance_id, e))?;
        Ok(())
    }

    async fn create_volume(&self, kind: &str, size: i32, availability_zone: &str) -> Result<Volume> {
        tracing::debug!(kind, size, availability_zone, "CreateVolume");
        let output = self
            .client
            .create_volume()
            .volume_type(VolumeType::from(kind))
            .size(size)
            .availability_zone(availability_zone)
            .encrypted(true)
            .send()
            .await
            .map_err(|e| sdk_error("CreateVolume", availability_zone, e))?;

        let id = output
            .volume_id()
            .ok_or(AwsError::MissingField("VolumeId"))?;
        Ok(Volume {
            id: id.to_string(),
            kind: kind.to_string(),
            size: output.size().unwrap_or(size),
            status: output
                .state()
                .map(|s| s.as_str().into())
                .unwrap_or(computeflow_cloud::VolumeStatus::Creating),
            attachment: None,
        })
    }

    async fn attach_volume(&self, volume_id: &str, instance_id: &str, device: &str) -> Result<()> {
        tracing::debug!(volume_id, instance_id, device, "AttachVolume");
        self.client
            .attach_volume()
            .volume_id(volume_id)
            .instance_id(instance_id)
            .device(device)
            .send()
            .await
            .map_err(|e| sdk_error("AttachVolume", volume_id, e))?;
        Ok(())
    }

    async fn detach_volume(&self, volume_id: &str, instance_id: &str, device: &str) -> Result<()> {
        tracing::debug!(volume_id, instance_id, device, "DetachVolume");
        self.client
            .detach_volume()
            .volume_id(volume_id)
            .instance_id(instance_id)
            .device(device)
            .send()
            .await
            .map_err(|e| sdk_error("DetachVolume", volume_id, e))?;
        Ok(())
    }

    async fn modify_volume_size(&self, volume_id: &str, size: i32) -> Result<()> {
        tracing::debug!(volume_id, size, "ModifyVolume");
        self.client
            .modify_volume()
            .volume_id(volume_id)
            .size(size)
            .send()
            .await
            .map_err(|e| sdk_error("ModifyVolume", volume_id, e))?;
        Ok(())
    }

    async fn modify_volume_type(&self, volume_id: &str, kind: &str) -> Result<()> {
        tracing::debug!(volume_id, kind, "ModifyVolume");
        self.client
            .modify_volume()
            .volume_id(volume_id)
            .volume_type(VolumeType::from(kind))
            .send()
            .await
            .map_err(|e| sdk_error("ModifyVolume", volume_id, e))?;
        Ok(())
    }
}
