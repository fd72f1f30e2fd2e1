//! SDK type → model conversions

use crate::error::{AwsError, Result};
use aws_sdk_ec2::types;
use chrono::{DateTime, Utc};
use computeflow_cloud::{Instance, InstanceState, Volume, VolumeAttachment, VolumeStatus};
use std::collections::HashMap;

pub(crate) fn instance(raw: &types::Instance) -> Result<Instance> {
    let id = raw.instance_id().ok_or(AwsError::MissingField("InstanceId"))?;

    let state = raw
        .state()
        .and_then(|s| s.name())
        .map(|name| InstanceState::from(name.as_str()))
        .unwrap_or(InstanceState::Unknown);

    let tags: HashMap<String, String> = raw
        .tags()
        .iter()
        .filter_map(|tag| Some((tag.key()?.to_string(), tag.value().unwrap_or_default().to_string())))
        .collect();

    let security_group_ids = raw
        .security_groups()
        .iter()
        .filter_map(|group| group.group_id().map(str::to_string))
        .collect();

    let launch_time = raw
        .launch_time()
        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()));

    Ok(Instance {
        id: id.to_string(),
        state,
        image_id: raw.image_id().unwrap_or_default().to_string(),
        instance_type: raw
            .instance_type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        tags,
        security_group_ids,
        subnet_id: raw.subnet_id().map(str::to_string),
        launch_time,
    })
}

pub(crate) fn volume(raw: &types::Volume) -> Result<Volume> {
    let id = raw.volume_id().ok_or(AwsError::MissingField("VolumeId"))?;

    let attachment = raw.attachments().iter().find_map(|a| {
        Some(VolumeAttachment {
            instance_id: a.instance_id()?.to_string(),
            device: a.device()?.to_string(),
        })
    });

    Ok(Volume {
        id: id.to_string(),
        kind: raw
            .volume_type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        size: raw.size().unwrap_or_default(),
        status: raw
            .state()
            .map(|s| VolumeStatus::from(s.as_str()))
            .unwrap_or(VolumeStatus::Unknown),
        attachment,
    })
}

/// EC2 error codes for missing resources end in `.NotFound`
pub(crate) fn is_not_found_code(code: Option<&str>) -> bool {
    code.is_some_and(|c| c.ends_with(".NotFound"))
}
