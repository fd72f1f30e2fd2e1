//! One update operation per mutable attribute group

use super::{UpdateContext, UpdateOperation};
use crate::attribute::Attribute;
use crate::error::{ReconcileError, Result};
use crate::volume::{CommandContext, VolumeSnapshot, analyze};
use crate::waiter::cancellable;
use async_trait::async_trait;
use computeflow_cloud::NAME_TAG_KEY;
use std::collections::{HashMap, HashSet};

/// Write the display-name tag
pub struct NameOperation;

#[async_trait]
impl UpdateOperation for NameOperation {
    fn attribute(&self) -> Attribute {
        Attribute::Name
    }

    async fn execute(&self, ctx: &UpdateContext<'_>) -> Result<()> {
        let tags = HashMap::from([(NAME_TAG_KEY.to_string(), ctx.desired.name.clone())]);
        tracing::info!(instance_id = %ctx.current.id, name = %ctx.desired.name, "updating name tag");
        cancellable(ctx.cancel, ctx.api.create_tags(&ctx.current.id, &tags)).await
    }
}

/// Converge tags: write missing or changed values, delete undeclared keys
/// (never the display-name key)
pub struct TagsOperation;

#[async_trait]
impl UpdateOperation for TagsOperation {
    fn attribute(&self) -> Attribute {
        Attribute::Tags
    }

    async fn execute(&self, ctx: &UpdateContext<'_>) -> Result<()> {
        let current = &ctx.current;

        let to_write: HashMap<String, String> = ctx
            .desired
            .tags
            .iter()
            .filter(|(key, value)| current.tags.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut to_delete: Vec<String> = current
            .tags
            .keys()
            .filter(|key| key.as_str() != NAME_TAG_KEY && !ctx.desired.tags.contains_key(*key))
            .cloned()
            .collect();
        to_delete.sort();

        tracing::info!(
            instance_id = %current.id,
            write = to_write.len(),
            delete = to_delete.len(),
            "updating tags"
        );

        if !to_write.is_empty() {
            cancellable(ctx.cancel, ctx.api.create_tags(&current.id, &to_write)).await?;
        }
        if !to_delete.is_empty() {
            cancellable(ctx.cancel, ctx.api.delete_tags(&current.id, &to_delete)).await?;
        }
        Ok(())
    }
}

/// Replace the instance's security-group set after checking every group exists
pub struct SecurityGroupsOperation;

#[async_trait]
impl UpdateOperation for SecurityGroupsOperation {
    fn attribute(&self) -> Attribute {
        Attribute::SecurityGroups
    }

    async fn execute(&self, ctx: &UpdateContext<'_>) -> Result<()> {
        let desired = &ctx.desired.networking.security_group_ids;

        let found = cancellable(ctx.cancel, ctx.api.describe_security_groups(desired)).await?;
        let found: HashSet<&str> = found.iter().map(|sg| sg.id.as_str()).collect();
        let missing: Vec<String> = desired
            .iter()
            .filter(|id| !found.contains(id.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ReconcileError::SecurityGroupNotFound(missing));
        }

        tracing::info!(
            instance_id = %ctx.current.id,
            groups = %desired.join(","),
            "updating security groups"
        );
        cancellable(
            ctx.cancel,
            ctx.api
                .modify_instance_security_groups(&ctx.current.id, desired),
        )
        .await
    }
}

/// Change the instance type inside a power cycle
pub struct InstanceTypeOperation;

#[async_trait]
impl UpdateOperation for InstanceTypeOperation {
    fn attribute(&self) -> Attribute {
        Attribute::InstanceType
    }

    async fn execute(&self, ctx: &UpdateContext<'_>) -> Result<()> {
        let instance_id = ctx.current.id.as_str();
        let instance_type = ctx.desired.instance_type.as_str();
        tracing::info!(
            instance_id,
            from = %ctx.current.instance_type,
            to = instance_type,
            "updating instance type"
        );

        ctx.power_cycle()
            .run(
                instance_id,
                cancellable(
                    ctx.cancel,
                    ctx.api.modify_instance_type(instance_id, instance_type),
                ),
            )
            .await
    }
}

/// Run the analyzer's command batch inside a power cycle
pub struct VolumesOperation;

#[async_trait]
impl UpdateOperation for VolumesOperation {
    fn attribute(&self) -> Attribute {
        Attribute::Volumes
    }

    async fn execute(&self, ctx: &UpdateContext<'_>) -> Result<()> {
        let instance_id = ctx.current.id.as_str();

        let volumes = cancellable(ctx.cancel, ctx.api.describe_volumes(instance_id)).await?;
        let snapshot = VolumeSnapshot::from_attached(instance_id, &volumes);
        let commands = analyze(&ctx.current, &snapshot, ctx.desired);

        if commands.is_empty() {
            tracing::info!(instance_id, "volumes already converged");
            return Ok(());
        }
        for command in &commands {
            command.validate()?;
        }

        tracing::info!(instance_id, commands = commands.len(), "updating volumes");
        let command_ctx = CommandContext {
            api: ctx.api,
            wait: &ctx.settings.wait,
            cancel: ctx.cancel,
        };

        ctx.power_cycle()
            .run(instance_id, async {
                for command in &commands {
                    tracing::info!(instance_id, "{}", command);
                    command.run(&command_ctx).await?;
                }
                Ok::<_, ReconcileError>(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeCompute, attached_volume, desired, running_instance};
    use crate::settings::{ReconcileSettings, WaitConfig};
    use computeflow_cloud::{ComputeApi, DesiredConfig, InstanceState, StorageSpec};
    use tokio_util::sync::CancellationToken;

    fn settings() -> ReconcileSettings {
        ReconcileSettings {
            wait: WaitConfig {
                initial_delay_ms: 1,
                max_delay_ms: 2,
                multiplier: 2.0,
                timeout_ms: 2000,
            },
            ..ReconcileSettings::default()
        }
    }

    async fn context<'a>(
        api: &'a FakeCompute,
        desired: &'a DesiredConfig,
        settings: &'a ReconcileSettings,
        cancel: &'a CancellationToken,
    ) -> UpdateContext<'a> {
        let current = api.describe_instance("i-1").await.unwrap().unwrap();
        UpdateContext {
            current,
            desired,
            api,
            settings,
            cancel,
        }
    }

    #[tokio::test]
    async fn test_tags_writes_changed_and_deletes_extra_but_keeps_name() {
        let mut instance = running_instance("i-1");
        instance.tags.insert("owner".to_string(), "ops".to_string());
        let api = FakeCompute::new().with_instance(instance);
        let mut desired = desired();
        desired.tags = HashMap::from([
            ("env".to_string(), "prod".to_string()),
            ("team".to_string(), "core".to_string()),
        ]);
        let (settings, cancel) = (settings(), CancellationToken::new());
        let ctx = context(&api, &desired, &settings, &cancel).await;

        TagsOperation.execute(&ctx).await.unwrap();

        assert_eq!(
            api.mutations(),
            vec!["create_tags:env=prod,team=core", "delete_tags:owner"]
        );
        let tags = api.instance("i-1").unwrap().tags;
        assert_eq!(tags.get("Name").map(String::as_str), Some("web-01"));
        assert!(!tags.contains_key("owner"));
    }

    #[tokio::test]
    async fn test_name_writes_display_tag() {
        let api = FakeCompute::new().with_instance(running_instance("i-1"));
        let mut desired = desired();
        desired.name = "web-02".to_string();
        let (settings, cancel) = (settings(), CancellationToken::new());
        let ctx = context(&api, &desired, &settings, &cancel).await;

        NameOperation.execute(&ctx).await.unwrap();
        assert_eq!(api.instance("i-1").unwrap().name(), Some("web-02"));
    }

    #[tokio::test]
    async fn test_security_groups_missing_group_rejected() {
        let api = FakeCompute::new().with_instance(running_instance("i-1"));
        let mut desired = desired();
        desired.networking.security_group_ids = vec!["sg-2".to_string(), "sg-404".to_string()];
        let (settings, cancel) = (settings(), CancellationToken::new());
        let ctx = context(&api, &desired, &settings, &cancel).await;

        let err = SecurityGroupsOperation.execute(&ctx).await.unwrap_err();
        assert!(
            matches!(err, ReconcileError::SecurityGroupNotFound(ref ids) if ids == &vec!["sg-404".to_string()])
        );
        assert!(api.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_security_groups_replaced() {
        let api = FakeCompute::new().with_instance(running_instance("i-1"));
        let mut desired = desired();
        desired.networking.security_group_ids = vec!["sg-1".to_string(), "sg-2".to_string()];
        let (settings, cancel) = (settings(), CancellationToken::new());
        let ctx = context(&api, &desired, &settings, &cancel).await;

        SecurityGroupsOperation.execute(&ctx).await.unwrap();
        assert_eq!(
            api.mutations(),
            vec!["modify_instance_security_groups:i-1=sg-1,sg-2"]
        );
    }

    #[tokio::test]
    async fn test_instance_type_power_cycles() {
        let api = FakeCompute::new().with_instance(running_instance("i-1"));
        let mut desired = desired();
        desired.instance_type = "t3.large".to_string();
        let (settings, cancel) = (settings(), CancellationToken::new());
        let ctx = context(&api, &desired, &settings, &cancel).await;

        InstanceTypeOperation.execute(&ctx).await.unwrap();

        assert_eq!(
            api.mutations(),
            vec![
                "stop_instance:i-1",
                "modify_instance_type:i-1=t3.large",
                "start_instance:i-1",
            ]
        );
        let instance = api.instance("i-1").unwrap();
        assert_eq!(instance.instance_type, "t3.large");
        assert_eq!(instance.state, InstanceState::Pending);
    }

    #[tokio::test]
    async fn test_volumes_batch_runs_inside_power_cycle() {
        let api = FakeCompute::new()
            .with_instance(running_instance("i-1"))
            .with_volume(attached_volume("vol-a", "i-1", "/dev/xvda", "gp3", 8))
            .with_volume(attached_volume("vol-b", "i-1", "/dev/sdb", "gp2", 20))
            .with_volume(attached_volume("vol-c", "i-1", "/dev/sdc", "gp3", 10));
        let mut desired = desired();
        desired.storage = vec![
            StorageSpec::new("/dev/xvda", "gp3", 8),
            StorageSpec::new("/dev/sdb", "gp3", 30),
            StorageSpec::new("/dev/sdd", "gp3", 5),
        ];
        let (settings, cancel) = (settings(), CancellationToken::new());
        let ctx = context(&api, &desired, &settings, &cancel).await;

        VolumesOperation.execute(&ctx).await.unwrap();

        let mutations = api.mutations();
        assert_eq!(mutations.first().unwrap(), "stop_instance:i-1");
        assert_eq!(mutations[1], "modify_volume_size:vol-b=30");
        assert_eq!(mutations[2], "modify_volume_type:vol-b=gp3");
        assert_eq!(mutations[3], "create_volume:gp3:5@ap-northeast-1a");
        assert!(mutations[4].starts_with("attach_volume:"));
        assert_eq!(mutations[5], "detach_volume:vol-c@/dev/sdc");
        assert_eq!(mutations.last().unwrap(), "start_instance:i-1");
        assert_eq!(mutations.len(), 7);
    }

    #[tokio::test]
    async fn test_volumes_converged_skips_power_cycle() {
        let api = FakeCompute::new()
            .with_instance(running_instance("i-1"))
            .with_volume(attached_volume("vol-a", "i-1", "/dev/xvda", "gp3", 8));
        let desired = desired();
        let (settings, cancel) = (settings(), CancellationToken::new());
        let ctx = context(&api, &desired, &settings, &cancel).await;

        VolumesOperation.execute(&ctx).await.unwrap();
        assert!(api.mutations().is_empty());
    }
}
