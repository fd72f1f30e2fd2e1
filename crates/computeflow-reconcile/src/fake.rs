//! In-memory `ComputeApi` used by unit tests

use async_trait::async_trait;
use computeflow_cloud::{
    CloudError, ComputeApi, DesiredConfig, Instance, InstanceState, NetworkingSpec, Result,
    SecurityGroup, StorageSpec, Subnet, Volume, VolumeAttachment, VolumeStatus,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Describe calls that still report `pending` after a start
const BOOT_POLLS: u32 = 2;

#[derive(Default)]
struct FakeState {
    instances: HashMap<String, Instance>,
    volumes: Vec<Volume>,
    subnets: HashMap<String, Subnet>,
    security_groups: HashSet<String>,
    calls: Vec<String>,
    failures: HashSet<String>,
    stop_polls: u32,
    pending_stop: HashMap<String, u32>,
    pending_boot: HashMap<String, u32>,
    next_id: u32,
}

pub(crate) struct FakeCompute {
    state: Mutex<FakeState>,
}

impl FakeCompute {
    pub fn new() -> Self {
        let mut state = FakeState::default();
        state.subnets.insert(
            "subnet-1".to_string(),
            Subnet {
                id: "subnet-1".to_string(),
                availability_zone: "ap-northeast-1a".to_string(),
            },
        );
        state.security_groups.insert("sg-1".to_string());
        state.security_groups.insert("sg-2".to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_instance(self, instance: Instance) -> Self {
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(instance.id.clone(), instance);
        self
    }

    pub fn with_volume(self, volume: Volume) -> Self {
        self.state.lock().unwrap().volumes.push(volume);
        self
    }

    /// Make every call named `op` fail with an API error
    pub fn fail_on(self, op: &str) -> Self {
        self.state.lock().unwrap().failures.insert(op.to_string());
        self
    }

    /// Number of describe calls after a stop until `stopped` is reported
    pub fn stop_after_polls(self, polls: u32) -> Self {
        self.state.lock().unwrap().stop_polls = polls;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change provider state, in order
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("describe"))
            .collect()
    }

    pub fn instance(&self, id: &str) -> Option<Instance> {
        self.state.lock().unwrap().instances.get(id).cloned()
    }

    pub fn volumes(&self) -> Vec<Volume> {
        self.state.lock().unwrap().volumes.clone()
    }

    fn record(&self, state: &mut FakeState, op: &str, detail: String) -> Result<()> {
        state.calls.push(if detail.is_empty() {
            op.to_string()
        } else {
            format!("{}:{}", op, detail)
        });
        if state.failures.contains(op) {
            return Err(CloudError::ApiError(format!("{} rejected", op)));
        }
        Ok(())
    }
}

fn instance_mut<'a>(state: &'a mut FakeState, id: &str) -> Result<&'a mut Instance> {
    state
        .instances
        .get_mut(id)
        .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))
}

fn volume_mut<'a>(state: &'a mut FakeState, id: &str) -> Result<&'a mut Volume> {
    state
        .volumes
        .iter_mut()
        .find(|v| v.id == id)
        .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))
}

#[async_trait]
impl ComputeApi for FakeCompute {
    fn name(&self) -> &str {
        "fake"
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Option<Instance>> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "describe_instance", instance_id.to_string())?;

        if let Some(remaining) = state.pending_stop.get_mut(instance_id) {
            if *remaining == 0 {
                state.pending_stop.remove(instance_id);
                if let Some(instance) = state.instances.get_mut(instance_id) {
                    instance.state = InstanceState::Stopped;
                }
            } else {
                *remaining -= 1;
            }
        }

        if let Some(remaining) = state.pending_boot.get_mut(instance_id) {
            if *remaining == 0 {
                state.pending_boot.remove(instance_id);
                if let Some(instance) = state.instances.get_mut(instance_id) {
                    instance.state = InstanceState::Running;
                }
            } else {
                *remaining -= 1;
            }
        }

        Ok(state.instances.get(instance_id).cloned())
    }

    async fn describe_instance_by_tag(&self, name: &str) -> Result<Option<Instance>> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "describe_instance_by_tag", name.to_string())?;
        Ok(state
            .instances
            .values()
            .find(|i| i.name() == Some(name) && i.state != InstanceState::Terminated)
            .cloned())
    }

    async fn describe_volumes(&self, instance_id: &str) -> Result<Vec<Volume>> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "describe_volumes", instance_id.to_string())?;
        Ok(state
            .volumes
            .iter()
            .filter(|v| {
                v.attachment
                    .as_ref()
                    .is_some_and(|a| a.instance_id == instance_id)
            })
            .cloned()
            .collect())
    }

    async fn describe_volume(&self, volume_id: &str) -> Result<Option<Volume>> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "describe_volume", volume_id.to_string())?;
        let Some(volume) = state.volumes.iter_mut().find(|v| v.id == volume_id) else {
            return Ok(None);
        };
        let snapshot = volume.clone();
        if volume.status == VolumeStatus::Creating {
            volume.status = VolumeStatus::Available;
        }
        Ok(Some(snapshot))
    }

    async fn describe_subnet(&self, subnet_id: &str) -> Result<Subnet> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "describe_subnet", subnet_id.to_string())?;
        state
            .subnets
            .get(subnet_id)
            .cloned()
            .ok_or_else(|| CloudError::ResourceNotFound(subnet_id.to_string()))
    }

    async fn describe_security_groups(&self, group_ids: &[String]) -> Result<Vec<SecurityGroup>> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "describe_security_groups", group_ids.join(","))?;
        Ok(group_ids
            .iter()
            .filter(|id| state.security_groups.contains(*id))
            .map(|id| SecurityGroup {
                id: id.clone(),
                name: None,
            })
            .collect())
    }

    async fn create_instance(&self, desired: &DesiredConfig) -> Result<Instance> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "create_instance", desired.name.clone())?;
        state.next_id += 1;
        let instance = Instance {
            id: format!("i-new{}", state.next_id),
            state: InstanceState::Pending,
            image_id: desired.image_id.clone(),
            instance_type: desired.instance_type.clone(),
            tags: desired.launch_tags(),
            security_group_ids: desired.networking.security_group_ids.clone(),
            subnet_id: Some(desired.networking.subnet_id.clone()),
            launch_time: None,
        };
        for storage in &desired.storage {
            state.next_id += 1;
            let id = format!("vol-new{}", state.next_id);
            state.volumes.push(attached_volume(
                &id,
                &instance.id,
                &storage.device_name,
                &storage.kind,
                storage.size,
            ));
        }
        state
            .pending_boot
            .insert(instance.id.clone(), BOOT_POLLS);
        state.instances.insert(instance.id.clone(), instance.clone());
        Ok(instance)
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "terminate_instance", instance_id.to_string())?;
        instance_mut(&mut state, instance_id)?.state = InstanceState::ShuttingDown;
        Ok(())
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "stop_instance", instance_id.to_string())?;
        let polls = state.stop_polls;
        let instance = instance_mut(&mut state, instance_id)?;
        if instance.state == InstanceState::Pending {
            return Err(CloudError::ApiError(format!(
                "IncorrectInstanceState: {} is pending",
                instance_id
            )));
        }
        if polls == 0 {
            instance.state = InstanceState::Stopped;
        } else {
            instance.state = InstanceState::Stopping;
            state.pending_stop.insert(instance_id.to_string(), polls - 1);
        }
        Ok(())
    }

    async fn start_instance(&self, instance_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "start_instance", instance_id.to_string())?;
        instance_mut(&mut state, instance_id)?.state = InstanceState::Pending;
        state
            .pending_boot
            .insert(instance_id.to_string(), BOOT_POLLS);
        Ok(())
    }

    async fn modify_instance_type(&self, instance_id: &str, instance_type: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(
            &mut state,
            "modify_instance_type",
            format!("{}={}", instance_id, instance_type),
        )?;
        let instance = instance_mut(&mut state, instance_id)?;
        if instance.state != InstanceState::Stopped {
            return Err(CloudError::ApiError(format!(
                "IncorrectInstanceState: {} is {}",
                instance_id, instance.state
            )));
        }
        instance.instance_type = instance_type.to_string();
        Ok(())
    }

    async fn modify_instance_security_groups(
        &self,
        instance_id: &str,
        group_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(
            &mut state,
            "modify_instance_security_groups",
            format!("{}={}", instance_id, group_ids.join(",")),
        )?;
        instance_mut(&mut state, instance_id)?.security_group_ids = group_ids.to_vec();
        Ok(())
    }

    async fn create_tags(&self, instance_id: &str, tags: &HashMap<String, String>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut keys: Vec<&String> = tags.keys().collect();
        keys.sort();
        let detail = keys
            .iter()
            .map(|k| format!("{}={}", k, tags[*k]))
            .collect::<Vec<_>>()
            .join(",");
        self.record(&mut state, "create_tags", detail)?;
        let instance = instance_mut(&mut state, instance_id)?;
        for (key, value) in tags {
            instance.tags.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete_tags(&self, instance_id: &str, keys: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut sorted = keys.to_vec();
        sorted.sort();
        self.record(&mut state, "delete_tags", sorted.join(","))?;
        let instance = instance_mut(&mut state, instance_id)?;
        for key in keys {
            instance.tags.remove(key);
        }
        Ok(())
    }

    async fn create_volume(
        &self,
        kind: &str,
        size: i32,
        availability_zone: &str,
    ) -> Result<Volume> {
        let mut state = self.state.lock().unwrap();
        self.record(
            &mut state,
            "create_volume",
            format!("{}:{}@{}", kind, size, availability_zone),
        )?;
        state.next_id += 1;
        let volume = Volume {
            id: format!("vol-new{}", state.next_id),
            kind: kind.to_string(),
            size,
            status: VolumeStatus::Creating,
            attachment: None,
        };
        state.volumes.push(volume.clone());
        Ok(volume)
    }

    async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
        device: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "attach_volume", format!("{}@{}", volume_id, device))?;
        let volume = volume_mut(&mut state, volume_id)?;
        if volume.status != VolumeStatus::Available {
            return Err(CloudError::ApiError(format!(
                "IncorrectState: {} is {}",
                volume_id, volume.status
            )));
        }
        volume.status = VolumeStatus::InUse;
        volume.attachment = Some(VolumeAttachment {
            instance_id: instance_id.to_string(),
            device: device.to_string(),
        });
        Ok(())
    }

    async fn detach_volume(
        &self,
        volume_id: &str,
        _instance_id: &str,
        device: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "detach_volume", format!("{}@{}", volume_id, device))?;
        let volume = volume_mut(&mut state, volume_id)?;
        volume.status = VolumeStatus::Available;
        volume.attachment = None;
        Ok(())
    }

    async fn modify_volume_size(&self, volume_id: &str, size: i32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "modify_volume_size", format!("{}={}", volume_id, size))?;
        volume_mut(&mut state, volume_id)?.size = size;
        Ok(())
    }

    async fn modify_volume_type(&self, volume_id: &str, kind: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "modify_volume_type", format!("{}={}", volume_id, kind))?;
        volume_mut(&mut state, volume_id)?.kind = kind.to_string();
        Ok(())
    }
}

pub(crate) fn running_instance(id: &str) -> Instance {
    Instance {
        id: id.to_string(),
        state: InstanceState::Running,
        image_id: "ami-0123".to_string(),
        instance_type: "t3.micro".to_string(),
        tags: HashMap::from([
            ("Name".to_string(), "web-01".to_string()),
            ("env".to_string(), "dev".to_string()),
        ]),
        security_group_ids: vec!["sg-1".to_string()],
        subnet_id: Some("subnet-1".to_string()),
        launch_time: None,
    }
}

pub(crate) fn attached_volume(
    id: &str,
    instance_id: &str,
    device: &str,
    kind: &str,
    size: i32,
) -> Volume {
    Volume {
        id: id.to_string(),
        kind: kind.to_string(),
        size,
        status: VolumeStatus::InUse,
        attachment: Some(VolumeAttachment {
            instance_id: instance_id.to_string(),
            device: device.to_string(),
        }),
    }
}

/// Desired config that matches `running_instance` with one root volume
pub(crate) fn desired() -> DesiredConfig {
    DesiredConfig {
        name: "web-01".to_string(),
        image_id: "ami-0123".to_string(),
        instance_type: "t3.micro".to_string(),
        tags: HashMap::from([("env".to_string(), "dev".to_string())]),
        networking: NetworkingSpec {
            subnet_id: "subnet-1".to_string(),
            security_group_ids: vec!["sg-1".to_string()],
        },
        storage: vec![StorageSpec::new("/dev/xvda", "gp3", 8)],
    }
}
