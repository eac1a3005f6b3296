//! Create, read, update and delete convergence for one server.

use crate::core::{
    domain::{
        config::ProvisionerConfig,
        error::{ProvisionError, ProvisionResult, ValidationError},
        model::{
            resource::{
                ConnectionInfo, DesiredServer, ObservedServer, Sizing, StorageDevice,
                TemplateState,
            },
            server::{
                CreateInterface, CreateServerRequest, CreateStorageDevice, LoginUser,
                ModifyServerRequest, PowerState, ServerDetails, StorageAction,
                WaitForServerStateRequest,
            },
            tracked::{TemplateIdentity, TrackedServer},
        },
        value_object::{Hostname, StorageSize, StorageTitle},
    },
    infrastructure::server_api::ServerApi,
};
use crate::server::application::service::{
    interface_translator::{primary_address, translate_interfaces},
    power_guard::PowerGuard,
    storage_reconciler::{StorageDelta, StorageReconciler},
    template_reconciler::{TemplateChanges, TemplateReconciler},
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

const TITLE_SUFFIX: &str = "(managed by upcloud_provisioner)";
const MAX_STORAGE_TITLE_CHARS: usize = 64;

/// Title given to a new server.
pub fn server_title(hostname: &Hostname) -> String {
    format!("{} {}", hostname, TITLE_SUFFIX)
}

fn default_boot_title(hostname: &Hostname) -> String {
    format!("{} boot disk", hostname)
        .chars()
        .take(MAX_STORAGE_TITLE_CHARS)
        .collect()
}

/// Builds the creation request. The boot template comes first, cloned
/// from `template_uuid`; additional devices follow and are attached.
pub fn build_create_request(
    desired: &DesiredServer,
    template_uuid: Option<&str>,
) -> CreateServerRequest {
    let (plan, core_number, memory_amount) = match desired.sizing() {
        Sizing::Plan(plan) => (Some(plan.to_string()), None, None),
        Sizing::Custom { cpu, mem } => (None, cpu, mem),
    };

    let mut storage_devices = Vec::with_capacity(desired.storage_devices.len() + 1);
    if let (Some(template), Some(uuid)) = (&desired.template, template_uuid) {
        storage_devices.push(CreateStorageDevice {
            action: StorageAction::Clone,
            storage: uuid.to_string(),
            title: Some(
                template
                    .title
                    .as_ref()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_else(|| default_boot_title(&desired.hostname)),
            ),
            size: template.size.map(|s| s.get()),
            address: template.address.clone(),
            device_type: None,
            backup_rule: template.backup_rule.clone(),
        });
    }
    storage_devices.extend(desired.storage_devices.iter().map(|device| CreateStorageDevice {
        action: StorageAction::Attach,
        storage: device.storage.clone(),
        title: None,
        size: None,
        address: Some(device.address.clone()),
        device_type: Some(device.device_type),
        backup_rule: None,
    }));

    let interfaces = desired
        .network_interfaces
        .iter()
        .map(|interface| CreateInterface {
            interface_type: interface.interface_type,
            network: interface.network.clone(),
            family: interface.ip_address_family,
            address: interface.ip_address.clone(),
            source_ip_filtering: interface.source_ip_filtering,
            bootable: interface.bootable,
        })
        .collect();

    let (login_user, password_delivery) = match &desired.login {
        Some(login) => (
            Some(LoginUser {
                username: login.user.clone(),
                ssh_keys: login.keys.clone(),
                create_password: login.create_password,
            }),
            Some(login.password_delivery),
        ),
        None => (None, None),
    };

    CreateServerRequest {
        zone: desired.zone.clone(),
        title: server_title(&desired.hostname),
        hostname: desired.hostname.to_string(),
        plan,
        core_number,
        memory_amount,
        firewall: desired.firewall,
        metadata: desired.metadata,
        user_data: desired.user_data.clone(),
        login_user,
        password_delivery,
        storage_devices,
        interfaces,
    }
}

/// UUID of the cloned boot disk in a creation response: the first device
/// that is not one of the requested additional storages.
pub fn boot_device_uuid(details: &ServerDetails, desired: &DesiredServer) -> Option<String> {
    let additional: BTreeSet<&str> = desired
        .storage_devices
        .iter()
        .map(|device| device.storage.as_str())
        .collect();
    details
        .storage_devices()
        .iter()
        .find(|device| !additional.contains(device.uuid.as_str()))
        .map(|device| device.uuid.clone())
}

/// Translates a server record into its observed snapshot.
///
/// The boot disk is recognized only by the tracked identity's UUID; every
/// other device is an additional storage device.
pub fn observe(details: &ServerDetails, template: Option<&TemplateIdentity>) -> ObservedServer {
    let mut boot = None;
    let mut storage_devices = BTreeSet::new();

    for device in details.storage_devices() {
        match template {
            Some(identity) if identity.id == device.uuid => {
                boot = Some(TemplateState {
                    id: device.uuid.clone(),
                    address: device.address.clone(),
                    size: StorageSize::new_unchecked(device.size),
                    title: StorageTitle::new_unchecked(device.title.clone()),
                    storage: identity.storage.clone(),
                    tier: device.tier.clone(),
                    backup_rule: identity.backup_rule.clone(),
                });
            }
            _ => {
                storage_devices.insert(StorageDevice {
                    storage: device.uuid.clone(),
                    address: device.address.clone(),
                    device_type: device.device_type,
                });
            }
        }
    }

    let interfaces = details.interfaces();
    ObservedServer {
        id: details.uuid.clone(),
        hostname: Hostname::new_unchecked(details.hostname.clone()),
        title: details.title.clone(),
        zone: details.zone.clone(),
        cpu: details.core_number,
        mem: details.memory_amount,
        plan: details.plan.clone(),
        firewall: details.firewall,
        metadata: details.metadata,
        network_interfaces: translate_interfaces(interfaces),
        storage_devices,
        template: boot,
        connection: ConnectionInfo::ssh(primary_address(interfaces).unwrap_or_default()),
    }
}

/// Remote actions of one update, computed up front.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub modify: ModifyServerRequest,
    pub template: Option<TemplateChanges>,
    pub storage: StorageDelta,
}

impl UpdatePlan {
    /// Scalars are always sent; a set plan suppresses cpu and mem.
    pub fn compute(
        uuid: &str,
        desired: &DesiredServer,
        observed: &ObservedServer,
        template: Option<&TemplateIdentity>,
    ) -> Self {
        let (plan, core_number, memory_amount) = match desired.sizing() {
            Sizing::Plan(plan) => (Some(plan.to_string()), None, None),
            Sizing::Custom { cpu, mem } => (None, cpu, mem),
        };

        let modify = ModifyServerRequest {
            uuid: uuid.to_string(),
            hostname: Some(desired.hostname.to_string()),
            firewall: Some(desired.firewall),
            metadata: Some(desired.metadata),
            plan,
            core_number,
            memory_amount,
        };

        let template = match (template, &desired.template) {
            (Some(identity), Some(config)) => {
                Some(TemplateChanges::compute(identity, observed.template.as_ref(), config))
                    .filter(|changes| !changes.is_empty())
            }
            _ => None,
        };

        Self {
            modify,
            template,
            storage: StorageDelta::compute(&observed.storage_devices, &desired.storage_devices),
        }
    }
}

/// Server lifecycle reconciler.
///
/// Holds no per-server state; everything tracked between calls lives in the
/// caller's `TrackedServer`. Remote calls of one operation run strictly in
/// sequence and are never retried here.
#[derive(Clone)]
pub struct ServerLifecycle {
    api: Arc<dyn ServerApi>,
    config: ProvisionerConfig,
}

impl ServerLifecycle {
    pub fn new(api: Arc<dyn ServerApi>, config: ProvisionerConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Creates the server and waits until it runs.
    ///
    /// The id (and boot disk identity) is recorded in `tracked` right after
    /// the create call, so a later failure such as a timeout still leaves a
    /// resource that can be read, updated or deleted.
    pub async fn create(
        &self,
        desired: &DesiredServer,
        tracked: &mut TrackedServer,
    ) -> ProvisionResult<ObservedServer> {
        desired.validate()?;
        if let Some(id) = tracked.id() {
            return Err(ValidationError::ConstraintViolation(format!(
                "Server {} already exists",
                id
            ))
            .into());
        }

        let api = self.api.as_ref();
        let template_uuid = match &desired.template {
            Some(template) => Some(
                TemplateReconciler::new(api)
                    .resolve_source(&template.storage)
                    .await?,
            ),
            None => None,
        };

        let request = build_create_request(desired, template_uuid.as_deref());
        let details = api.create_server(&request).await?;
        let uuid = details.uuid.clone();

        tracked.id = Some(uuid.clone());
        tracked.observed = None;
        if let Some(template) = &desired.template {
            let boot = boot_device_uuid(&details, desired).ok_or_else(|| {
                ProvisionError::NotFound(format!(
                    "Boot storage of server {} missing from creation response",
                    uuid
                ))
            })?;
            tracked.template = Some(TemplateIdentity {
                id: boot,
                storage: template.storage.clone(),
                backup_rule: template.backup_rule.clone(),
            });
        }

        api.wait_for_server_state(&WaitForServerStateRequest {
            uuid: uuid.clone(),
            desired_state: PowerState::Started,
            timeout: self.config.create_timeout,
        })
        .await?;

        let observed = self.read(&uuid, tracked.template.as_ref()).await?;
        tracked.observed = Some(observed.clone());
        Ok(observed)
    }

    /// Reads the server. Fails with `ProvisionError::NotFound` when it is
    /// gone.
    pub async fn read(
        &self,
        uuid: &str,
        template: Option<&TemplateIdentity>,
    ) -> ProvisionResult<ObservedServer> {
        let details = self.api.get_server_details(uuid).await?;
        Ok(observe(&details, template))
    }

    /// Re-reads a tracked server.
    ///
    /// A server that no longer exists is dropped from `tracked` and
    /// `Ok(None)` is returned.
    pub async fn refresh(
        &self,
        tracked: &mut TrackedServer,
    ) -> ProvisionResult<Option<ObservedServer>> {
        let Some(uuid) = tracked.id.clone() else {
            return Ok(None);
        };

        match self.read(&uuid, tracked.template.as_ref()).await {
            Ok(observed) => {
                tracked.observed = Some(observed.clone());
                Ok(Some(observed))
            }
            Err(e) if e.is_not_found() => {
                warn!(uuid = %uuid, "Server no longer exists, dropping it");
                tracked.clear();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Converges a running server to `desired`.
    ///
    /// The server is stopped, modified and started again. On failure
    /// `tracked` is left as last read and the server may be left stopped.
    pub async fn update(
        &self,
        desired: &DesiredServer,
        tracked: &mut TrackedServer,
    ) -> ProvisionResult<ObservedServer> {
        desired.validate()?;
        let uuid = Self::require_id(tracked)?;

        let observed = match &tracked.observed {
            Some(observed) => observed.clone(),
            None => self.read(&uuid, tracked.template.as_ref()).await?,
        };

        let reasons = desired.replacement_reasons(&observed);
        if !reasons.is_empty() {
            return Err(ValidationError::ConstraintViolation(format!(
                "Changing {} requires replacing the server",
                reasons.join(", ")
            ))
            .into());
        }

        let plan = UpdatePlan::compute(&uuid, desired, &observed, tracked.template.as_ref());
        let api = self.api.as_ref();
        let guard = PowerGuard::new(api, &self.config);

        let live = api.get_server_details(&uuid).await?;
        guard.ensure_stopped(&uuid).await?;

        info!(uuid = %uuid, "Modifying server");
        api.modify_server(&plan.modify).await?;

        if let (Some(changes), Some(identity)) = (&plan.template, &tracked.template) {
            TemplateReconciler::new(api)
                .apply(&uuid, identity, changes)
                .await?;
        }

        if !plan.storage.is_empty() {
            StorageReconciler::new(api)
                .apply(&uuid, &live, &plan.storage)
                .await?;
        }

        guard.ensure_started(&uuid).await?;

        let template = tracked.template.clone().map(|identity| TemplateIdentity {
            backup_rule: desired
                .template
                .as_ref()
                .and_then(|t| t.backup_rule.clone()),
            ..identity
        });
        let observed = self.read(&uuid, template.as_ref()).await?;

        tracked.template = template;
        tracked.observed = Some(observed.clone());
        Ok(observed)
    }

    /// Stops and deletes the server, then deletes its boot disk.
    ///
    /// `tracked` forgets the server as soon as it is deleted and the boot
    /// disk once its storage is gone, so a failed delete can be re-run.
    pub async fn delete(&self, tracked: &mut TrackedServer) -> ProvisionResult<()> {
        let api = self.api.as_ref();

        if let Some(uuid) = tracked.id.clone() {
            PowerGuard::new(api, &self.config)
                .ensure_stopped(&uuid)
                .await?;

            info!(uuid = %uuid, "Deleting server");
            api.delete_server(&uuid).await?;
            tracked.id = None;
            tracked.observed = None;
        }

        if let Some(template) = &tracked.template {
            info!(storage = %template.id, "Deleting boot storage");
            match api.delete_storage(&template.id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    warn!(storage = %template.id, "Boot storage already deleted");
                }
                Err(e) => return Err(e),
            }
            tracked.template = None;
        }

        Ok(())
    }

    fn require_id(tracked: &TrackedServer) -> ProvisionResult<String> {
        tracked
            .id
            .clone()
            .ok_or_else(|| ProvisionError::NotFound("Server has not been created".to_string()))
    }
}
