//! Declarative model of a managed server.
//!
//! `DesiredServer` is what the caller asks for; `ObservedServer` is what the
//! last read found on the remote system. Both are plain immutable snapshots,
//! reconcilers diff them into remote calls.

use crate::core::domain::error::ValidationError;
use crate::core::domain::model::storage::BackupRule;
use crate::core::domain::value_object::{
    Hostname, InterfaceType, IpAddressFamily, PasswordDelivery, StorageDeviceType, StorageSize,
    StorageTitle, TriState, validate_hostname, validate_storage_size, validate_storage_title,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Login user for SSH connections set up by the image.
pub const CONNECTION_USER: &str = "root";
/// Connection type reported to the caller.
pub const CONNECTION_TYPE: &str = "ssh";

fn default_true() -> bool {
    true
}

/// Desired configuration of a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredServer {
    pub hostname: Hostname,
    /// Immutable after creation.
    pub zone: String,
    #[serde(default)]
    pub firewall: bool,
    #[serde(default)]
    pub metadata: bool,
    /// Pricing plan. Wins over `cpu`/`mem` when both are given.
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub cpu: Option<u32>,
    /// Memory in megabytes.
    #[serde(default)]
    pub mem: Option<u32>,
    /// Immutable after creation, at least one required.
    pub network_interfaces: Vec<NetworkInterfaceConfig>,
    #[serde(default)]
    pub user_data: Option<String>,
    /// Additional (non-boot) storage devices.
    #[serde(default)]
    pub storage_devices: BTreeSet<StorageDevice>,
    #[serde(default)]
    pub template: Option<TemplateConfig>,
    /// Write-only, only used at creation.
    #[serde(default)]
    pub login: Option<LoginConfig>,
}

/// Resolved server sizing after applying plan precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing<'a> {
    Plan(&'a str),
    Custom { cpu: Option<u32>, mem: Option<u32> },
}

impl DesiredServer {
    pub fn new(hostname: Hostname, zone: impl Into<String>) -> Self {
        Self {
            hostname,
            zone: zone.into(),
            firewall: false,
            metadata: false,
            plan: None,
            cpu: None,
            mem: None,
            network_interfaces: Vec::new(),
            user_data: None,
            storage_devices: BTreeSet::new(),
            template: None,
            login: None,
        }
    }

    pub fn with_interface(mut self, interface: NetworkInterfaceConfig) -> Self {
        self.network_interfaces.push(interface);
        self
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    pub fn with_resources(mut self, cpu: u32, mem: u32) -> Self {
        self.cpu = Some(cpu);
        self.mem = Some(mem);
        self
    }

    pub fn with_storage_device(mut self, device: StorageDevice) -> Self {
        self.storage_devices.insert(device);
        self
    }

    pub fn with_template(mut self, template: TemplateConfig) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_login(mut self, login: LoginConfig) -> Self {
        self.login = Some(login);
        self
    }

    /// Plan takes precedence over explicit cpu/mem.
    pub fn sizing(&self) -> Sizing<'_> {
        match self.plan.as_deref() {
            Some(plan) if !plan.is_empty() => Sizing::Plan(plan),
            _ => Sizing::Custom {
                cpu: self.cpu,
                mem: self.mem,
            },
        }
    }

    /// Validates the declarative input. Runs before any remote call.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_hostname(self.hostname.as_str())?;

        if self.zone.trim().is_empty() {
            return Err(ValidationError::field("zone", "Zone cannot be empty"));
        }

        if self.cpu == Some(0) || self.mem == Some(0) {
            return Err(ValidationError::ConstraintViolation(
                "cpu and mem must be positive when given".to_string(),
            ));
        }

        if self.network_interfaces.is_empty() {
            return Err(ValidationError::field(
                "network_interface",
                "At least one network interface is required",
            ));
        }
        for (index, interface) in self.network_interfaces.iter().enumerate() {
            interface.validate().map_err(|e| {
                ValidationError::field(format!("network_interface.{}", index), e.to_string())
            })?;
        }

        for device in &self.storage_devices {
            if device.storage.is_empty() {
                return Err(ValidationError::field(
                    "storage_devices.storage",
                    "A storage UUID is required",
                ));
            }
        }

        if let Some(template) = &self.template {
            template.validate()?;
        }

        if let Some(login) = &self.login {
            if login.user.trim().is_empty() {
                return Err(ValidationError::field("login.user", "User cannot be empty"));
            }
        }

        Ok(())
    }

    /// Immutable fields whose desired value differs from the observed one.
    ///
    /// A non-empty result means the change can only be applied by
    /// replacing the server.
    pub fn replacement_reasons(&self, observed: &ObservedServer) -> Vec<&'static str> {
        let mut reasons = Vec::new();

        if self.zone != observed.zone {
            reasons.push("zone");
        }

        let interfaces_match = self.network_interfaces.len() == observed.network_interfaces.len()
            && self
                .network_interfaces
                .iter()
                .zip(&observed.network_interfaces)
                .all(|(desired, observed)| desired.matches(observed));
        if !interfaces_match {
            reasons.push("network_interface");
        }

        match (&self.template, &observed.template) {
            (Some(desired), Some(observed)) if desired.storage != observed.storage => {
                reasons.push("template.storage")
            }
            (Some(_), None) | (None, Some(_)) => reasons.push("template"),
            _ => {}
        }

        reasons
    }
}

/// Desired configuration of one network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceConfig {
    #[serde(default)]
    pub ip_address_family: IpAddressFamily,
    /// Requested address, assigned by the remote system when absent.
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(rename = "type")]
    pub interface_type: InterfaceType,
    /// Network UUID, required for private interfaces.
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default = "default_true")]
    pub source_ip_filtering: bool,
    #[serde(default)]
    pub bootable: bool,
}

impl NetworkInterfaceConfig {
    pub fn new(interface_type: InterfaceType) -> Self {
        Self {
            ip_address_family: IpAddressFamily::IPv4,
            ip_address: None,
            interface_type,
            network: None,
            source_ip_filtering: true,
            bootable: false,
        }
    }

    pub fn public() -> Self {
        Self::new(InterfaceType::Public)
    }

    pub fn utility() -> Self {
        Self::new(InterfaceType::Utility)
    }

    pub fn private(network: impl Into<String>) -> Self {
        Self {
            network: Some(network.into()),
            ..Self::new(InterfaceType::Private)
        }
    }

    pub fn with_family(mut self, family: IpAddressFamily) -> Self {
        self.ip_address_family = family;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let has_network = self.network.as_deref().is_some_and(|n| !n.is_empty());
        if self.interface_type == InterfaceType::Private && !has_network {
            return Err(ValidationError::field(
                "network",
                "A network must be given for private interfaces",
            ));
        }
        Ok(())
    }

    /// Whether the observed interface satisfies this configuration.
    ///
    /// Computed or unreported values on the observed side are not drift.
    fn matches(&self, observed: &NetworkInterfaceState) -> bool {
        let family = observed
            .ip_address_family
            .is_none_or(|family| family == self.ip_address_family);
        let address = match (&self.ip_address, &observed.ip_address) {
            (Some(desired), Some(actual)) => desired == actual,
            (Some(_), None) => false,
            (None, _) => true,
        };
        let network = self
            .network
            .as_deref()
            .is_none_or(|network| network == observed.network);
        let filtering = observed
            .source_ip_filtering
            .as_bool()
            .is_none_or(|value| value == self.source_ip_filtering);
        let bootable = observed
            .bootable
            .as_bool()
            .is_none_or(|value| value == self.bootable);

        self.interface_type == observed.interface_type
            && family
            && address
            && network
            && filtering
            && bootable
    }
}

/// An additional storage device, compared by value in all fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageDevice {
    /// Storage UUID.
    pub storage: String,
    /// Bus address, e.g. `virtio:1`, or a bare bus name to auto-select.
    pub address: String,
    #[serde(rename = "type", default)]
    pub device_type: StorageDeviceType,
}

impl StorageDevice {
    pub fn new(
        storage: impl Into<String>,
        address: impl Into<String>,
        device_type: StorageDeviceType,
    ) -> Self {
        Self {
            storage: storage.into(),
            address: address.into(),
            device_type,
        }
    }
}

/// Desired boot disk, cloned from a template at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Source template UUID or template title. Immutable.
    pub storage: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub size: Option<StorageSize>,
    #[serde(default)]
    pub title: Option<StorageTitle>,
    #[serde(default)]
    pub backup_rule: Option<BackupRule>,
}

impl TemplateConfig {
    pub fn new(storage: impl Into<String>) -> Self {
        Self {
            storage: storage.into(),
            address: None,
            size: None,
            title: None,
            backup_rule: None,
        }
    }

    pub fn with_size(mut self, size: StorageSize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_title(mut self, title: StorageTitle) -> Self {
        self.title = Some(title);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_backup_rule(mut self, rule: BackupRule) -> Self {
        self.backup_rule = Some(rule);
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.storage.trim().is_empty() {
            return Err(ValidationError::field(
                "template.storage",
                "A template UUID or name is required",
            ));
        }
        if let Some(size) = self.size {
            validate_storage_size(size.get())?;
        }
        if let Some(title) = &self.title {
            validate_storage_title(title.as_str())?;
        }
        if let Some(rule) = &self.backup_rule {
            rule.validate()?;
        }
        Ok(())
    }
}

/// Access credentials created at first boot. Changing any field forces
/// replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
    pub user: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub create_password: bool,
    #[serde(default)]
    pub password_delivery: PasswordDelivery,
}

/// A network interface as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceState {
    /// From the first IP entry; absent when the remote reports none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address_family: Option<IpAddressFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "TriState::is_unset")]
    pub ip_address_floating: TriState,
    pub mac_address: String,
    pub network: String,
    #[serde(rename = "type")]
    pub interface_type: InterfaceType,
    #[serde(default, skip_serializing_if = "TriState::is_unset")]
    pub source_ip_filtering: TriState,
    #[serde(default, skip_serializing_if = "TriState::is_unset")]
    pub bootable: TriState,
}

/// The boot disk as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateState {
    /// Remote-assigned storage UUID, the correlation key.
    pub id: String,
    pub address: String,
    pub size: StorageSize,
    pub title: StorageTitle,
    /// Source reference as configured; not reported by the remote.
    pub storage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    /// As last applied; the remote device list does not report it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_rule: Option<BackupRule>,
}

/// How to reach the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Primary connection address, empty when the server has none.
    pub host: String,
    pub user: String,
    #[serde(rename = "type")]
    pub auth_type: String,
    /// Only known out-of-band, always blank.
    pub password: String,
}

impl ConnectionInfo {
    pub fn ssh(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: CONNECTION_USER.to_string(),
            auth_type: CONNECTION_TYPE.to_string(),
            password: String::new(),
        }
    }
}

/// Observed state of a server after a read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedServer {
    pub id: String,
    pub hostname: Hostname,
    pub title: String,
    pub zone: String,
    pub cpu: u32,
    pub mem: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    pub firewall: bool,
    pub metadata: bool,
    pub network_interfaces: Vec<NetworkInterfaceState>,
    pub storage_devices: BTreeSet<StorageDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateState>,
    pub connection: ConnectionInfo,
}
