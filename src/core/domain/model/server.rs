//! Domain models for server operations.
//!
//! This module defines the structures exchanged with the remote API when
//! creating, inspecting and mutating servers.

use crate::core::domain::model::storage::BackupRule;
use crate::core::domain::value_object::{
    InterfaceType, IpAddressFamily, PasswordDelivery, StorageDeviceType, TriState,
    serde_helpers::{on_off, string_or_number, yes_no},
};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Power state of a server as reported by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Started,
    Stopped,
    /// Transitioning or undergoing a platform operation.
    Maintenance,
    Error,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::Started => "started",
            PowerState::Stopped => "stopped",
            PowerState::Maintenance => "maintenance",
            PowerState::Error => "error",
        })
    }
}

/// Full server record from `GET /server/{uuid}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerDetails {
    /// Remote-assigned identifier, immutable after creation.
    pub uuid: String,
    pub hostname: String,
    /// Informational title.
    #[serde(default)]
    pub title: String,
    pub zone: String,
    /// Number of CPU cores.
    #[serde(with = "string_or_number")]
    pub core_number: u32,
    /// Memory in megabytes.
    #[serde(with = "string_or_number")]
    pub memory_amount: u32,
    /// Pricing plan (`custom` when sized explicitly).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, with = "on_off")]
    pub firewall: bool,
    #[serde(default, with = "yes_no")]
    pub metadata: bool,
    pub state: PowerState,
    #[serde(default)]
    pub networking: Networking,
    #[serde(default)]
    pub storage_devices: StorageDeviceList,
}

impl ServerDetails {
    /// Network interfaces in remote list order.
    pub fn interfaces(&self) -> &[Interface] {
        &self.networking.interfaces.interface
    }

    /// Attached storage devices in remote list order, boot device included.
    pub fn storage_devices(&self) -> &[ServerStorageDevice] {
        &self.storage_devices.storage_device
    }

    /// Looks up an attached storage device by storage UUID.
    pub fn storage_device(&self, storage_uuid: &str) -> Option<&ServerStorageDevice> {
        self.storage_devices()
            .iter()
            .find(|device| device.uuid == storage_uuid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Networking {
    #[serde(default)]
    pub interfaces: InterfaceList,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InterfaceList {
    #[serde(default)]
    pub interface: Vec<Interface>,
}

/// A network interface as reported by the remote API.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Interface {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub ip_addresses: IpAddressList,
    #[serde(default)]
    pub mac: String,
    /// Network UUID the interface is attached to.
    #[serde(default)]
    pub network: String,
    #[serde(rename = "type")]
    pub interface_type: InterfaceType,
    #[serde(default, skip_serializing_if = "TriState::is_unset")]
    pub bootable: TriState,
    #[serde(default, skip_serializing_if = "TriState::is_unset")]
    pub source_ip_filtering: TriState,
}

impl Interface {
    /// The first IP entry, which carries the interface's address.
    pub fn primary_ip(&self) -> Option<&IpAddress> {
        self.ip_addresses.ip_address.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct IpAddressList {
    #[serde(default)]
    pub ip_address: Vec<IpAddress>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IpAddress {
    #[serde(default)]
    pub address: String,
    pub family: IpAddressFamily,
    #[serde(default, skip_serializing_if = "TriState::is_unset")]
    pub floating: TriState,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StorageDeviceList {
    #[serde(default)]
    pub storage_device: Vec<ServerStorageDevice>,
}

/// A storage attached to a server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerStorageDevice {
    /// Bus address, e.g. `virtio:0`.
    pub address: String,
    /// Storage UUID.
    #[serde(rename = "storage")]
    pub uuid: String,
    /// Size in gigabytes.
    #[serde(rename = "storage_size", default)]
    pub size: u32,
    #[serde(rename = "storage_title", default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub device_type: StorageDeviceType,
    #[serde(
        rename = "storage_tier",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tier: Option<String>,
}

/// How a storage device in a creation request is provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageAction {
    /// Clone a template or storage into a new boot disk.
    Clone,
    /// Attach an existing storage.
    Attach,
}

impl StorageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageAction::Clone => "clone",
            StorageAction::Attach => "attach",
        }
    }
}

/// A storage device entry of a creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateStorageDevice {
    pub action: StorageAction,
    /// Source storage UUID.
    pub storage: String,
    pub title: Option<String>,
    pub size: Option<u32>,
    pub address: Option<String>,
    pub device_type: Option<StorageDeviceType>,
    pub backup_rule: Option<BackupRule>,
}

/// A network interface entry of a creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInterface {
    pub interface_type: InterfaceType,
    pub network: Option<String>,
    pub family: IpAddressFamily,
    pub address: Option<String>,
    pub source_ip_filtering: bool,
    pub bootable: bool,
}

/// The login user created on first boot.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginUser {
    pub username: String,
    pub ssh_keys: Vec<String>,
    pub create_password: bool,
}

/// Parameters for creating a new server.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateServerRequest {
    pub zone: String,
    pub title: String,
    pub hostname: String,
    /// Pricing plan; takes precedence over explicit sizing.
    pub plan: Option<String>,
    pub core_number: Option<u32>,
    pub memory_amount: Option<u32>,
    pub firewall: bool,
    pub metadata: bool,
    /// Setup script URL or body.
    pub user_data: Option<String>,
    pub login_user: Option<LoginUser>,
    pub password_delivery: Option<PasswordDelivery>,
    /// Boot template first, then additional devices.
    pub storage_devices: Vec<CreateStorageDevice>,
    pub interfaces: Vec<CreateInterface>,
}

/// Parameters for modifying a server's scalar properties.
///
/// `None` fields are left untouched by the remote system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyServerRequest {
    pub uuid: String,
    pub hostname: Option<String>,
    pub firewall: Option<bool>,
    pub metadata: Option<bool>,
    pub plan: Option<String>,
    pub core_number: Option<u32>,
    pub memory_amount: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopType {
    /// ACPI shutdown, forced after the request timeout.
    #[default]
    Soft,
    Hard,
}

impl StopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopType::Soft => "soft",
            StopType::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopServerRequest {
    pub uuid: String,
    pub stop_type: StopType,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachStorageRequest {
    pub server_uuid: String,
    pub address: String,
    pub storage_uuid: String,
    pub device_type: Option<StorageDeviceType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetachStorageRequest {
    pub server_uuid: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitForServerStateRequest {
    pub uuid: String,
    pub desired_state: PowerState,
    pub timeout: Duration,
}
