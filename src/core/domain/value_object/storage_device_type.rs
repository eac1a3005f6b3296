use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How a storage is attached to a server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StorageDeviceType {
    #[default]
    Disk,
    Cdrom,
}

impl StorageDeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageDeviceType::Disk => "disk",
            StorageDeviceType::Cdrom => "cdrom",
        }
    }
}

impl fmt::Display for StorageDeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageDeviceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disk" => Ok(StorageDeviceType::Disk),
            "cdrom" => Ok(StorageDeviceType::Cdrom),
            other => Err(ValidationError::field(
                "type",
                format!("'{}' must be one of disk or cdrom", other),
            )),
        }
    }
}
