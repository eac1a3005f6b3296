//! Closed enumerations describing a network interface.

use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Address family of an interface's IP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IpAddressFamily {
    #[default]
    IPv4,
    IPv6,
}

impl IpAddressFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpAddressFamily::IPv4 => "IPv4",
            IpAddressFamily::IPv6 => "IPv6",
        }
    }
}

impl fmt::Display for IpAddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpAddressFamily {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IPv4" => Ok(IpAddressFamily::IPv4),
            "IPv6" => Ok(IpAddressFamily::IPv6),
            other => Err(ValidationError::field(
                "ip_address_family",
                format!("'{}' must be one of IPv4 or IPv6", other),
            )),
        }
    }
}

/// Kind of network an interface is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Private,
    Utility,
    Public,
}

impl InterfaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceType::Private => "private",
            InterfaceType::Utility => "utility",
            InterfaceType::Public => "public",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterfaceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(InterfaceType::Private),
            "utility" => Ok(InterfaceType::Utility),
            "public" => Ok(InterfaceType::Public),
            other => Err(ValidationError::field(
                "type",
                format!("'{}' must be one of private, public or utility", other),
            )),
        }
    }
}
