use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Delivery channel for a generated root password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordDelivery {
    #[default]
    None,
    Email,
    Sms,
}

impl PasswordDelivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            PasswordDelivery::None => "none",
            PasswordDelivery::Email => "email",
            PasswordDelivery::Sms => "sms",
        }
    }
}

impl fmt::Display for PasswordDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PasswordDelivery {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PasswordDelivery::None),
            "email" => Ok(PasswordDelivery::Email),
            "sms" => Ok(PasswordDelivery::Sms),
            other => Err(ValidationError::field(
                "password_delivery",
                format!("'{}' must be one of none, email or sms", other),
            )),
        }
    }
}
