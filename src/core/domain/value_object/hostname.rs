use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_HOSTNAME_LENGTH: usize = 128;
const MAX_LABEL_LENGTH: usize = 63;

/// A validated server hostname (a domain name of 1 to 128 characters).
///
/// Labels follow RFC 1123: ASCII letters, digits and inner hyphens, at most
/// 63 characters each. This is stricter than the remote API, which only
/// bounds the total length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    /// Creates a validated hostname.
    ///
    /// # Errors
    /// Returns `ValidationError` if the name is empty, too long or contains
    /// an invalid label.
    pub fn new(hostname: impl Into<String>) -> Result<Self, ValidationError> {
        let hostname = hostname.into();
        validate_hostname(&hostname)?;
        Ok(Self(hostname))
    }

    /// Creates a new hostname without validation.
    pub(crate) fn new_unchecked(hostname: String) -> Self {
        Self(hostname)
    }

    /// Returns the hostname as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
        return Err(ValidationError::Format(format!(
            "Label must be between 1 and {} characters",
            MAX_LABEL_LENGTH
        )));
    }

    if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::Format(
            "Label can only contain alphanumeric characters and hyphens".to_string(),
        ));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(ValidationError::Format(
            "Label cannot start or end with hyphen".to_string(),
        ));
    }

    Ok(())
}

/// Validates a hostname: 1-128 characters, dot separated labels.
pub(crate) fn validate_hostname(hostname: &str) -> Result<(), ValidationError> {
    if hostname.is_empty() {
        return Err(ValidationError::field("hostname", "Hostname cannot be empty"));
    }
    if hostname.len() > MAX_HOSTNAME_LENGTH {
        return Err(ValidationError::field(
            "hostname",
            format!("Hostname cannot exceed {} characters", MAX_HOSTNAME_LENGTH),
        ));
    }
    hostname.split('.').try_for_each(validate_label)
}
