use std::time::Duration;
use thiserror::Error;

use crate::core::domain::model::server::PowerState;

/// The main error type for server provisioning operations.
///
/// This enum represents all possible errors that can occur while
/// converging a server: transport failures, remote API rejections,
/// missing entities, validation failures and wait-for-state timeouts.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Represents errors that occur while talking to the remote API
    ///
    /// # Fields
    /// * `0` - A description of what went wrong with the transport
    #[error("Connection error: {0}")]
    Connection(String),

    /// Represents rejected credentials (HTTP 401/403)
    ///
    /// # Fields
    /// * `0` - A description of the authentication failure
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Represents malformed declarative input, caught before any remote call
    ///
    /// # Fields
    /// * `source` - The underlying validation error
    #[error("Validation error: {source}")]
    Validation { source: ValidationError },

    /// The remote system rejected a request
    ///
    /// # Fields
    /// * `status` - HTTP status code of the response
    /// * `code` - Remote error code (e.g. `STORAGE_DEVICE_INVALID`)
    /// * `message` - Remote error message, verbatim
    #[error("API error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The referenced remote entity does not exist (anymore)
    #[error("Not found: {0}")]
    NotFound(String),

    /// A wait-for-state bound was exceeded.
    ///
    /// The remote action may still complete; state must be re-read.
    #[error("Timed out after {timeout:?} waiting for server {server_id} to become {state}")]
    Timeout {
        server_id: String,
        state: PowerState,
        timeout: Duration,
    },

    /// A request or response body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tracked state could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Returns true if the error means the remote entity is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProvisionError::NotFound(_))
    }

    /// Returns true if the error is a wait-for-state timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProvisionError::Timeout { .. })
    }

    /// Returns true if the same request may succeed when sent again:
    /// transport failures, a busy resource (409/423), throttling (429)
    /// and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ProvisionError::Connection(_) => true,
            ProvisionError::Api { status, .. } => {
                matches!(*status, 409 | 423 | 429) || (500..600).contains(status)
            }
            _ => false,
        }
    }
}

impl From<ValidationError> for ProvisionError {
    fn from(error: ValidationError) -> Self {
        ProvisionError::Validation { source: error }
    }
}

/// Specialized error type for validation failures.
///
/// This enum provides detailed context about why a validation
/// failed, including field-specific errors and format violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Represents a validation failure for a specific field
    ///
    /// # Fields
    /// * `field` - The name of the field that failed validation
    /// * `message` - A detailed message about why validation failed
    #[error("Field '{field}' validation failed: {message}")]
    Field { field: String, message: String },

    /// Represents format/syntax validation failures
    ///
    /// # Fields
    /// * `0` - Description of the format violation
    #[error("Format error: {0}")]
    Format(String),

    /// Represents violations of domain constraints
    ///
    /// # Fields
    /// * `0` - Description of the constraint violation
    #[error("Domain constraint violation: {0}")]
    ConstraintViolation(String),
}

impl ValidationError {
    pub(crate) fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Type alias for Results that may fail with a ProvisionError
pub type ProvisionResult<T> = Result<T, ProvisionError>;
