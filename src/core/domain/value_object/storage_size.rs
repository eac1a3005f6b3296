use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};

const MIN_STORAGE_SIZE_GB: u32 = 10;
const MAX_STORAGE_SIZE_GB: u32 = 2048;

/// A validated storage size in gigabytes (10-2048).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageSize(u32);

impl StorageSize {
    /// Creates a validated storage size.
    pub fn new(gigabytes: u32) -> Result<Self, ValidationError> {
        validate_storage_size(gigabytes)?;
        Ok(Self(gigabytes))
    }

    /// Creates a new size without validation (remote-reported values).
    pub(crate) fn new_unchecked(gigabytes: u32) -> Self {
        Self(gigabytes)
    }

    /// Returns the size in gigabytes.
    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Validates a storage size.
pub(crate) fn validate_storage_size(gigabytes: u32) -> Result<(), ValidationError> {
    if !(MIN_STORAGE_SIZE_GB..=MAX_STORAGE_SIZE_GB).contains(&gigabytes) {
        return Err(ValidationError::field(
            "size",
            format!(
                "Storage size must be between {} and {} GB, got {}",
                MIN_STORAGE_SIZE_GB, MAX_STORAGE_SIZE_GB, gigabytes
            ),
        ));
    }
    Ok(())
}
