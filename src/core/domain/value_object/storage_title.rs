use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_TITLE_LENGTH: usize = 64;

/// A short, informative storage description (0-64 characters).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageTitle(String);

impl StorageTitle {
    /// Creates a validated storage title.
    pub fn new(title: impl Into<String>) -> Result<Self, ValidationError> {
        let title = title.into();
        validate_storage_title(&title)?;
        Ok(Self(title))
    }

    pub(crate) fn new_unchecked(title: String) -> Self {
        Self(title)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates a storage title length (counted in characters, not bytes).
pub(crate) fn validate_storage_title(title: &str) -> Result<(), ValidationError> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::Format(format!(
            "Storage title cannot exceed {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}
