use crate::core::domain::error::ValidationError;

/// An API account password (plaintext, only held in memory).
#[derive(Clone)]
pub struct ApiPassword(String);

impl ApiPassword {
    /// Creates a validated password.
    pub fn new(password: impl Into<String>) -> Result<Self, ValidationError> {
        let password = password.into();
        validate_password(&password)?;
        Ok(Self(password))
    }

    /// Creates a new password without validation.
    #[cfg(test)]
    pub(crate) fn new_unchecked(password: String) -> Self {
        Self(password)
    }

    /// Returns the password as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiPassword(****)")
    }
}

/// Validates a password.
pub(crate) fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::field("password", "Password cannot be empty"));
    }
    if password.len() > 128 {
        return Err(ValidationError::Format(
            "Password cannot exceed 128 characters".to_string(),
        ));
    }
    Ok(())
}
