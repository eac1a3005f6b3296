use crate::core::domain::error::ValidationError;

/// A validated API account username.
#[derive(Debug, Clone)]
pub struct ApiUsername(String);

impl ApiUsername {
    /// Creates a validated username.
    pub fn new(username: impl Into<String>) -> Result<Self, ValidationError> {
        let username = username.into();
        validate_username(&username)?;
        Ok(Self(username))
    }

    /// Creates a new username without validation.
    #[cfg(test)]
    pub(crate) fn new_unchecked(username: String) -> Self {
        Self(username)
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validates an API username.
pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::field("username", "Username cannot be empty"));
    }
    if username.len() > 64 {
        return Err(ValidationError::Format(format!(
            "Username cannot exceed 64 characters (got {})",
            username.len()
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(ValidationError::Format(
            "Username cannot contain whitespace".to_string(),
        ));
    }
    Ok(())
}
