use crate::core::domain::error::ValidationError;
use url::Url;

/// Public UpCloud API endpoint, version 1.3.
pub const DEFAULT_API_URL: &str = "https://api.upcloud.com/1.3/";

const MAX_URL_LENGTH: usize = 2083; // RFC 7230

/// A validated API base URL.
///
/// The URL always ends with a slash so relative resource paths
/// (`server/{uuid}`) join below it instead of replacing its last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiUrl(Url);

impl ApiUrl {
    /// Parses and validates a base URL.
    pub fn new(url: &str) -> Result<Self, ValidationError> {
        validate_url(url)?;
        let normalized = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{}/", url)
        };
        Url::parse(&normalized)
            .map(Self)
            .map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))
    }

    /// Joins a resource path below the base URL.
    pub fn join(&self, path: &str) -> Result<Url, ValidationError> {
        self.0
            .join(path.trim_start_matches('/'))
            .map_err(|e| ValidationError::Format(format!("Invalid API path '{}': {}", path, e)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Validates a base URL: non-empty, bounded length, http or https.
pub(crate) fn validate_url(url: &str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::field("url", "URL cannot be empty"));
    }

    if url.len() > MAX_URL_LENGTH {
        return Err(ValidationError::Format(format!(
            "URL exceeds maximum length of {} characters",
            MAX_URL_LENGTH
        )));
    }

    let parsed =
        Url::parse(url).map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::ConstraintViolation(format!(
            "Invalid scheme '{}'. Must be one of: http, https",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none() {
        return Err(ValidationError::Format("URL must have a host".to_string()));
    }

    Ok(())
}
