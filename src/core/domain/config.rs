//! Runtime configuration of the provisioner.

use crate::core::domain::error::ValidationError;
use crate::core::domain::value_object::{ApiPassword, ApiUsername};
use std::time::Duration;

/// Environment variable holding the API username.
pub const USERNAME_ENV: &str = "UPCLOUD_USERNAME";
/// Environment variable holding the API password.
pub const PASSWORD_ENV: &str = "UPCLOUD_PASSWORD";

/// Client-side throttling of API requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Bounded retry of a single remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Pause before every attempt.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Timeouts, polling and throttling used by the reconciler and HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerConfig {
    /// Bound for a new server to reach `started`.
    pub create_timeout: Duration,
    /// Bound for the power guard's stop and start waits.
    pub power_timeout: Duration,
    /// Period between state polls while waiting.
    pub poll_interval: Duration,
    /// Grace period of a soft stop before the remote forces it.
    pub stop_timeout: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            create_timeout: Duration::from_secs(25 * 60),
            power_timeout: Duration::from_secs(25 * 60),
            poll_interval: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
            rate_limit: None,
        }
    }
}

impl ProvisionerConfig {
    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }

    pub fn with_power_timeout(mut self, timeout: Duration) -> Self {
        self.power_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retries: u32, delay: Duration) -> Self {
        self.retry = RetryConfig { retries, delay };
        self
    }

    pub fn with_rate_limit(mut self, requests_per_second: u32, burst_size: u32) -> Self {
        self.rate_limit = Some(RateLimitConfig {
            requests_per_second,
            burst_size,
        });
        self
    }

    /// Rejects zero durations and an empty rate limit quota.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let durations = [
            ("create_timeout", self.create_timeout),
            ("power_timeout", self.power_timeout),
            ("poll_interval", self.poll_interval),
            ("request_timeout", self.request_timeout),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(ValidationError::field(field, "Must be greater than zero"));
            }
        }

        if let Some(rate_limit) = self.rate_limit {
            if rate_limit.requests_per_second == 0 || rate_limit.burst_size == 0 {
                return Err(ValidationError::field(
                    "rate_limit",
                    "Requests per second and burst size must be greater than zero",
                ));
            }
        }

        Ok(())
    }
}

/// HTTP basic auth credentials of an API account.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    username: ApiUsername,
    password: ApiPassword,
}

impl ApiCredentials {
    pub fn new(username: ApiUsername, password: ApiPassword) -> Self {
        Self { username, password }
    }

    /// Reads `UPCLOUD_USERNAME` and `UPCLOUD_PASSWORD`.
    pub fn from_env() -> Result<Self, ValidationError> {
        let read = |name: &str| {
            std::env::var(name)
                .map_err(|_| ValidationError::field(name, "Environment variable is not set"))
        };
        Ok(Self {
            username: ApiUsername::new(read(USERNAME_ENV)?)?,
            password: ApiPassword::new(read(PASSWORD_ENV)?)?,
        })
    }

    pub fn username(&self) -> &ApiUsername {
        &self.username
    }

    pub fn password(&self) -> &ApiPassword {
        &self.password
    }
}
