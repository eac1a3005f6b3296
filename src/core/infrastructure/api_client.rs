//! Internal HTTP client that handles authentication, throttling and error mapping.

use crate::core::domain::{
    config::{ApiCredentials, ProvisionerConfig},
    error::{ProvisionError, ProvisionResult, ValidationError},
    value_object::ApiUrl,
};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

/// Error envelope returned by the remote API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_code: String,
    error_message: String,
}

/// Internal HTTP client used by the remote services.
///
/// Every request carries HTTP basic auth and JSON headers. When a rate
/// limit is configured, requests wait for capacity before being sent.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: ApiUrl,
    credentials: Arc<ApiCredentials>,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl ApiClient {
    /// Creates a new `ApiClient`.
    ///
    /// # Errors
    /// Returns `ProvisionError::Validation` for an unusable rate limit and
    /// `ProvisionError::Connection` if the HTTP client cannot be built.
    pub fn new(
        base_url: ApiUrl,
        credentials: ApiCredentials,
        config: &ProvisionerConfig,
    ) -> ProvisionResult<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| ProvisionError::Connection(e.to_string()))?;

        let rate_limiter = match config.rate_limit {
            Some(rl) => {
                let invalid = || {
                    ValidationError::field(
                        "rate_limit",
                        "Requests per second and burst size must be greater than zero",
                    )
                };
                let per_second = NonZeroU32::new(rl.requests_per_second).ok_or_else(invalid)?;
                let burst = NonZeroU32::new(rl.burst_size).ok_or_else(invalid)?;
                let quota = Quota::per_second(per_second).allow_burst(burst);
                Some(Arc::new(DefaultDirectRateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            http_client,
            base_url,
            credentials: Arc::new(credentials),
            rate_limiter,
        })
    }

    /// Returns the base URL requests are resolved against.
    pub fn base_url(&self) -> &ApiUrl {
        &self.base_url
    }

    /// Performs an authenticated GET request.
    ///
    /// # Errors
    /// Returns `ProvisionError` if the request fails, the remote rejects it,
    /// or the response cannot be parsed.
    pub async fn get<T>(&self, path: &str) -> ProvisionResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(Method::GET, path, None::<&()>).await?;
        Self::parse(response).await
    }

    /// Performs an authenticated POST request with a JSON body.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> ProvisionResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, path, Some(body)).await?;
        Self::parse(response).await
    }

    /// Performs an authenticated POST request without a body.
    pub async fn post_empty<T>(&self, path: &str) -> ProvisionResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, path, None::<&()>).await?;
        Self::parse(response).await
    }

    /// Performs an authenticated PUT request with a JSON body.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> ProvisionResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let response = self.send(Method::PUT, path, Some(body)).await?;
        Self::parse(response).await
    }

    /// Performs an authenticated DELETE request. The remote answers with an
    /// empty body.
    pub async fn delete(&self, path: &str) -> ProvisionResult<()> {
        self.send(Method::DELETE, path, None::<&()>).await?;
        Ok(())
    }

    /// Sends a request and maps non-2xx responses to errors.
    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ProvisionResult<reqwest::Response>
    where
        B: Serialize,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let url = self.base_url.join(path)?;
        debug!(%method, %url, "Sending API request");

        let mut request = self
            .http_client
            .request(method, url)
            .basic_auth(
                self.credentials.username().as_str(),
                Some(self.credentials.password().as_str()),
            )
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProvisionError::Connection(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(Self::map_error(status, path, &text))
    }

    async fn parse<T>(response: reqwest::Response) -> ProvisionResult<T>
    where
        T: DeserializeOwned,
    {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProvisionError::Connection(format!("Failed to read response: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn map_error(status: StatusCode, path: &str, body: &str) -> ProvisionError {
        let (code, message) = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(envelope) => (envelope.error.error_code, envelope.error.error_message),
            Err(_) => (
                status.canonical_reason().unwrap_or("UNKNOWN").to_string(),
                body.to_string(),
            ),
        };

        match status {
            StatusCode::NOT_FOUND => ProvisionError::NotFound(format!("{}: {}", path, message)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProvisionError::Authentication(format!("{}: {}", code, message))
            }
            _ => ProvisionError::Api {
                status: status.as_u16(),
                code,
                message,
            },
        }
    }
}
