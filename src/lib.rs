mod auth;
mod core;
mod server;


pub use crate::auth::application::response::account_response::AccountDetails;
pub use crate::core::domain::{
    config::{
        ApiCredentials, PASSWORD_ENV, ProvisionerConfig, RateLimitConfig, RetryConfig,
        USERNAME_ENV,
    },
    error::{ProvisionError, ProvisionResult, ValidationError},
    model::{
        resource::{
            ConnectionInfo, DesiredServer, LoginConfig, NetworkInterfaceConfig,
            NetworkInterfaceState, ObservedServer, Sizing, StorageDevice, TemplateConfig,
            TemplateState,
        },
        server::PowerState,
        storage::{BackupInterval, BackupRule},
        tracked::{TemplateIdentity, TrackedServer},
    },
    value_object::{
        ApiPassword, ApiUrl, ApiUsername, DEFAULT_API_URL, Hostname, InterfaceType,
        IpAddressFamily, PasswordDelivery, StorageDeviceType, StorageSize, StorageTitle,
        TriState,
    },
};
pub use crate::core::infrastructure::{server_api::ServerApi, upcloud_service::UpCloudService};
pub use crate::server::application::service::lifecycle_service::ServerLifecycle;

use crate::{
    auth::application::service::account_service::AccountService,
    core::infrastructure::api_client::ApiClient,
};
use std::sync::Arc;

/// A client for managing UpCloud servers declaratively
///
/// This client provides:
/// - Credential verification against the account endpoint
/// - Create, read, update and delete convergence of servers
/// - Rate limited, authenticated access to the UpCloud API
///
/// # Examples
///
/// ```no_run
/// use upcloud_provisioner::{
///     DesiredServer, Hostname, NetworkInterfaceConfig, ProvisionResult, TemplateConfig,
///     TrackedServer, UpCloudClient,
/// };
///
/// #[tokio::main]
/// async fn main() -> ProvisionResult<()> {
///     let client = UpCloudClient::builder()
///         .credentials("user", "password")
///         .build()?;
///
///     let desired = DesiredServer::new(Hostname::new("web1.example.com")?, "fi-hel1")
///         .with_plan("1xCPU-1GB")
///         .with_interface(NetworkInterfaceConfig::public())
///         .with_template(TemplateConfig::new("Debian GNU/Linux 12 (Bookworm)"));
///
///     let mut tracked = TrackedServer::new();
///     client.servers().create(&desired, &mut tracked).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct UpCloudClient {
    service: Arc<UpCloudService>,
}

/// Builder for UpCloudClient configuration
#[derive(Debug, Default)]
pub struct UpCloudClientBuilder {
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    config: ProvisionerConfig,
}

impl UpCloudClientBuilder {
    /// Overrides the API endpoint, `DEFAULT_API_URL` otherwise.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the API account. Without it, `UPCLOUD_USERNAME` and
    /// `UPCLOUD_PASSWORD` are read at build time.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn config(mut self, config: ProvisionerConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates every setting and builds the client. No request is sent.
    pub fn build(self) -> ProvisionResult<UpCloudClient> {
        self.config.validate()?;

        let base_url = ApiUrl::new(self.base_url.as_deref().unwrap_or(DEFAULT_API_URL))?;

        let credentials = match (self.username, self.password) {
            (Some(username), Some(password)) => {
                ApiCredentials::new(ApiUsername::new(username)?, ApiPassword::new(password)?)
            }
            (None, None) => ApiCredentials::from_env()?,
            _ => {
                return Err(ValidationError::field(
                    "credentials",
                    "Username and password must be given together",
                )
                .into());
            }
        };

        let client = ApiClient::new(base_url, credentials, &self.config)?;
        Ok(UpCloudClient {
            service: Arc::new(UpCloudService::new(client, self.config)),
        })
    }
}

impl UpCloudClient {
    /// Creates a new builder for UpCloudClient configuration
    pub fn builder() -> UpCloudClientBuilder {
        UpCloudClientBuilder::default()
    }

    /// Checks the credentials by fetching the account they belong to
    ///
    /// # Errors
    ///
    /// * `ProvisionError::Authentication` if the credentials are rejected
    /// * `ProvisionError::Connection` if the API is unreachable
    pub async fn verify_credentials(&self) -> ProvisionResult<AccountDetails> {
        AccountService::new(self.service.client()).execute().await
    }

    /// Returns the server lifecycle reconciler bound to this client
    pub fn servers(&self) -> ServerLifecycle {
        ServerLifecycle::new(self.service.clone(), self.service.config().clone())
    }

    /// Returns the underlying API service
    pub fn service(&self) -> &UpCloudService {
        &self.service
    }
}
