use crate::core::{
    domain::{
        config::ProvisionerConfig,
        error::ProvisionResult,
        model::server::{
            PowerState, ServerDetails, StopServerRequest, StopType, WaitForServerStateRequest,
        },
    },
    infrastructure::server_api::ServerApi,
};
use tracing::info;

/// Brackets mutations the remote only accepts on a stopped server.
///
/// A timed out wait is fatal. The stop or start request may still have
/// been accepted, so callers must re-read before assuming anything.
pub struct PowerGuard<'a> {
    api: &'a dyn ServerApi,
    config: &'a ProvisionerConfig,
}

impl<'a> PowerGuard<'a> {
    pub fn new(api: &'a dyn ServerApi, config: &'a ProvisionerConfig) -> Self {
        Self { api, config }
    }

    /// Stops the server unless it already is, then waits until it reports
    /// `stopped`.
    pub async fn ensure_stopped(&self, uuid: &str) -> ProvisionResult<ServerDetails> {
        let details = self.api.get_server_details(uuid).await?;
        if details.state == PowerState::Stopped {
            return Ok(details);
        }

        info!(uuid, state = %details.state, "Stopping server");
        self.api
            .stop_server(&StopServerRequest {
                uuid: uuid.to_string(),
                stop_type: StopType::Soft,
                timeout: self.config.stop_timeout,
            })
            .await?;

        self.wait_for(uuid, PowerState::Stopped).await
    }

    /// Starts the server unless it already runs, then waits until it
    /// reports `started`.
    pub async fn ensure_started(&self, uuid: &str) -> ProvisionResult<ServerDetails> {
        let details = self.api.get_server_details(uuid).await?;
        if details.state == PowerState::Started {
            return Ok(details);
        }

        info!(uuid, state = %details.state, "Starting server");
        self.api.start_server(uuid).await?;

        self.wait_for(uuid, PowerState::Started).await
    }

    async fn wait_for(&self, uuid: &str, state: PowerState) -> ProvisionResult<ServerDetails> {
        self.api
            .wait_for_server_state(&WaitForServerStateRequest {
                uuid: uuid.to_string(),
                desired_state: state,
                timeout: self.config.power_timeout,
            })
            .await
    }
}
