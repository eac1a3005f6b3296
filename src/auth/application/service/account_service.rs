use crate::{
    auth::application::response::account_response::{AccountDetails, AccountResponse},
    core::{domain::error::ProvisionResult, infrastructure::api_client::ApiClient},
};
use tracing::info;

/// Verifies API credentials by fetching the account they belong to.
pub struct AccountService<'a> {
    client: &'a ApiClient,
}

impl<'a> AccountService<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Fetches the authenticated account.
    ///
    /// # Errors
    /// Returns `ProvisionError::Authentication` when the credentials are
    /// rejected and `ProvisionError::Connection` when the API is unreachable.
    pub async fn execute(&self) -> ProvisionResult<AccountDetails> {
        let response: AccountResponse = self.client.get("account").await?;
        info!(username = %response.account.username, "Credentials verified");
        Ok(response.account)
    }
}
