use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub account: AccountDetails,
}

/// The authenticated API account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountDetails {
    pub username: String,
    /// Remaining credits, in hundredths of the billing currency.
    #[serde(default)]
    pub credits: f64,
}
