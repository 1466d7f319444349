use std::time::Duration;

use linkhunter_shared::{LinkHunterError, Result};
use reqwest::Client;

/// User-Agent string for provider and page requests.
pub(crate) const USER_AGENT: &str = concat!("LinkHunter/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client with a hard request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LinkHunterError::Network(format!("failed to build HTTP client: {e}")))
}
