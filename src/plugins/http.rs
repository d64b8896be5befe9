use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Client shared by every scraper of a run.
pub fn build_client(config: &ScraperConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| AppError::InvalidConfig(format!("cannot build HTTP client: {}", e)))
}

/// GET a page and return its body. Transport errors, timeouts and non-2xx
/// statuses are all network errors.
pub async fn fetch_page(client: &Client, url: &Url) -> Result<String> {
    tracing::debug!("Fetching {}", url);
    metrics::counter!("aw_http_requests_total").increment(1);

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| AppError::network(url.as_str(), e))?
        .error_for_status()
        .map_err(|e| AppError::network(url.as_str(), e))?;

    response
        .text()
        .await
        .map_err(|e| AppError::network(url.as_str(), e))
}
