use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use reqwest::header::HeaderMap;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::config::Config;

/// Builds the shared HTTP client: JSON default headers plus transient
/// retry with exponential backoff. All API calls in the workspace go
/// through one of these.
pub fn build_client(config: &Config) -> anyhow::Result<Arc<ClientWithMiddleware>> {
    let client = Client::builder()
        .default_headers(default_headers())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {e}"))?;

    Ok(Arc::new(build_retry_client(client)))
}

fn build_retry_client(client: Client) -> ClientWithMiddleware {
    // Exponential backoff: 1s, 2s, 4s with jitter
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("accept", "application/json".parse().expect("static header"));
    headers.insert(
        "content-type",
        "application/json".parse().expect("static header"),
    );
    headers
}
