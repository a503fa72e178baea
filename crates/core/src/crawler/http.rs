//! Shared HTTP plumbing for crawlers.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::CrawlersConfig;

use super::CrawlerError;

/// Build the HTTP client shared by all crawlers.
pub fn build_client(config: &CrawlersConfig) -> Result<Client, CrawlerError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .cookie_store(true)
        .build()
        .map_err(|e| CrawlerError::ClientSetup(e.to_string()))
}

/// GET a URL and return its body, mapping transport failures per source.
pub(crate) async fn fetch_text(
    client: &Client,
    source_name: &str,
    url: &str,
) -> Result<String, CrawlerError> {
    debug!(source = source_name, url = url, "Fetching");

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            CrawlerError::Timeout(source_name.to_string())
        } else {
            CrawlerError::ConnectionFailed {
                source_name: source_name.to_string(),
                message: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(CrawlerError::HttpStatus {
            source_name: source_name.to_string(),
            status: response.status().as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|e| CrawlerError::parse(source_name, format!("unreadable body: {}", e)))
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Parse a seeder cell, tolerating separators and placeholder dashes.
pub(crate) fn parse_count(text: &str) -> u32 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}
