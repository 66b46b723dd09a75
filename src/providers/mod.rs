//! External quote sources.
//!
//! Each source resolves a set of currency pairs against USD and returns only
//! the pairs it could resolve; an empty map is a valid answer. Failures are
//! typed [`CoreError::ApiRequest`] values whose reason discriminates timeout,
//! connection failure, HTTP status class, and application-level errors.

pub mod coingecko;
pub mod exchangerate;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::CoreError;

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Human-readable name, used in logs, history records, and error reports.
    fn name(&self) -> &str;

    /// Fetches the current quotes as a `"BASE_QUOTE" -> rate` mapping.
    async fn fetch_rates(&self) -> Result<HashMap<String, f64>, CoreError>;
}

/// All configured sources in their fixed iteration order. The updater merges
/// results last-writer-wins in this order.
pub fn build_sources(config: &AppConfig) -> Vec<Box<dyn RateSource>> {
    let coingecko_url = config
        .providers
        .coingecko
        .as_ref()
        .map_or("https://api.coingecko.com/api/v3", |p| p.base_url.as_str());
    let exchangerate_url = config
        .providers
        .exchangerate
        .as_ref()
        .map_or("https://v6.exchangerate-api.com/v6", |p| p.base_url.as_str());

    vec![
        Box::new(coingecko::CoinGeckoSource::new(coingecko_url, config)),
        Box::new(exchangerate::ExchangeRateApiSource::new(
            exchangerate_url,
            config.exchangerate_api_key(),
            config,
        )),
    ]
}

pub(crate) fn build_client(timeout_seconds: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("valutahub/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Performs one GET and decodes the body as JSON, mapping every failure mode
/// to a distinct `ApiRequest` reason. Reasons never echo the URL since some
/// sources carry credentials in the path; the updater labels each reason with
/// the source name.
pub(crate) async fn get_json(
    client: &Client,
    source: &str,
    url: &str,
    query: &[(&str, &str)],
) -> Result<serde_json::Value, CoreError> {
    debug!(source, "requesting quotes");
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| transport_error(&e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CoreError::ApiRequest {
            reason: describe_status(status),
        });
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| CoreError::ApiRequest {
            reason: format!("invalid response body: {e}"),
        })
}

fn transport_error(e: &reqwest::Error) -> CoreError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        format!("request error: {e}")
    };
    CoreError::ApiRequest { reason }
}

fn describe_status(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("credential rejected (HTTP {status})")
        }
        StatusCode::NOT_FOUND => "endpoint not found (HTTP 404)".to_string(),
        StatusCode::TOO_MANY_REQUESTS => "rate limited (HTTP 429)".to_string(),
        s if s.is_server_error() => format!("server error (HTTP {s})"),
        s => format!("unexpected HTTP status {s}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_descriptions_discriminate_classes() {
        assert!(describe_status(StatusCode::UNAUTHORIZED).contains("credential rejected"));
        assert!(describe_status(StatusCode::FORBIDDEN).contains("credential rejected"));
        assert!(describe_status(StatusCode::NOT_FOUND).contains("not found"));
        assert!(describe_status(StatusCode::TOO_MANY_REQUESTS).contains("rate limited"));
        assert!(describe_status(StatusCode::BAD_GATEWAY).contains("server error"));
        assert!(describe_status(StatusCode::IM_A_TEAPOT).contains("unexpected HTTP status"));
    }
}
