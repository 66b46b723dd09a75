use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::{build_client, get_json, RateSource};
use crate::config::{AppConfig, ENV_EXCHANGERATE_API_KEY};
use crate::errors::CoreError;

/// Fiat quote source backed by ExchangeRate-API. Requires an API key; a
/// missing key fails the fetch before any network call so the updater can
/// report it like any other per-source error.
pub struct ExchangeRateApiSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    base_currency: String,
    fiat_codes: Vec<String>,
}

impl ExchangeRateApiSource {
    pub fn new(base_url: &str, api_key: Option<String>, config: &AppConfig) -> Self {
        ExchangeRateApiSource {
            client: build_client(config.request_timeout_seconds),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            base_currency: config.default_base_currency.clone(),
            fiat_codes: config.fiat_currencies.clone(),
        }
    }
}

#[async_trait]
impl RateSource for ExchangeRateApiSource {
    fn name(&self) -> &str {
        "ExchangeRate-API"
    }

    #[instrument(name = "ExchangeRateFetch", skip(self))]
    async fn fetch_rates(&self) -> Result<HashMap<String, f64>, CoreError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CoreError::ApiRequest {
                reason: format!("missing API key (set {ENV_EXCHANGERATE_API_KEY})"),
            });
        };

        // Key travels in the path; errors must not echo this URL.
        let url = format!("{}/{api_key}/latest/{}", self.base_url, self.base_currency);
        let data = get_json(&self.client, self.name(), &url, &[]).await?;

        if data.get("result").and_then(|r| r.as_str()) != Some("success") {
            let error_type = data
                .get("error-type")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown error");
            return Err(CoreError::ApiRequest {
                reason: format!("application error: {error_type}"),
            });
        }

        let Some(rates) = data.get("conversion_rates").and_then(|r| r.as_object()) else {
            return Err(CoreError::ApiRequest {
                reason: "response missing conversion_rates".to_string(),
            });
        };

        let mut result = HashMap::new();
        for code in &self.fiat_codes {
            if let Some(rate) = rates.get(code).and_then(|r| r.as_f64()) {
                result.insert(format!("{code}_{}", self.base_currency), rate);
            }
        }
        debug!(count = result.len(), "ExchangeRate-API quotes resolved");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_before_any_network_call() {
        // Unroutable base URL: a network attempt would error differently.
        let config = AppConfig::default();
        let source = ExchangeRateApiSource::new("http://192.0.2.1", None, &config);

        let err = source.fetch_rates().await.unwrap_err();
        match err {
            CoreError::ApiRequest { reason } => {
                assert!(reason.contains("missing API key"), "got: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
