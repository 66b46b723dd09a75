use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::{build_client, get_json, RateSource};
use crate::config::AppConfig;
use crate::errors::CoreError;

/// Fixed mapping from ticker codes to CoinGecko asset ids.
const CRYPTO_ID_MAP: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("DOGE", "dogecoin"),
    ("ADA", "cardano"),
];

/// Crypto quote source. Keyless; queries `/simple/price` for every configured
/// crypto code it can map to a CoinGecko id.
pub struct CoinGeckoSource {
    client: Client,
    base_url: String,
    base_currency: String,
    crypto_codes: Vec<String>,
}

impl CoinGeckoSource {
    pub fn new(base_url: &str, config: &AppConfig) -> Self {
        CoinGeckoSource {
            client: build_client(config.request_timeout_seconds),
            base_url: base_url.trim_end_matches('/').to_string(),
            base_currency: config.default_base_currency.clone(),
            crypto_codes: config.crypto_currencies.clone(),
        }
    }

    fn id_for(code: &str) -> Option<&'static str> {
        CRYPTO_ID_MAP
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, id)| *id)
    }
}

#[async_trait]
impl RateSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "CoinGecko"
    }

    #[instrument(name = "CoinGeckoFetch", skip(self))]
    async fn fetch_rates(&self) -> Result<HashMap<String, f64>, CoreError> {
        let ids: Vec<&str> = self
            .crypto_codes
            .iter()
            .filter_map(|code| Self::id_for(code))
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/simple/price", self.base_url);
        let vs = self.base_currency.to_lowercase();
        let ids_param = ids.join(",");
        let data = get_json(
            &self.client,
            self.name(),
            &url,
            &[("ids", ids_param.as_str()), ("vs_currencies", vs.as_str())],
        )
        .await?;

        // Response shape: {"bitcoin": {"usd": 59337.21}, ...}; ids the API
        // does not know are simply absent.
        let mut result = HashMap::new();
        for code in &self.crypto_codes {
            let Some(id) = Self::id_for(code) else {
                continue;
            };
            if let Some(rate) = data.get(id).and_then(|entry| entry.get(&vs)).and_then(|r| r.as_f64())
            {
                result.insert(format!("{code}_{}", self.base_currency), rate);
            }
        }
        debug!(count = result.len(), "CoinGecko quotes resolved");
        Ok(result)
    }
}
