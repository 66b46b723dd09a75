use std::path::PathBuf;
use std::{env, fs};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ENV_EXCHANGERATE_API_KEY: &str = "EXCHANGERATE_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateApiConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub coingecko: Option<CoinGeckoConfig>,
    pub exchangerate: Option<ExchangeRateApiConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            coingecko: Some(CoinGeckoConfig {
                base_url: "https://api.coingecko.com/api/v3".to_string(),
            }),
            exchangerate: Some(ExchangeRateApiConfig {
                base_url: "https://v6.exchangerate-api.com/v6".to_string(),
            }),
        }
    }
}

/// Process-wide settings, built once at startup and passed by reference to
/// every component that needs them.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding every durable JSON file. Defaults to the platform
    /// data dir when unset.
    pub data_path: Option<String>,
    pub rates_ttl_seconds: u64,
    pub default_base_currency: String,
    /// Fiat codes requested from the fiat source, quoted against USD.
    pub fiat_currencies: Vec<String>,
    /// Crypto codes requested from the crypto source, quoted against USD.
    pub crypto_currencies: Vec<String>,
    pub request_timeout_seconds: u64,
    pub providers: ProvidersConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_path: None,
            rates_ttl_seconds: 300,
            default_base_currency: "USD".to_string(),
            fiat_currencies: vec!["EUR".to_string(), "GBP".to_string(), "RUB".to_string()],
            crypto_currencies: vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()],
            request_timeout_seconds: 10,
            providers: ProvidersConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to built-in
    /// defaults when no file exists yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "valutahub", "valutahub")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Directory for users, portfolios, session, and rate files.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "valutahub", "valutahub")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Credential for the fiat source, taken from the environment so it never
    /// lands in the config file. Absence makes that source alone fail.
    pub fn exchangerate_api_key(&self) -> Option<String> {
        env::var(ENV_EXCHANGERATE_API_KEY)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_settings() {
        let config = AppConfig::default();
        assert_eq!(config.rates_ttl_seconds, 300);
        assert_eq!(config.default_base_currency, "USD");
        assert_eq!(config.request_timeout_seconds, 10);
        assert!(config.providers.coingecko.is_some());
        assert!(config.providers.exchangerate.is_some());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let yaml_str = r#"
rates_ttl_seconds: 60
data_path: "/tmp/valutahub-test"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.rates_ttl_seconds, 60);
        assert_eq!(config.data_path.as_deref(), Some("/tmp/valutahub-test"));
        // Untouched fields keep defaults
        assert_eq!(config.default_base_currency, "USD");
        assert_eq!(config.crypto_currencies, vec!["BTC", "ETH", "SOL"]);
    }

    #[test]
    fn custom_data_path_wins() {
        let config = AppConfig {
            data_path: Some("/custom/path".to_string()),
            ..Default::default()
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/custom/path"));
    }

    #[test]
    fn provider_overrides_deserialize() {
        let yaml_str = r#"
providers:
  coingecko:
    base_url: "http://localhost:9000"
  exchangerate:
    base_url: "http://localhost:9001"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(
            config.providers.coingecko.unwrap().base_url,
            "http://localhost:9000"
        );
    }
}
