//! Currency codes and the fixed registry that classifies them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// A validated, upper-cased currency code (`"USD"`, `"BTC"`).
///
/// Construction is the only validation point: 2 to 5 ASCII alphanumeric
/// characters, normalized to upper case. Once built, the code is always
/// well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, CoreError> {
        let code = code.trim().to_uppercase();
        if !(2..=5).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidArgument(format!(
                "currency code must be 2-5 alphanumeric characters, got '{code}'"
            )));
        }
        Ok(CurrencyCode(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CurrencyCode::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// Registry entry: what kind of currency a code denotes.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrencyInfo {
    Fiat {
        name: &'static str,
        issuing_country: &'static str,
    },
    Crypto {
        name: &'static str,
        algorithm: &'static str,
        market_cap: f64,
    },
}

impl CurrencyInfo {
    pub fn display_info(&self, code: &str) -> String {
        match self {
            CurrencyInfo::Fiat {
                name,
                issuing_country,
            } => format!("[FIAT] {code} - {name} (issuing: {issuing_country})"),
            CurrencyInfo::Crypto {
                name,
                algorithm,
                market_cap,
            } => format!("[CRYPTO] {code} - {name} (algo: {algorithm}, mcap: {market_cap:.2e})"),
        }
    }
}

#[rustfmt::skip]
const REGISTRY: &[(&str, CurrencyInfo)] = &[
    ("USD", CurrencyInfo::Fiat { name: "US Dollar", issuing_country: "United States" }),
    ("EUR", CurrencyInfo::Fiat { name: "Euro", issuing_country: "Eurozone" }),
    ("GBP", CurrencyInfo::Fiat { name: "Pound Sterling", issuing_country: "United Kingdom" }),
    ("RUB", CurrencyInfo::Fiat { name: "Russian Ruble", issuing_country: "Russia" }),
    ("JPY", CurrencyInfo::Fiat { name: "Japanese Yen", issuing_country: "Japan" }),
    ("CHF", CurrencyInfo::Fiat { name: "Swiss Franc", issuing_country: "Switzerland" }),
    ("CNY", CurrencyInfo::Fiat { name: "Renminbi", issuing_country: "China" }),
    ("BTC", CurrencyInfo::Crypto { name: "Bitcoin", algorithm: "SHA-256", market_cap: 1.2e12 }),
    ("ETH", CurrencyInfo::Crypto { name: "Ethereum", algorithm: "Ethash", market_cap: 5.0e11 }),
    ("SOL", CurrencyInfo::Crypto { name: "Solana", algorithm: "PoH", market_cap: 8.0e10 }),
    ("DOGE", CurrencyInfo::Crypto { name: "Dogecoin", algorithm: "Scrypt", market_cap: 2.0e10 }),
    ("ADA", CurrencyInfo::Crypto { name: "Cardano", algorithm: "Ouroboros", market_cap: 1.5e10 }),
];

/// Resolves a code against the registry.
///
/// Fails with [`CoreError::CurrencyNotFound`] for codes that pass syntactic
/// validation but are not registered for trading.
pub fn get_currency(code: &CurrencyCode) -> Result<&'static CurrencyInfo, CoreError> {
    REGISTRY
        .iter()
        .find(|(c, _)| *c == code.as_str())
        .map(|(_, info)| info)
        .ok_or_else(|| CoreError::CurrencyNotFound(code.as_str().to_string()))
}
