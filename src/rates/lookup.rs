//! Staleness-aware rate resolution with inverse-pair fallback.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::store::RateCache;
use super::updater::RatesUpdater;
use crate::config::AppConfig;
use crate::currency::{get_currency, CurrencyCode};
use crate::errors::CoreError;

/// A rate resolved from the cache, either stored directly or derived as the
/// reciprocal of the opposite direction.
#[derive(Debug, Clone)]
pub struct ResolvedRate {
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    /// True when the rate was derived from the inverse pair.
    pub derived: bool,
}

/// Looks up `FROM_TO` directly, falling back to the reciprocal of `TO_FROM`.
///
/// A stored inverse of exactly zero has no finite reciprocal and is treated
/// as no rate at all.
pub fn resolve_rate(
    cache: &RateCache,
    from: &CurrencyCode,
    to: &CurrencyCode,
) -> Result<ResolvedRate, CoreError> {
    let direct_key = format!("{from}_{to}");
    if let Some(entry) = cache.pairs.get(&direct_key) {
        debug!(pair = %direct_key, "direct rate hit");
        return Ok(ResolvedRate {
            rate: entry.rate,
            updated_at: entry.updated_at,
            derived: false,
        });
    }

    let inverse_key = format!("{to}_{from}");
    if let Some(entry) = cache.pairs.get(&inverse_key) {
        if entry.rate == 0.0 {
            return Err(CoreError::CurrencyNotFound(format!(
                "no finite rate for {from}_{to}"
            )));
        }
        debug!(pair = %inverse_key, "derived rate from inverse");
        return Ok(ResolvedRate {
            rate: 1.0 / entry.rate,
            updated_at: entry.updated_at,
            derived: true,
        });
    }

    Err(CoreError::CurrencyNotFound(format!(
        "no rate available for {from}_{to}"
    )))
}

/// The explicit quote operation. Applies the TTL staleness gate: a cache
/// older than `rates_ttl_seconds` triggers one synchronous refresh, and a
/// refresh that brings no usable improvement is an `ApiRequest` failure.
///
/// Trade operations deliberately bypass this gate and read the cache as-is.
pub async fn quote(
    config: &AppConfig,
    updater: &RatesUpdater,
    from: &CurrencyCode,
    to: &CurrencyCode,
) -> Result<ResolvedRate, CoreError> {
    get_currency(from)?;
    get_currency(to)?;

    let mut cache = updater.store().load_cache()?;

    let stale = cache.last_refresh.is_some_and(|last_refresh| {
        Utc::now() - last_refresh > Duration::seconds(config.rates_ttl_seconds as i64)
    });
    if stale {
        info!(
            ttl_seconds = config.rates_ttl_seconds,
            "cache is stale, attempting refresh"
        );
        let summary = updater.run_update().await?;
        if summary.total == 0 {
            return Err(CoreError::ApiRequest {
                reason: "could not refresh stale rates, try again later".to_string(),
            });
        }
        cache = updater.store().load_cache()?;
        return resolve_rate(&cache, from, to).map_err(|_| CoreError::ApiRequest {
            reason: format!("rates were refreshed but {from}_{to} is still unavailable"),
        });
    }

    resolve_rate(&cache, from, to)
}
