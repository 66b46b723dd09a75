//! Persistence for the append-only rate history and the last-known-good
//! cache.
//!
//! Two independent files, each updated atomically on its own. A crash between
//! a history append and the cache write leaves history ahead of the cache,
//! which is fine: history is audit data, the cache is what lookups trust.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::store::{read_json_or, write_json_atomic};

pub const CACHE_FILE: &str = "rates.json";
pub const HISTORY_FILE: &str = "exchange_rates.json";

/// One cached directional rate. Only one direction per pair is ever stored;
/// the opposite direction is derived at lookup time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

/// The queryable last-known-good cache, keyed by `"BASE_QUOTE"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateCache {
    #[serde(default)]
    pub pairs: BTreeMap<String, RateEntry>,
    #[serde(default)]
    pub last_refresh: Option<DateTime<Utc>>,
}

fn empty_meta() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// One append-only history entry; never mutated or deleted after the write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(default = "empty_meta")]
    pub meta: serde_json::Value,
}

pub struct RatesStore {
    history_path: PathBuf,
    cache_path: PathBuf,
}

impl RatesStore {
    pub fn new(data_dir: &Path) -> Self {
        RatesStore {
            history_path: data_dir.join(HISTORY_FILE),
            cache_path: data_dir.join(CACHE_FILE),
        }
    }

    pub fn load_cache(&self) -> Result<RateCache, CoreError> {
        read_json_or(&self.cache_path, RateCache::default)
    }

    pub fn load_history(&self) -> Result<Vec<HistoryRecord>, CoreError> {
        read_json_or(&self.history_path, Vec::new)
    }

    /// Appends one record per pair, all sharing a single UTC timestamp, and
    /// rewrites the history file atomically. Duplicate ids from two writes of
    /// the same pair within one timestamp tick are benign.
    pub fn append_history(
        &self,
        rates: &HashMap<String, f64>,
        source: &str,
    ) -> Result<(), CoreError> {
        let mut history = self.load_history()?;
        let timestamp = Utc::now();
        let ts_str = timestamp.to_rfc3339();

        // Sorted pair order keeps the file deterministic for a given batch.
        let mut pairs: Vec<(&String, &f64)> = rates.iter().collect();
        pairs.sort_by_key(|(pair, _)| pair.as_str());

        for (pair, rate) in pairs {
            let Some((from, to)) = pair.split_once('_') else {
                return Err(CoreError::Storage(format!("malformed pair key '{pair}'")));
            };
            history.push(HistoryRecord {
                id: format!("{from}_{to}_{ts_str}"),
                from_currency: from.to_string(),
                to_currency: to.to_string(),
                rate: *rate,
                timestamp,
                source: source.to_string(),
                meta: empty_meta(),
            });
        }

        write_json_atomic(&self.history_path, &history)?;
        debug!(source, count = rates.len(), "history appended");
        Ok(())
    }

    /// Upserts the given pairs into the cache with a fresh `updated_at`,
    /// advances `last_refresh`, and rewrites the file atomically. Pairs not
    /// in `rates` are left untouched (merge-in-place, not full replace).
    /// Non-positive or non-finite rates are skipped, so every cached entry
    /// has `rate > 0`.
    pub fn update_cache(
        &self,
        rates: &HashMap<String, f64>,
        source_of: &HashMap<String, String>,
    ) -> Result<DateTime<Utc>, CoreError> {
        let mut cache = self.load_cache()?;
        let timestamp = Utc::now();

        for (pair, rate) in rates {
            if *rate <= 0.0 || !rate.is_finite() {
                warn!(pair = %pair, rate, "skipping unusable rate");
                continue;
            }
            cache.pairs.insert(
                pair.clone(),
                RateEntry {
                    rate: *rate,
                    updated_at: timestamp,
                    source: source_of
                        .get(pair)
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                },
            );
        }
        cache.last_refresh = Some(timestamp);

        write_json_atomic(&self.cache_path, &cache)?;
        debug!(count = rates.len(), "cache updated");
        Ok(timestamp)
    }
}
