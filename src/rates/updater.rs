//! Orchestrates one refresh cycle across all configured quote sources.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::store::RatesStore;
use crate::errors::CoreError;
use crate::providers::RateSource;

/// Outcome of one `run_update` cycle.
#[derive(Debug)]
pub struct UpdateSummary {
    /// Distinct pairs in the merged result across all sources.
    pub total: usize,
    /// One labeled entry per failed source.
    pub errors: Vec<String>,
    /// Cache write timestamp, `None` when nothing was fetched and no file
    /// was touched.
    pub last_refresh: Option<DateTime<Utc>>,
}

pub struct RatesUpdater {
    sources: Vec<Box<dyn RateSource>>,
    store: RatesStore,
}

impl RatesUpdater {
    pub fn new(sources: Vec<Box<dyn RateSource>>, store: RatesStore) -> Self {
        RatesUpdater { sources, store }
    }

    pub fn store(&self) -> &RatesStore {
        &self.store
    }

    /// Tries every source exactly once, in order. A source failure is
    /// recorded and does not stop the remaining sources; their results are
    /// still persisted. When two sources report the same pair, the later
    /// source in iteration order wins.
    pub async fn run_update(&self) -> Result<UpdateSummary, CoreError> {
        info!("Starting rates update");
        let mut all_rates: HashMap<String, f64> = HashMap::new();
        let mut source_of: HashMap<String, String> = HashMap::new();
        let mut errors = Vec::new();

        for source in &self.sources {
            let name = source.name();
            match source.fetch_rates().await {
                Ok(rates) => {
                    info!(source = name, count = rates.len(), "source fetch OK");
                    if rates.is_empty() {
                        continue;
                    }
                    // History first, so each source's contribution stays
                    // attributable even if a later source overwrites the pair
                    // in the merged cache.
                    self.store.append_history(&rates, name)?;
                    for pair in rates.keys() {
                        source_of.insert(pair.clone(), name.to_string());
                    }
                    all_rates.extend(rates);
                }
                Err(CoreError::ApiRequest { reason }) => {
                    warn!(source = name, error = %reason, "source fetch failed");
                    errors.push(format!("{name}: {reason}"));
                }
                Err(other) => {
                    warn!(source = name, error = %other, "source failed unexpectedly");
                    errors.push(format!("{name}: unexpected error: {other}"));
                }
            }
        }

        if all_rates.is_empty() {
            warn!("No rates were fetched; cache left untouched");
            return Ok(UpdateSummary {
                total: 0,
                errors,
                last_refresh: None,
            });
        }

        let last_refresh = self.store.update_cache(&all_rates, &source_of)?;
        info!(total = all_rates.len(), "cache updated");
        Ok(UpdateSummary {
            total: all_rates.len(),
            errors,
            last_refresh: Some(last_refresh),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct FixedSource {
        name: &'static str,
        rates: Vec<(&'static str, f64)>,
    }

    #[async_trait]
    impl RateSource for FixedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_rates(&self) -> Result<HashMap<String, f64>, CoreError> {
            Ok(self
                .rates
                .iter()
                .map(|(p, r)| (p.to_string(), *r))
                .collect())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl RateSource for FailingSource {
        fn name(&self) -> &str {
            "Broken"
        }

        async fn fetch_rates(&self) -> Result<HashMap<String, f64>, CoreError> {
            Err(CoreError::ApiRequest {
                reason: "request timed out".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn partial_failure_keeps_successful_results() {
        let dir = tempdir().unwrap();
        let updater = RatesUpdater::new(
            vec![
                Box::new(FixedSource {
                    name: "Good",
                    rates: vec![("BTC_USD", 50000.0), ("ETH_USD", 3000.0), ("SOL_USD", 150.0)],
                }),
                Box::new(FailingSource),
            ],
            RatesStore::new(dir.path()),
        );

        let summary = updater.run_update().await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("Broken:"));
        assert!(summary.last_refresh.is_some());

        let cache = updater.store().load_cache().unwrap();
        assert_eq!(cache.pairs.len(), 3);
        assert_eq!(cache.pairs["BTC_USD"].source, "Good");
    }

    #[tokio::test]
    async fn all_sources_failing_touches_no_files() {
        let dir = tempdir().unwrap();
        let store = RatesStore::new(dir.path());
        store
            .update_cache(
                &[("BTC_USD".to_string(), 1.0)].into_iter().collect(),
                &HashMap::new(),
            )
            .unwrap();
        let before = store.load_cache().unwrap();

        let updater = RatesUpdater::new(
            vec![Box::new(FailingSource)],
            RatesStore::new(dir.path()),
        );
        let summary = updater.run_update().await.unwrap();

        assert_eq!(summary.total, 0);
        assert!(summary.last_refresh.is_none());
        let after = updater.store().load_cache().unwrap();
        assert_eq!(after.last_refresh, before.last_refresh);
        assert_eq!(after.pairs.len(), before.pairs.len());
        assert!(updater.store().load_history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn later_source_wins_shared_pairs() {
        let dir = tempdir().unwrap();
        let updater = RatesUpdater::new(
            vec![
                Box::new(FixedSource {
                    name: "First",
                    rates: vec![("BTC_USD", 1.0)],
                }),
                Box::new(FixedSource {
                    name: "Second",
                    rates: vec![("BTC_USD", 2.0)],
                }),
            ],
            RatesStore::new(dir.path()),
        );

        let summary = updater.run_update().await.unwrap();
        assert_eq!(summary.total, 1);

        let cache = updater.store().load_cache().unwrap();
        assert_eq!(cache.pairs["BTC_USD"].rate, 2.0);
        assert_eq!(cache.pairs["BTC_USD"].source, "Second");

        // Both contributions remain attributable in history
        let history = updater.store().load_history().unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn empty_source_result_is_success_without_writes() {
        let dir = tempdir().unwrap();
        let updater = RatesUpdater::new(
            vec![Box::new(FixedSource {
                name: "Empty",
                rates: vec![],
            })],
            RatesStore::new(dir.path()),
        );

        let summary = updater.run_update().await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(summary.errors.is_empty());
        assert!(summary.last_refresh.is_none());
    }
}
