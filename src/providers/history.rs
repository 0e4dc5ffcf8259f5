//! In-process history store
//!
//! Readings are kept per rounded location and served back for date-range
//! queries. Intended for tests and single-node deployments that record the
//! readings they observe.

use super::{DateRange, HistoryStore, ProviderResult};
use crate::config::CacheConfig;
use crate::models::{Location, PollutantReading};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
pub struct InMemoryHistoryStore {
    /// Locations that agree to this many decimals share a history
    precision: u32,
    readings: RwLock<HashMap<String, Vec<PollutantReading>>>,
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl InMemoryHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Key locations exactly like the history cache does
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_precision(config.coordinate_precision)
    }

    #[must_use]
    pub fn with_precision(precision: u32) -> Self {
        Self {
            precision,
            readings: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Store readings observed at `location`
    pub async fn record(&self, location: &Location, readings: impl IntoIterator<Item = PollutantReading>) {
        let key = location.key(self.precision);
        let mut guard = self.readings.write().await;
        let entry = guard.entry(key.clone()).or_default();
        entry.extend(readings.into_iter().filter(PollutantReading::is_usable));
        debug!("History for {} now holds {} reading(s)", key, entry.len());
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn query(&self, location: &Location, range: DateRange) -> ProviderResult<Vec<PollutantReading>> {
        let guard = self.readings.read().await;
        let readings = guard
            .get(&location.key(self.precision))
            .map(|readings| {
                readings
                    .iter()
                    .filter(|r| range.contains(r.observed_at.date_naive()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(readings)
    }
}
