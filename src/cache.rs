//! In-process TTL cache with single-flight computation
//!
//! Each key owns a slot holding a [`OnceCell`]. The first caller for a key
//! runs the computation; callers arriving while it is in flight wait on the
//! same cell and reuse its result. A slot found expired is swapped for a
//! fresh one under the map lock, so exactly one caller starts the refresh.
//! Failed computations leave the cell empty and are retried by the next
//! caller.

use crate::models::Location;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::debug;

/// Cached engine operation, the first component of every key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Current,
    Forecast,
    History,
    Weather,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Current => "current",
            Operation::Forecast => "forecast",
            Operation::History => "history",
            Operation::Weather => "weather",
        }
    }
}

/// `operation:lat:lng[:extra...]` with coordinates rounded to a fixed precision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn new(operation: Operation, location: &Location, precision: u32) -> Self {
        Self(format!("{}:{}", operation.as_str(), location.key(precision)))
    }

    /// Append an extra parameter such as a day count
    #[must_use]
    pub fn with(mut self, extra: impl fmt::Display) -> Self {
        self.0.push(':');
        self.0.push_str(&extra.to_string());
        self
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct CacheEntry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

type Slot<V> = Arc<OnceCell<CacheEntry<V>>>;

pub struct SingleFlightCache<V> {
    name: &'static str,
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Slot<V>>>,
}

impl<V> SingleFlightCache<V> {
    #[must_use]
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, computing it at most once per TTL window
    #[tracing::instrument(name = "cache_get_or_compute", level = "debug", skip(self, key, compute), fields(cache = self.name, key = %key))]
    pub async fn get_or_compute<F, Fut, E>(&self, key: &CacheKey, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key);
        let mut computed = false;
        let entry = slot
            .get_or_try_init(|| {
                computed = true;
                async move {
                    let value = compute().await?;
                    Ok::<_, E>(CacheEntry {
                        value: Arc::new(value),
                        expires_at: Instant::now() + self.ttl,
                    })
                }
            })
            .await?;

        if computed {
            debug!("Cache miss, value computed");
        } else {
            debug!("Cache hit");
        }
        Ok(Arc::clone(&entry.value))
    }

    /// Drop the entry for `key`; the next caller recomputes
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove every expired entry
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|_, slot| slot.get().is_none_or(|entry| entry.expires_at > now));
        before - slots.len()
    }

    /// Number of keys currently held, including in-flight ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current slot for `key`, replacing it when its value has expired
    fn slot(&self, key: &CacheKey) -> Slot<V> {
        let now = Instant::now();
        let mut slots = self.lock();
        if let Some(slot) = slots.get(key) {
            let expired = slot.get().is_some_and(|entry| entry.expires_at <= now);
            if !expired {
                return Arc::clone(slot);
            }
            debug!(cache = self.name, %key, "Entry expired, starting refresh");
        }
        let slot: Slot<V> = Arc::new(OnceCell::new());
        slots.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot<V>>> {
        // The map is never left half-updated, so a poisoned lock is still usable
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
