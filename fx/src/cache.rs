//! Persistent rate snapshot cache with TTL-based staleness.

use std::sync::Arc;

use chrono::Duration;
use parking_lot::RwLock;
use ratekeeper_common::{
    is_older_than, Clock, CurrencyCode, RateSnapshot, RateTable, SystemClock, Timestamp,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::{load_json, save_json, KeyValueStore};

/// Storage key for the current cache format (`{rates, base, date, timestamp}`).
pub const CACHE_KEY: &str = "currency_rates_cache";

/// Storage key for the legacy cache format (`{rates, base, timestamp}`).
pub const LEGACY_CACHE_KEY: &str = "rates_cache_v1";

/// Persisted form of a snapshot. `timestamp` is epoch milliseconds.
///
/// Reads both the current and the legacy layout; `date` is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub rates: RateTable,
    pub base: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
}

impl From<&RateSnapshot> for CachedSnapshot {
    fn from(snapshot: &RateSnapshot) -> Self {
        Self {
            rates: snapshot.rates().clone(),
            base: snapshot.base().clone(),
            date: snapshot.date().map(str::to_string),
            timestamp: snapshot.timestamp(),
        }
    }
}

impl TryFrom<CachedSnapshot> for RateSnapshot {
    type Error = ratekeeper_common::RateTableError;

    fn try_from(cached: CachedSnapshot) -> Result<Self, Self::Error> {
        RateSnapshot::new(cached.base, cached.rates, cached.date, cached.timestamp)
    }
}

/// Check whether something stamped at `timestamp` is still within `ttl`.
///
/// Exactly `ttl` old is valid; one millisecond more is stale.
pub fn is_valid(timestamp: Timestamp, ttl: Duration, now: Timestamp) -> bool {
    !is_older_than(timestamp, ttl, now)
}

/// Rate cache over a key-value store.
///
/// Loads once on construction. The in-memory snapshot stays authoritative
/// for the session whether or not persisting it succeeds.
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    current: RwLock<Option<RateSnapshot>>,
}

impl CacheStore {
    /// Create a cache using the system clock.
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, Arc::new(SystemClock))
    }

    /// Create a cache with a custom clock.
    pub fn with_clock(store: Arc<dyn KeyValueStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let cache = Self {
            store,
            clock,
            ttl,
            current: RwLock::new(None),
        };

        let loaded = cache
            .load()
            .and_then(|cached| match RateSnapshot::try_from(cached) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(error = %e, "Ignoring cached rates that fail validation");
                    None
                }
            });

        if let Some(snapshot) = &loaded {
            info!(
                base = %snapshot.base(),
                currencies = snapshot.rates().len(),
                fetched_at = %snapshot.timestamp(),
                "Loaded cached rates"
            );
        }
        *cache.current.write() = loaded;
        cache
    }

    /// Read the persisted snapshot, preferring the current layout.
    pub fn load(&self) -> Option<CachedSnapshot> {
        if let Some(cached) = load_json::<CachedSnapshot>(self.store.as_ref(), CACHE_KEY) {
            return Some(cached);
        }
        let legacy = load_json::<CachedSnapshot>(self.store.as_ref(), LEGACY_CACHE_KEY);
        if legacy.is_some() {
            debug!(key = LEGACY_CACHE_KEY, "Using legacy cache entry");
        }
        legacy
    }

    /// Make `snapshot` current and persist it (best-effort).
    pub fn save(&self, snapshot: &RateSnapshot) {
        *self.current.write() = Some(snapshot.clone());

        let cached = CachedSnapshot::from(snapshot);
        if save_json(self.store.as_ref(), CACHE_KEY, &cached) {
            debug!(base = %snapshot.base(), "Persisted rates");
        }
    }

    /// Check a snapshot against this cache's TTL.
    pub fn is_valid(&self, snapshot: &RateSnapshot) -> bool {
        is_valid(snapshot.timestamp(), self.ttl, self.clock.now())
    }

    /// The in-memory snapshot, stale or not.
    pub fn current(&self) -> Option<RateSnapshot> {
        self.current.read().clone()
    }

    /// The in-memory snapshot, only while it is within TTL.
    pub fn valid_snapshot(&self) -> Option<RateSnapshot> {
        self.current().filter(|s| self.is_valid(s))
    }

    /// When the current snapshot was fetched.
    pub fn last_updated(&self) -> Option<Timestamp> {
        self.current.read().as_ref().map(RateSnapshot::timestamp)
    }

    /// No snapshot, or one older than the TTL.
    pub fn is_stale(&self) -> bool {
        match self.last_updated() {
            Some(ts) => !is_valid(ts, self.ttl, self.clock.now()),
            None => true,
        }
    }

    /// Codes quoted by the current snapshot, sorted.
    pub fn available_currencies(&self) -> Vec<CurrencyCode> {
        self.current
            .read()
            .as_ref()
            .map(|s| s.rates().codes().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget the snapshot in memory and in storage.
    pub fn clear(&self) {
        *self.current.write() = None;
        for key in [CACHE_KEY, LEGACY_CACHE_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to remove cached rates");
            }
        }
        info!("Cleared cached rates");
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current time according to this cache's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}
