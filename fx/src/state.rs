//! Query interface for the presentation layer.
//!
//! Mirrors what a UI reads: rates, base, loading, error, last update and
//! staleness, plus a `refresh` trigger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use ratekeeper_common::{CurrencyCode, RateSnapshot, RateTable, Timestamp};
use tracing::{debug, info};

use crate::cache::{is_valid, CacheStore};
use crate::conversion::{ConversionQuery, ConversionResult};
use crate::error::FetchError;
use crate::fetcher::{FetchOutcome, RateFetcher};
use crate::provider::DEFAULT_BASE;

/// Point-in-time view of the rate state.
#[derive(Debug, Clone, PartialEq)]
pub struct RatesView {
    /// Active table, or `None` before any data arrived.
    pub rates: Option<RateTable>,
    pub base: CurrencyCode,
    pub date: Option<String>,
    pub loading: bool,
    /// Outcome of the last refresh, if it failed.
    pub error: Option<FetchError>,
    pub last_updated: Option<Timestamp>,
    pub is_cache_stale: bool,
    /// Rates are shown despite the last refresh failing.
    pub using_cached: bool,
}

/// What a call to [`RatesState::refresh`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// New rates were published.
    Updated,
    /// Every endpoint failed; previous rates, if any, are kept.
    Failed(FetchError),
    /// Another refresh was already running; nothing was done.
    AlreadyInFlight,
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: Option<RateSnapshot>,
    error: Option<FetchError>,
}

/// Clears the in-flight flag even if the refresh future is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Rate state shared with the presentation layer.
pub struct RatesState {
    fetcher: RateFetcher,
    cache: Arc<CacheStore>,
    inner: RwLock<Inner>,
    in_flight: AtomicBool,
}

impl RatesState {
    /// Create the state, publishing whatever the cache loaded.
    pub fn new(fetcher: RateFetcher) -> Self {
        let cache = fetcher.cache().clone();
        let inner = Inner {
            snapshot: cache.current(),
            error: None,
        };

        Self {
            fetcher,
            cache,
            inner: RwLock::new(inner),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Startup: refresh when there is no cache or the cache is stale.
    ///
    /// Returns `None` when the cached rates are fresh enough to use as is.
    pub async fn init(&self) -> Option<RefreshOutcome> {
        let has_snapshot = self.inner.read().snapshot.is_some();
        if has_snapshot && !self.is_cache_stale() {
            debug!("Cached rates are fresh, skipping startup refresh");
            return None;
        }

        if has_snapshot {
            info!("Cached rates are stale, refreshing");
        }
        Some(self.refresh().await)
    }

    /// Fetch new rates.
    ///
    /// On failure the error is recorded and the previous rates stay visible.
    pub async fn refresh(&self) -> RefreshOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Refresh already in flight");
            return RefreshOutcome::AlreadyInFlight;
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.inner.write().error = None;

        match self.fetcher.fetch_or_cached().await {
            FetchOutcome::Fresh(snapshot) => {
                let mut inner = self.inner.write();
                inner.snapshot = Some(snapshot);
                inner.error = None;
                RefreshOutcome::Updated
            }
            FetchOutcome::Cached { snapshot, error } => {
                let mut inner = self.inner.write();
                inner.snapshot = Some(snapshot);
                inner.error = Some(error.clone());
                RefreshOutcome::Failed(error)
            }
            // An expired snapshot, if any, stays visible and is reported stale.
            FetchOutcome::Failed(error) => {
                self.inner.write().error = Some(error.clone());
                RefreshOutcome::Failed(error)
            }
        }
    }

    /// Current view.
    pub fn view(&self) -> RatesView {
        let inner = self.inner.read();
        let snapshot = inner.snapshot.as_ref();
        let last_updated = snapshot.map(RateSnapshot::timestamp);

        RatesView {
            rates: snapshot.map(|s| s.rates().clone()),
            base: snapshot
                .map(|s| s.base().clone())
                .unwrap_or_else(|| CurrencyCode::new(DEFAULT_BASE)),
            date: snapshot.and_then(|s| s.date().map(str::to_string)),
            loading: self.is_loading(),
            error: inner.error.clone(),
            last_updated,
            is_cache_stale: self.stale_at(last_updated),
            using_cached: inner.error.is_some() && snapshot.is_some(),
        }
    }

    /// The active snapshot.
    pub fn snapshot(&self) -> Option<RateSnapshot> {
        self.inner.read().snapshot.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// No data yet, or data older than the TTL.
    pub fn is_cache_stale(&self) -> bool {
        let last_updated = self.inner.read().snapshot.as_ref().map(RateSnapshot::timestamp);
        self.stale_at(last_updated)
    }

    /// Convert against the active snapshot.
    pub fn convert(&self, query: &ConversionQuery) -> Option<ConversionResult> {
        let inner = self.inner.read();
        query.evaluate(inner.snapshot.as_ref()?)
    }

    /// Codes the active snapshot quotes.
    pub fn available_currencies(&self) -> Vec<CurrencyCode> {
        self.inner
            .read()
            .snapshot
            .as_ref()
            .map(|s| s.rates().codes().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop rates from memory and storage.
    pub fn clear(&self) {
        self.cache.clear();
        let mut inner = self.inner.write();
        inner.snapshot = None;
        inner.error = None;
    }

    fn stale_at(&self, last_updated: Option<Timestamp>) -> bool {
        match last_updated {
            Some(ts) => !is_valid(ts, self.cache.ttl(), self.cache.now()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CACHE_KEY;
    use crate::storage::{KeyValueStore, MemoryStore};
    use crate::transport::mock::{MockReply, MockTransport};
    use crate::transport::Endpoint;
    use chrono::{Duration, TimeZone, Utc};
    use ratekeeper_common::ManualClock;

    const A: &str = "https://a.example.com/rates";
    const B: &str = "https://b.example.com/rates";
    const GOOD: &str = r#"{"base":"EUR","date":"2024-05-01","rates":{"USD":1.1,"EUR":1,"GBP":0.85}}"#;

    fn start() -> Timestamp {
        Utc.timestamp_millis_opt(1_714_521_600_000).unwrap()
    }

    struct Harness {
        transport: Arc<MockTransport>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new(transport: MockTransport) -> Self {
            Self {
                transport: Arc::new(transport),
                store: Arc::new(MemoryStore::new()),
                clock: Arc::new(ManualClock::new(start())),
            }
        }

        fn seed_cache(&self, json: &str) {
            self.store.set(CACHE_KEY, json).unwrap();
        }

        fn state(&self) -> RatesState {
            let store: Arc<dyn KeyValueStore> = self.store.clone();
            let cache = Arc::new(CacheStore::with_clock(
                store,
                Duration::minutes(5),
                self.clock.clone(),
            ));
            let fetcher = RateFetcher::new(
                self.transport.clone(),
                cache,
                vec![Endpoint::new(A), Endpoint::new(B)],
            )
            .with_timeout(std::time::Duration::from_millis(50));
            RatesState::new(fetcher)
        }
    }

    #[tokio::test]
    async fn test_empty_state() {
        let harness = Harness::new(MockTransport::new());
        let state = harness.state();

        let view = state.view();
        assert_eq!(view.rates, None);
        assert_eq!(view.base.as_str(), "EUR");
        assert!(view.is_cache_stale);
        assert!(!view.loading);
        assert!(view.error.is_none());
    }

    #[tokio::test]
    async fn test_init_without_cache_fetches() {
        let harness = Harness::new(MockTransport::new().on(A, MockReply::ok(GOOD)));
        let state = harness.state();

        assert_eq!(state.init().await, Some(RefreshOutcome::Updated));

        let view = state.view();
        assert_eq!(view.rates.as_ref().and_then(|r| r.get("GBP")), Some(0.85));
        assert_eq!(view.date.as_deref(), Some("2024-05-01"));
        assert_eq!(view.last_updated, Some(start()));
        assert!(!view.is_cache_stale);
        assert!(!view.using_cached);
    }

    #[tokio::test]
    async fn test_init_with_fresh_cache_skips_network() {
        let harness = Harness::new(MockTransport::new().on(A, MockReply::ok(GOOD)));
        harness.seed_cache(r#"{"base":"EUR","rates":{"USD":1.2},"timestamp":1714521540000}"#);
        let state = harness.state();

        assert_eq!(state.init().await, None);
        assert!(harness.transport.calls().is_empty());
        assert_eq!(
            state.view().rates.and_then(|r| r.get("USD")),
            Some(1.2)
        );
    }

    #[tokio::test]
    async fn test_init_with_stale_cache_refreshes() {
        let harness = Harness::new(MockTransport::new().on(A, MockReply::ok(GOOD)));
        // Ten minutes old.
        harness.seed_cache(r#"{"base":"EUR","rates":{"USD":1.2},"timestamp":1714521000000}"#);
        let state = harness.state();
        assert!(state.is_cache_stale());

        assert_eq!(state.init().await, Some(RefreshOutcome::Updated));
        assert_eq!(state.view().rates.and_then(|r| r.get("USD")), Some(1.1));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cached_rates() {
        let harness = Harness::new(
            MockTransport::new()
                .on(A, MockReply::Unreachable)
                .on(B, MockReply::status(500)),
        );
        // One minute old.
        harness.seed_cache(r#"{"base":"EUR","rates":{"USD":1.1},"timestamp":1714521540000}"#);
        let state = harness.state();

        let outcome = state.refresh().await;
        assert!(matches!(outcome, RefreshOutcome::Failed(FetchError::Upstream(_))));

        let view = state.view();
        assert!(view.error.is_some());
        let expected: RateTable = [("USD", 1.1)].into_iter().collect();
        assert_eq!(view.rates, Some(expected));
        assert!(view.using_cached);
        assert!(!view.is_cache_stale);
        assert!(harness.store.get(CACHE_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_expired_rates_marked_stale() {
        let harness = Harness::new(MockTransport::new());
        // Ten minutes old.
        harness.seed_cache(r#"{"base":"EUR","rates":{"USD":1.2},"timestamp":1714521000000}"#);
        let state = harness.state();

        assert_eq!(
            state.refresh().await,
            RefreshOutcome::Failed(FetchError::NetworkUnreachable)
        );

        let view = state.view();
        assert_eq!(view.rates.and_then(|r| r.get("USD")), Some(1.2));
        assert!(view.using_cached);
        assert!(view.is_cache_stale);
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let harness = Harness::new(MockTransport::new().on(A, MockReply::Hang).on(B, MockReply::Hang));
        let state = harness.state();

        assert_eq!(
            state.refresh().await,
            RefreshOutcome::Failed(FetchError::AllTimedOut)
        );
        assert_eq!(state.view().error, Some(FetchError::AllTimedOut));
        assert_eq!(state.view().rates, None);

        harness.transport.set(B, MockReply::ok(GOOD));
        assert_eq!(state.refresh().await, RefreshOutcome::Updated);
        assert!(state.view().error.is_none());
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_rejected() {
        let harness = Harness::new(MockTransport::new().on(
            A,
            MockReply::Delayed {
                delay: std::time::Duration::from_millis(20),
                status: 200,
                body: GOOD.to_string(),
            },
        ));
        let state = harness.state();

        let (first, second) = tokio::join!(state.refresh(), async {
            tokio::task::yield_now().await;
            let loading = state.is_loading();
            (loading, state.refresh().await)
        });

        assert_eq!(first, RefreshOutcome::Updated);
        assert_eq!(second, (true, RefreshOutcome::AlreadyInFlight));
        assert_eq!(harness.transport.calls().len(), 1);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_staleness_follows_clock() {
        let harness = Harness::new(MockTransport::new().on(A, MockReply::ok(GOOD)));
        let state = harness.state();
        state.refresh().await;

        harness.clock.advance(Duration::minutes(5));
        assert!(!state.is_cache_stale());
        harness.clock.advance(Duration::milliseconds(1));
        assert!(state.is_cache_stale());
        assert!(state.view().rates.is_some());
    }

    #[tokio::test]
    async fn test_convert_and_clear() {
        let harness = Harness::new(MockTransport::new().on(A, MockReply::ok(GOOD)));
        let state = harness.state();
        assert!(state.convert(&ConversionQuery::new(100.0, "USD", "EUR")).is_none());

        state.refresh().await;
        let result = state
            .convert(&ConversionQuery::new(100.0, "USD", "EUR"))
            .unwrap();
        assert!((result.result - 100.0 / 1.1).abs() < 1e-9);
        assert_eq!(state.available_currencies().len(), 3);

        state.clear();
        assert!(state.snapshot().is_none());
        assert!(harness.store.get(CACHE_KEY).unwrap().is_none());
    }
}
