//! Endpoint fallback chain for fetching rate snapshots.

use std::sync::Arc;
use std::time::Duration;

use ratekeeper_common::{constants, RateSnapshot};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::CacheStore;
use crate::config::RatesConfig;
use crate::error::{EndpointError, FetchError, FetchResult};
use crate::provider;
use crate::transport::{Endpoint, HttpTransport, TransportError};

/// Result of a fetch that may fall back to cached rates.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A new snapshot from the network.
    Fresh(RateSnapshot),
    /// The network failed; a cached snapshot within TTL is served instead.
    Cached {
        snapshot: RateSnapshot,
        error: FetchError,
    },
    /// The network failed and no valid cache exists.
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn snapshot(&self) -> Option<&RateSnapshot> {
        match self {
            FetchOutcome::Fresh(snapshot) | FetchOutcome::Cached { snapshot, .. } => {
                Some(snapshot)
            }
            FetchOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Fresh(_) => None,
            FetchOutcome::Cached { error, .. } | FetchOutcome::Failed(error) => Some(error),
        }
    }
}

/// Tries endpoints in order until one yields a valid snapshot.
///
/// Each `fetch` attempts every endpoint at most once, strictly one at a
/// time, and stops at the first success.
pub struct RateFetcher {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<CacheStore>,
    endpoints: Vec<Endpoint>,
    custom_endpoint: Option<Endpoint>,
    timeout: Duration,
}

impl RateFetcher {
    /// Create a fetcher over an ordered endpoint list.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: Arc<CacheStore>,
        endpoints: Vec<Endpoint>,
    ) -> Self {
        Self {
            transport,
            cache,
            endpoints,
            custom_endpoint: None,
            timeout: constants::default_request_timeout(),
        }
    }

    /// Create a fetcher with the configured providers, custom endpoint and timeout.
    pub fn from_config(
        config: &RatesConfig,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<CacheStore>,
    ) -> Self {
        let fetcher = Self::new(transport, cache, config.default_endpoints())
            .with_timeout(config.request_timeout);
        match &config.custom_endpoint {
            Some(url) => fetcher.with_custom_endpoint(url.clone()),
            None => fetcher,
        }
    }

    /// Set the per-endpoint timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set an endpoint to try before all others.
    pub fn with_custom_endpoint(mut self, url: impl Into<String>) -> Self {
        self.custom_endpoint = Some(Endpoint::new(url));
        self
    }

    /// The full chain in the order it is tried.
    pub fn endpoint_chain(&self) -> impl Iterator<Item = &Endpoint> {
        self.custom_endpoint.iter().chain(self.endpoints.iter())
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Fetch a fresh snapshot, saving it to the cache on success.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> FetchResult<RateSnapshot> {
        let mut last_error: Option<EndpointError> = None;

        for (attempt, endpoint) in self.endpoint_chain().enumerate() {
            match self.fetch_endpoint(endpoint).await {
                Ok(snapshot) => {
                    info!(
                        endpoint = endpoint.redacted_url(),
                        attempt,
                        base = %snapshot.base(),
                        currencies = snapshot.rates().len(),
                        "Fetched exchange rates"
                    );
                    self.cache.save(&snapshot);
                    return Ok(snapshot);
                }
                Err(e) => {
                    warn!(
                        endpoint = endpoint.redacted_url(),
                        attempt,
                        code = e.error_code(),
                        error = %e,
                        "Failed to fetch from endpoint"
                    );
                    last_error = Some(e);
                }
            }
        }

        let err = match last_error {
            Some(last) => FetchError::classify(&last),
            None => FetchError::NoEndpoints,
        };
        error!(error = %err, "All rate endpoints failed");
        Err(err)
    }

    /// Fetch, serving the cached snapshot if the network fails and it is within TTL.
    ///
    /// [`RatesState::refresh`](crate::state::RatesState::refresh) is built on this.
    pub async fn fetch_or_cached(&self) -> FetchOutcome {
        match self.fetch().await {
            Ok(snapshot) => FetchOutcome::Fresh(snapshot),
            Err(error) => match self.cache.valid_snapshot() {
                Some(snapshot) => {
                    info!(
                        fetched_at = %snapshot.timestamp(),
                        "Serving cached rates after fetch failure"
                    );
                    FetchOutcome::Cached { snapshot, error }
                }
                None => FetchOutcome::Failed(error),
            },
        }
    }

    async fn fetch_endpoint(&self, endpoint: &Endpoint) -> Result<RateSnapshot, EndpointError> {
        let timeout_ms = self.timeout.as_millis() as u64;

        // On expiry the request future is dropped here, which aborts it.
        let response = tokio::time::timeout(self.timeout, self.transport.get(endpoint))
            .await
            .map_err(|_| EndpointError::Timeout { timeout_ms })?
            .map_err(|e| match e {
                TransportError::Timeout => EndpointError::Timeout { timeout_ms },
                TransportError::Connect(msg) => EndpointError::Network(msg),
                TransportError::Other(msg) => EndpointError::Transport(msg),
            })?;

        if !response.is_success() {
            return Err(EndpointError::Http {
                status: response.status,
                reason: response.reason,
            });
        }

        debug!(
            endpoint = endpoint.redacted_url(),
            bytes = response.body.len(),
            "Received rate payload"
        );
        Ok(provider::normalize_bytes(&response.body, self.cache.now())?)
    }
}
