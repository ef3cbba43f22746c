//! Ratekeeper FX
//!
//! Exchange rate acquisition, caching and conversion for the Ratekeeper
//! currency converter.
//!
//! # Features
//!
//! - Ordered provider endpoints with per-endpoint timeout and fallback
//! - Normalization of differently shaped provider payloads
//! - Rate caching with a TTL over a pluggable key-value store
//! - Conversion through a common base and locale-aware formatting
//! - A query interface for the presentation layer
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratekeeper_fx::{CacheStore, ConversionQuery, FileStore, RateFetcher, RatesConfig, RatesState, ReqwestTransport};
//!
//! let config = RatesConfig::from_env();
//! let cache = Arc::new(CacheStore::new(Arc::new(FileStore::new(&config.data_dir)), config.cache_ttl));
//! let fetcher = RateFetcher::from_config(&config, Arc::new(ReqwestTransport::new()), cache);
//!
//! let state = RatesState::new(fetcher);
//! state.init().await;
//!
//! let result = state.convert(&ConversionQuery::new(100.0, "USD", "EUR"));
//! ```

pub mod cache;
pub mod config;
pub mod conversion;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod provider;
pub mod state;
pub mod storage;
pub mod transport;

pub use cache::{CacheStore, CachedSnapshot, CACHE_KEY, LEGACY_CACHE_KEY};
pub use config::RatesConfig;
pub use conversion::{
    convert, exchange_rate, parse_amount, AmountError, ConversionQuery, ConversionResult,
};
pub use error::{EndpointError, FetchError, FetchResult, FormatError, StorageError};
pub use fetcher::{FetchOutcome, RateFetcher};
pub use format::{format_amount, format_number, format_rate_line, Locale};
pub use provider::{normalize, normalize_bytes, ProviderShape};
pub use state::{RatesState, RatesView, RefreshOutcome};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use transport::{Endpoint, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
