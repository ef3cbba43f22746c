//! Rate acquisition error types.

use ratekeeper_common::RateTableError;
use thiserror::Error;

/// Upstream payload that does not have the shape of a rate response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid API response format: {0}")]
pub struct FormatError(pub String);

impl FormatError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<RateTableError> for FormatError {
    fn from(err: RateTableError) -> Self {
        Self(err.to_string())
    }
}

/// Failure of a single endpoint attempt.
///
/// These are logged and only advance the endpoint loop; they never reach
/// the caller on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// Payload did not normalize.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Request aborted after the per-endpoint timeout.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Host unreachable, DNS failure, connection refused.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    /// Any other transport failure.
    #[error("{0}")]
    Transport(String),
}

impl EndpointError {
    /// Get error code for log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            EndpointError::Format(_) => "FORMAT_ERROR",
            EndpointError::Timeout { .. } => "TIMEOUT",
            EndpointError::Network(_) => "NETWORK_ERROR",
            EndpointError::Http { .. } => "HTTP_ERROR",
            EndpointError::Transport(_) => "TRANSPORT_ERROR",
        }
    }
}

/// Terminal failure of a whole fetch: every endpoint failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The last endpoint failure was a timeout.
    #[error("All APIs timed out - please check your internet connection")]
    AllTimedOut,

    /// The last endpoint failure was a connectivity failure.
    #[error("Network error - all APIs are unreachable")]
    NetworkUnreachable,

    /// The last endpoint failure was anything else.
    #[error("Failed to fetch exchange rates: {0}")]
    Upstream(String),

    /// Nothing to try.
    #[error("No exchange rate endpoints configured")]
    NoEndpoints,
}

impl FetchError {
    /// Classify the last endpoint error of an exhausted chain.
    pub fn classify(last: &EndpointError) -> Self {
        match last {
            EndpointError::Timeout { .. } => FetchError::AllTimedOut,
            EndpointError::Network(_) => FetchError::NetworkUnreachable,
            other => FetchError::Upstream(other.to_string()),
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Persistence failure. Always non-fatal.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage serialization error for key {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_last_error() {
        assert_eq!(
            FetchError::classify(&EndpointError::Timeout { timeout_ms: 8000 }),
            FetchError::AllTimedOut
        );
        assert_eq!(
            FetchError::classify(&EndpointError::Network("connection refused".into())),
            FetchError::NetworkUnreachable
        );

        let http = FetchError::classify(&EndpointError::Http {
            status: 503,
            reason: "Service Unavailable".into(),
        });
        assert_eq!(
            http.to_string(),
            "Failed to fetch exchange rates: HTTP 503: Service Unavailable"
        );
    }

    #[test]
    fn test_format_error_passes_through() {
        let err = EndpointError::from(FormatError::new("missing rates"));
        assert_eq!(err.error_code(), "FORMAT_ERROR");
        assert_eq!(
            FetchError::classify(&err).to_string(),
            "Failed to fetch exchange rates: Invalid API response format: missing rates"
        );
    }
}
