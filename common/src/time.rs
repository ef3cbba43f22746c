//! Time utilities and clocks.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Timing defaults.
pub mod constants {
    use super::Duration;

    /// Default cache TTL (5 minutes).
    pub fn default_cache_ttl() -> Duration {
        Duration::minutes(5)
    }

    /// Default per-endpoint request timeout (8 seconds).
    pub fn default_request_timeout() -> std::time::Duration {
        std::time::Duration::from_millis(8000)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Check if something stamped at `timestamp` is older than `ttl` at `now`.
///
/// Exactly `ttl` old is still fresh.
pub fn is_older_than(timestamp: Timestamp, ttl: Duration, now: Timestamp) -> bool {
    now.signed_duration_since(timestamp) > ttl
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current = *current + by;
    }

    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_older_than_boundary() {
        let now = now();
        let ttl = Duration::minutes(5);

        assert!(!is_older_than(now - ttl, ttl, now));
        assert!(is_older_than(now - ttl - Duration::milliseconds(1), ttl, now));
        assert!(!is_older_than(now, ttl, now));
    }

    #[test]
    fn test_manual_clock() {
        let start = now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now(), start + Duration::seconds(30));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
