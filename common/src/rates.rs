//! Rate tables and immutable rate snapshots.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

use crate::{CurrencyCode, RateTableError, Timestamp};

/// Tolerance when checking that the base currency is quoted at 1.
const UNIT_TOLERANCE: f64 = 1e-9;

/// Exchange rates keyed by currency, all relative to one base currency.
///
/// Serializes as a plain `{code: rate}` object with sorted keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTable(BTreeMap<CurrencyCode, f64>);

impl RateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a rate.
    pub fn insert(&mut self, code: impl Into<CurrencyCode>, rate: f64) {
        self.0.insert(code.into(), rate);
    }

    /// Get the rate for a code.
    pub fn get(&self, code: &str) -> Option<f64> {
        self.0.get(code).copied()
    }

    /// Check if the table quotes a code.
    pub fn contains(&self, code: &str) -> bool {
        self.0.contains_key(code)
    }

    /// Remove a code, returning its rate.
    pub fn remove(&mut self, code: &str) -> Option<f64> {
        self.0.remove(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Quoted codes in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &CurrencyCode> {
        self.0.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, CurrencyCode, f64> {
        self.0.iter()
    }

    /// Check the table invariants against a base currency.
    ///
    /// Every rate must be positive and finite, and the base, if quoted,
    /// must be quoted at 1.
    pub fn validate(&self, base: &CurrencyCode) -> Result<(), RateTableError> {
        for (code, &rate) in &self.0 {
            if code.as_str().is_empty() {
                return Err(RateTableError::EmptyCode);
            }
            if !rate.is_finite() || rate <= 0.0 {
                return Err(RateTableError::InvalidRate {
                    code: code.clone(),
                    rate,
                });
            }
        }

        if let Some(rate) = self.get(base.as_str()) {
            if (rate - 1.0).abs() > UNIT_TOLERANCE {
                return Err(RateTableError::BaseNotUnit {
                    base: base.clone(),
                    rate,
                });
            }
        }

        Ok(())
    }
}

impl FromIterator<(CurrencyCode, f64)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (CurrencyCode, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, f64)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(code, rate)| (CurrencyCode::new(code), rate))
            .collect()
    }
}

impl<'a> IntoIterator for &'a RateTable {
    type Item = (&'a CurrencyCode, &'a f64);
    type IntoIter = btree_map::Iter<'a, CurrencyCode, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One timestamped set of rates for a single base currency.
///
/// Snapshots are never mutated; a newer fetch produces a new snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    base: CurrencyCode,
    rates: RateTable,
    date: Option<String>,
    timestamp: Timestamp,
}

impl RateSnapshot {
    /// Create a snapshot, validating the table against the base.
    pub fn new(
        base: CurrencyCode,
        rates: RateTable,
        date: Option<String>,
        timestamp: Timestamp,
    ) -> Result<Self, RateTableError> {
        rates.validate(&base)?;
        Ok(Self {
            base,
            rates,
            date,
            timestamp,
        })
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    /// Provider-reported rate date, if any.
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// When the snapshot was fetched.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Age of the snapshot relative to `now`.
    pub fn age(&self, now: Timestamp) -> chrono::Duration {
        now.signed_duration_since(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn table() -> RateTable {
        [("EUR", 1.0), ("USD", 1.1), ("GBP", 0.85)].into_iter().collect()
    }

    #[test]
    fn test_table_lookup() {
        let t = table();
        assert_eq!(t.get("USD"), Some(1.1));
        assert!(t.contains("GBP"));
        assert!(!t.contains("JPY"));

        let codes: Vec<&str> = t.codes().map(|c| c.as_str()).collect();
        assert_eq!(codes, vec!["EUR", "GBP", "USD"]);
    }

    #[test]
    fn test_table_serializes_as_object() {
        let json = serde_json::to_value(table()).unwrap();
        assert_eq!(json["USD"], 1.1);

        let back: RateTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table());
    }

    #[test]
    fn test_validate_rejects_bad_rates() {
        let eur = CurrencyCode::eur();
        assert!(table().validate(&eur).is_ok());

        let mut zero = table();
        zero.insert("JPY", 0.0);
        assert!(matches!(
            zero.validate(&eur),
            Err(RateTableError::InvalidRate { .. })
        ));

        let mut nan = table();
        nan.insert("JPY", f64::NAN);
        assert!(nan.validate(&eur).is_err());

        let mut negative = table();
        negative.insert("JPY", -3.0);
        assert!(negative.validate(&eur).is_err());
    }

    #[test]
    fn test_validate_base_must_be_unit() {
        let mut t = table();
        t.insert("EUR", 1.2);
        assert!(matches!(
            t.validate(&CurrencyCode::eur()),
            Err(RateTableError::BaseNotUnit { .. })
        ));

        // Base not quoted at all is fine.
        t.remove("EUR");
        assert!(t.validate(&CurrencyCode::eur()).is_ok());
    }

    #[test]
    fn test_snapshot_age() {
        let fetched = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let snapshot =
            RateSnapshot::new(CurrencyCode::eur(), table(), None, fetched).unwrap();

        let later = fetched + chrono::Duration::seconds(90);
        assert_eq!(snapshot.age(later), chrono::Duration::seconds(90));
        assert_eq!(snapshot.date(), None);
    }
}
