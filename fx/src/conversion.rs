//! Currency conversion over base-relative rate tables.
//!
//! All functions here are pure. A code missing from the table means the
//! current provider does not quote it; that yields `None`, never an error.

use ratekeeper_common::{CurrencyCode, RateSnapshot, RateTable, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rate to turn one unit of `from` into `to`.
///
/// Identity conversion is always 1, even for codes the table lacks.
pub fn exchange_rate(from: &CurrencyCode, to: &CurrencyCode, table: &RateTable) -> Option<f64> {
    if from == to {
        return Some(1.0);
    }

    let from_rate = table.get(from.as_str())?;
    let to_rate = table.get(to.as_str())?;

    // Both are quoted against the same base, so the base cancels out.
    Some(to_rate / from_rate)
}

/// Convert `amount` of `from` into `to`.
///
/// `None` for non-positive (or NaN) amounts, a missing table, or an
/// unquoted code.
pub fn convert(
    amount: f64,
    from: &CurrencyCode,
    to: &CurrencyCode,
    table: Option<&RateTable>,
) -> Option<f64> {
    if amount.is_nan() || amount <= 0.0 {
        return None;
    }
    let table = table?;

    if from == to {
        return Some(amount);
    }

    exchange_rate(from, to, table).map(|rate| amount * rate)
}

/// Rejected amount input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Please enter a valid amount.")]
    InvalidCharacters,

    #[error("Please enter a valid amount.")]
    MultipleSeparators,
}

/// Parse a user-typed amount.
///
/// Accepts digits with at most one `.` or `,` as decimal separator. Empty
/// input is zero.
pub fn parse_amount(raw: &str) -> Result<f64, AmountError> {
    let raw = raw.trim();
    if !raw.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return Err(AmountError::InvalidCharacters);
    }
    if raw.chars().filter(|&c| c == '.' || c == ',').count() > 1 {
        return Err(AmountError::MultipleSeparators);
    }

    let normalized = raw.replace(',', ".");
    if normalized.is_empty() || normalized == "." {
        return Ok(0.0);
    }
    let normalized = if normalized.starts_with('.') {
        format!("0{normalized}")
    } else {
        normalized
    };
    normalized
        .trim_end_matches('.')
        .parse::<f64>()
        .map_err(|_| AmountError::InvalidCharacters)
}

/// One user request to convert an amount.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionQuery {
    pub amount: f64,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

impl ConversionQuery {
    pub fn new(amount: f64, from: impl Into<CurrencyCode>, to: impl Into<CurrencyCode>) -> Self {
        Self {
            amount,
            from: from.into(),
            to: to.into(),
        }
    }

    /// Same amount, currencies exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            amount: self.amount,
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    /// Evaluate against a snapshot.
    pub fn evaluate(&self, snapshot: &RateSnapshot) -> Option<ConversionResult> {
        let rate = exchange_rate(&self.from, &self.to, snapshot.rates())?;
        let result = convert(self.amount, &self.from, &self.to, Some(snapshot.rates()))?;

        Some(ConversionResult {
            from: self.from.clone(),
            to: self.to.clone(),
            amount: self.amount,
            result,
            rate,
            timestamp: snapshot.timestamp(),
        })
    }
}

/// Derived outcome of a conversion. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub amount: f64,
    pub result: f64,
    /// Units of `to` per unit of `from`.
    pub rate: f64,
    /// When the snapshot used was fetched.
    pub timestamp: Timestamp,
}

impl ConversionResult {
    /// Rate in the opposite direction.
    pub fn inverse_rate(&self) -> f64 {
        1.0 / self.rate
    }
}
