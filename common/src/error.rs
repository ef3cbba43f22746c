//! Error types for rate data validation.

use crate::CurrencyCode;
use thiserror::Error;

/// A rate table that breaks the positive-finite or unit-base invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateTableError {
    /// A rate that is zero, negative, NaN or infinite.
    #[error("Invalid rate for {code}: {rate}")]
    InvalidRate { code: CurrencyCode, rate: f64 },

    /// The base currency is quoted at something other than 1.
    #[error("Base currency {base} quoted at {rate}, expected 1")]
    BaseNotUnit { base: CurrencyCode, rate: f64 },

    /// Empty currency code.
    #[error("Empty currency code")]
    EmptyCode,
}
