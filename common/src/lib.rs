//! Ratekeeper Common Types
//!
//! Shared types for the Ratekeeper currency converter: currency codes and
//! reference data, base-relative rate tables, immutable rate snapshots, and
//! clocks.

pub mod currency;
pub mod error;
pub mod rates;
pub mod time;

pub use currency::*;
pub use error::*;
pub use rates::*;
pub use time::*;
