//! Upstream provider payloads and their normalization into snapshots.
//!
//! Providers are told apart by payload structure, not by endpoint: any
//! endpoint that answers in a known shape normalizes correctly.

use ratekeeper_common::{CurrencyCode, RateSnapshot, RateTable, Timestamp};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::FormatError;

/// Base assumed when a payload omits it (the primary provider quotes EUR).
pub const DEFAULT_BASE: &str = "EUR";

/// Payload carrying a `success` flag and a date (fxratesapi.com style).
#[derive(Debug, Clone, Deserialize)]
pub struct FlaggedPayload {
    pub success: bool,
    #[serde(default)]
    pub base: Option<Value>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub rates: Option<Value>,
}

/// Payload with just base, optional date and rates (vatcomply.com style).
#[derive(Debug, Clone, Deserialize)]
pub struct PlainPayload {
    #[serde(default)]
    pub base: Option<Value>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub rates: Option<Value>,
}

/// Known upstream payload shapes.
///
/// A payload with a `success` field is `Flagged` and must decode as such.
#[derive(Debug, Clone)]
pub enum ProviderShape {
    Flagged(FlaggedPayload),
    Plain(PlainPayload),
}

impl ProviderShape {
    /// Decode a raw JSON payload into a known shape.
    pub fn decode(raw: Value) -> Result<Self, FormatError> {
        if !raw.is_object() {
            return Err(FormatError::new("payload is not a JSON object"));
        }
        let decoded = if raw.get("success").is_some() {
            serde_json::from_value(raw).map(ProviderShape::Flagged)
        } else {
            serde_json::from_value(raw).map(ProviderShape::Plain)
        };
        decoded.map_err(|e| FormatError::new(format!("unrecognized payload shape: {e}")))
    }

    /// Short name of the matched shape, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderShape::Flagged(_) => "flagged",
            ProviderShape::Plain(_) => "plain",
        }
    }

    /// Turn the decoded payload into a validated snapshot stamped `timestamp`.
    pub fn into_snapshot(self, timestamp: Timestamp) -> Result<RateSnapshot, FormatError> {
        let (base, date, rates) = match self {
            ProviderShape::Flagged(payload) => {
                if !payload.success {
                    return Err(FormatError::new("provider reported success=false"));
                }
                (payload.base, payload.date, payload.rates)
            }
            ProviderShape::Plain(payload) => (payload.base, payload.date, payload.rates),
        };

        let base = parse_base(base)?;
        let rates = parse_rates(rates)?;
        Ok(RateSnapshot::new(base, rates, date, timestamp)?)
    }
}

/// Normalize an already-parsed payload.
pub fn normalize(raw: Value, timestamp: Timestamp) -> Result<RateSnapshot, FormatError> {
    ProviderShape::decode(raw)?.into_snapshot(timestamp)
}

/// Parse and normalize a response body.
pub fn normalize_bytes(body: &[u8], timestamp: Timestamp) -> Result<RateSnapshot, FormatError> {
    let raw: Value = serde_json::from_slice(body)
        .map_err(|e| FormatError::new(format!("body is not valid JSON: {e}")))?;
    normalize(raw, timestamp)
}

fn parse_base(base: Option<Value>) -> Result<CurrencyCode, FormatError> {
    match base {
        None | Some(Value::Null) => Ok(CurrencyCode::new(DEFAULT_BASE)),
        Some(Value::String(code)) if !code.trim().is_empty() => Ok(CurrencyCode::new(code)),
        Some(other) => Err(FormatError::new(format!("base is not a currency code: {other}"))),
    }
}

fn parse_rates(rates: Option<Value>) -> Result<RateTable, FormatError> {
    let map: Map<String, Value> = match rates {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => return Err(FormatError::new("missing rates")),
        Some(_) => return Err(FormatError::new("rates is not an object")),
    };

    if map.is_empty() {
        return Err(FormatError::new("rates is empty"));
    }

    let mut table = RateTable::new();
    for (code, value) in map {
        let rate = value
            .as_f64()
            .ok_or_else(|| FormatError::new(format!("rate for {code} is not a number")))?;
        table.insert(code, rate);
    }
    Ok(table)
}
