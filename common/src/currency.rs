//! Currency codes and static currency reference data.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// ISO 4217-like currency code, normalised to upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a new currency code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Look up the static descriptor for this code, if it is a known currency.
    pub fn descriptor(&self) -> Option<&'static CurrencyDescriptor> {
        lookup(&self.0)
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CurrencyCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl Borrow<str> for CurrencyCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Static presentation data for a currency.
///
/// Independent of any rate data: a descriptor says how to display a code,
/// not whether the current provider quotes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrencyDescriptor {
    /// ISO 4217 code.
    pub code: &'static str,
    /// English display name.
    pub name: &'static str,
    /// Symbol used in formatted amounts.
    pub symbol: &'static str,
    /// Symbol as written in the currency's home locale.
    pub symbol_native: &'static str,
    /// Standard number of minor-unit digits.
    pub decimal_digits: u32,
}

const fn descriptor(
    code: &'static str,
    name: &'static str,
    symbol: &'static str,
    symbol_native: &'static str,
    decimal_digits: u32,
) -> CurrencyDescriptor {
    CurrencyDescriptor {
        code,
        name,
        symbol,
        symbol_native,
        decimal_digits,
    }
}

/// Currencies offered by the primary rate provider, sorted by code.
static CATALOG: [CurrencyDescriptor; 31] = [
    descriptor("AUD", "Australian Dollar", "AU$", "$", 2),
    descriptor("BGN", "Bulgarian Lev", "BGN", "лв.", 2),
    descriptor("BRL", "Brazilian Real", "R$", "R$", 2),
    descriptor("CAD", "Canadian Dollar", "CA$", "$", 2),
    descriptor("CHF", "Swiss Franc", "CHF", "CHF", 2),
    descriptor("CNY", "Chinese Yuan", "CN¥", "CN¥", 2),
    descriptor("CZK", "Czech Koruna", "Kč", "Kč", 2),
    descriptor("DKK", "Danish Krone", "Dkr", "kr", 2),
    descriptor("EUR", "Euro", "€", "€", 2),
    descriptor("GBP", "British Pound Sterling", "£", "£", 2),
    descriptor("HKD", "Hong Kong Dollar", "HK$", "$", 2),
    descriptor("HUF", "Hungarian Forint", "Ft", "Ft", 0),
    descriptor("IDR", "Indonesian Rupiah", "Rp", "Rp", 0),
    descriptor("ILS", "Israeli New Shekel", "₪", "₪", 2),
    descriptor("INR", "Indian Rupee", "₹", "₹", 2),
    descriptor("ISK", "Icelandic Króna", "Ikr", "kr", 0),
    descriptor("JPY", "Japanese Yen", "¥", "￥", 0),
    descriptor("KRW", "South Korean Won", "₩", "₩", 0),
    descriptor("MXN", "Mexican Peso", "MX$", "$", 2),
    descriptor("MYR", "Malaysian Ringgit", "RM", "RM", 2),
    descriptor("NOK", "Norwegian Krone", "Nkr", "kr", 2),
    descriptor("NZD", "New Zealand Dollar", "NZ$", "$", 2),
    descriptor("PHP", "Philippine Peso", "₱", "₱", 2),
    descriptor("PLN", "Polish Zloty", "zł", "zł", 2),
    descriptor("RON", "Romanian Leu", "RON", "RON", 2),
    descriptor("SEK", "Swedish Krona", "Skr", "kr", 2),
    descriptor("SGD", "Singapore Dollar", "S$", "$", 2),
    descriptor("THB", "Thai Baht", "฿", "฿", 2),
    descriptor("TRY", "Turkish Lira", "TL", "TL", 2),
    descriptor("USD", "US Dollar", "$", "$", 2),
    descriptor("ZAR", "South African Rand", "R", "R", 2),
];

/// All known currencies, sorted by code.
pub fn catalog() -> &'static [CurrencyDescriptor] {
    &CATALOG
}

/// Find the descriptor for a code (case-insensitive).
pub fn lookup(code: &str) -> Option<&'static CurrencyDescriptor> {
    let code = code.trim();
    CATALOG.iter().find(|d| d.code.eq_ignore_ascii_case(code))
}

/// Case-insensitive search over code and name.
///
/// An empty query returns the full catalogue. Exact code matches sort first.
pub fn search(query: &str) -> Vec<&'static CurrencyDescriptor> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return CATALOG.iter().collect();
    }

    let mut hits: Vec<&'static CurrencyDescriptor> = CATALOG
        .iter()
        .filter(|d| {
            d.code.to_lowercase().contains(&needle) || d.name.to_lowercase().contains(&needle)
        })
        .collect();
    hits.sort_by_key(|d| !d.code.eq_ignore_ascii_case(&needle));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_normalised() {
        assert_eq!(CurrencyCode::new(" usd ").as_str(), "USD");
        assert_eq!(CurrencyCode::from("eur"), CurrencyCode::eur());
    }

    #[test]
    fn test_code_serde_is_plain_string() {
        let json = serde_json::to_string(&CurrencyCode::usd()).unwrap();
        assert_eq!(json, "\"USD\"");

        let code: CurrencyCode = serde_json::from_str("\"gbp\"").unwrap();
        assert_eq!(code.as_str(), "GBP");
    }

    #[test]
    fn test_catalog_sorted_and_unique() {
        let codes: Vec<&str> = catalog().iter().map(|d| d.code).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn test_lookup() {
        let jpy = lookup("jpy").unwrap();
        assert_eq!(jpy.name, "Japanese Yen");
        assert_eq!(jpy.decimal_digits, 0);
        assert!(lookup("XYZ").is_none());
        assert_eq!(CurrencyCode::usd().descriptor().map(|d| d.symbol), Some("$"));
    }

    #[test]
    fn test_search() {
        let hits = search("dollar");
        assert!(hits.iter().all(|d| d.name.contains("Dollar")));
        assert!(hits.iter().any(|d| d.code == "USD"));

        let exact = search("eur");
        assert_eq!(exact[0].code, "EUR");

        assert_eq!(search("  ").len(), catalog().len());
        assert!(search("zzz").is_empty());
    }
}
