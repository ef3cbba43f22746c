//! Locale-aware display formatting for amounts and rates.

use ratekeeper_common::{lookup, CurrencyCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Fraction digits shown for monetary amounts.
const MONEY_MIN_FRACTION: u32 = 2;
const MONEY_MAX_FRACTION: u32 = 6;

/// Upper bound on requested fraction digits.
const MAX_FRACTION_DIGITS: u32 = 20;

const NBSP: &str = "\u{a0}";
const NARROW_NBSP: &str = "\u{202f}";

/// Supported display locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    EnUs,
    EnGb,
    DeDe,
    FrFr,
    RuRu,
    JaJp,
}

impl Locale {
    /// Parse a BCP 47 tag such as `de-DE` or `fr_FR`. Unknown tags fall back to `en-US`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().replace('_', "-").to_ascii_lowercase().as_str() {
            "en-us" | "en" => Locale::EnUs,
            "en-gb" => Locale::EnGb,
            "de-de" | "de" => Locale::DeDe,
            "fr-fr" | "fr" => Locale::FrFr,
            "ru-ru" | "ru" => Locale::RuRu,
            "ja-jp" | "ja" => Locale::JaJp,
            other => {
                tracing::debug!(tag = other, "Unknown locale, using en-US");
                Locale::EnUs
            }
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Locale::EnUs => "en-US",
            Locale::EnGb => "en-GB",
            Locale::DeDe => "de-DE",
            Locale::FrFr => "fr-FR",
            Locale::RuRu => "ru-RU",
            Locale::JaJp => "ja-JP",
        }
    }

    fn decimal_separator(&self) -> char {
        match self {
            Locale::EnUs | Locale::EnGb | Locale::JaJp => '.',
            Locale::DeDe | Locale::FrFr | Locale::RuRu => ',',
        }
    }

    fn group_separator(&self) -> &'static str {
        match self {
            Locale::EnUs | Locale::EnGb | Locale::JaJp => ",",
            Locale::DeDe => ".",
            Locale::FrFr => NARROW_NBSP,
            Locale::RuRu => NBSP,
        }
    }

    fn symbol_trails(&self) -> bool {
        matches!(self, Locale::DeDe | Locale::FrFr | Locale::RuRu)
    }
}

/// Render a monetary amount, e.g. `€1,234.56` or `1.234,56 €`.
///
/// Shows between 2 and 6 fraction digits, trimming zeros past the second.
pub fn format_amount(amount: f64, currency: &CurrencyCode, locale: Locale) -> String {
    let Some(number) = render_number(amount, locale, MONEY_MIN_FRACTION, MONEY_MAX_FRACTION)
    else {
        return non_finite(amount);
    };

    let (negative, digits) = match number.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, number.as_str()),
    };
    let sign = if negative { "-" } else { "" };

    match lookup(currency.as_str()) {
        Some(descriptor) if locale.symbol_trails() => {
            format!("{sign}{digits}{NBSP}{}", descriptor.symbol)
        }
        Some(descriptor) => format!("{sign}{}{digits}", descriptor.symbol),
        // Unknown currencies are labelled with their code.
        None if locale.symbol_trails() => format!("{sign}{digits}{NBSP}{currency}"),
        None => format!("{sign}{currency}{NBSP}{digits}"),
    }
}

/// Render a plain number with up to `max_fraction_digits` fraction digits.
pub fn format_number(value: f64, locale: Locale, max_fraction_digits: u32) -> String {
    render_number(value, locale, 0, max_fraction_digits).unwrap_or_else(|| non_finite(value))
}

/// `1 USD = 0.91 EUR`.
pub fn format_rate_line(
    from: &CurrencyCode,
    to: &CurrencyCode,
    rate: f64,
    locale: Locale,
    max_fraction_digits: u32,
) -> String {
    format!(
        "1 {from} = {} {to}",
        format_number(rate, locale, max_fraction_digits)
    )
}

fn non_finite(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_sign_negative() {
        "-∞".to_string()
    } else {
        "∞".to_string()
    }
}

/// Round and lay out a number. `None` for NaN and infinities.
fn render_number(value: f64, locale: Locale, min_fraction: u32, max_fraction: u32) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let max_fraction = max_fraction.min(MAX_FRACTION_DIGITS);
    let min_fraction = min_fraction.min(max_fraction);

    // Shortest round-trip text first, so 1.005 rounds like it reads.
    let decimal = value
        .to_string()
        .parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_f64(value));

    let plain = match decimal {
        Some(decimal) => decimal
            .round_dp_with_strategy(max_fraction, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
            .to_string(),
        // Beyond decimal range: fall back to float formatting.
        None => format!("{value:.prec$}", prec = max_fraction as usize),
    };

    let (negative, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, plain.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let mut fraction = frac_part.trim_end_matches('0').to_string();
    while (fraction.len() as u32) < min_fraction {
        fraction.push('0');
    }

    let grouped = group_digits(int_part, locale.group_separator());
    // Rounding can leave "-0".
    let is_zero = grouped.chars().all(|c| c == '0') && fraction.chars().all(|c| c == '0');
    let sign = if negative && !is_zero { "-" } else { "" };

    Some(if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}{}{fraction}", locale.decimal_separator())
    })
}

fn group_digits(digits: &str, separator: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * separator.len());
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s)
    }

    #[test]
    fn test_amount_en_us() {
        assert_eq!(format_amount(1234.5, &code("USD"), Locale::EnUs), "$1,234.50");
        assert_eq!(format_amount(90.909090909, &code("EUR"), Locale::EnUs), "€90.909091");
        assert_eq!(format_amount(1.0, &code("GBP"), Locale::EnUs), "£1.00");
        assert_eq!(format_amount(0.123, &code("USD"), Locale::EnUs), "$0.123");
        assert_eq!(format_amount(-5.0, &code("USD"), Locale::EnUs), "-$5.00");
    }

    #[test]
    fn test_amount_minimum_two_digits_even_for_jpy() {
        assert_eq!(format_amount(1500.0, &code("JPY"), Locale::EnUs), "¥1,500.00");
    }

    #[test]
    fn test_amount_trailing_symbol_locales() {
        assert_eq!(
            format_amount(1234.5, &code("EUR"), Locale::DeDe),
            "1.234,50\u{a0}€"
        );
        assert_eq!(
            format_amount(1234567.25, &code("EUR"), Locale::FrFr),
            "1\u{202f}234\u{202f}567,25\u{a0}€"
        );
        assert_eq!(
            format_amount(1000.0, &code("USD"), Locale::RuRu),
            "1\u{a0}000,00\u{a0}$"
        );
    }

    #[test]
    fn test_amount_unknown_currency() {
        assert_eq!(format_amount(3.5, &code("XYZ"), Locale::EnUs), "XYZ\u{a0}3.50");
        assert_eq!(format_amount(3.5, &code("XYZ"), Locale::DeDe), "3,50\u{a0}XYZ");
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        assert_eq!(format_number(2.5, Locale::EnUs, 0), "3");
        assert_eq!(format_number(-2.5, Locale::EnUs, 0), "-3");
        assert_eq!(format_number(1.005, Locale::EnUs, 2), "1.01");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234.5678, Locale::EnUs, 2), "1,234.57");
        assert_eq!(format_number(1234.0, Locale::EnUs, 2), "1,234");
        assert_eq!(format_number(0.9090909, Locale::DeDe, 4), "0,9091");
        assert_eq!(format_number(-0.001, Locale::EnUs, 2), "0");
        assert_eq!(format_number(1e30, Locale::EnUs, 0).len(), 41);
        assert_eq!(format_number(f64::NAN, Locale::EnUs, 2), "NaN");
    }

    #[test]
    fn test_rate_line() {
        assert_eq!(
            format_rate_line(&code("USD"), &code("EUR"), 0.909090909, Locale::EnUs, 4),
            "1 USD = 0.9091 EUR"
        );
    }

    #[test]
    fn test_locale_tags() {
        assert_eq!(Locale::from_tag("de_DE"), Locale::DeDe);
        assert_eq!(Locale::from_tag("FR-fr"), Locale::FrFr);
        assert_eq!(Locale::from_tag("pt-BR"), Locale::EnUs);
        assert_eq!(Locale::default().tag(), "en-US");
    }
}
