//! Command handlers.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context};
use ratekeeper_common::{search, CurrencyCode, Timestamp};
use ratekeeper_fx::{
    exchange_rate, format_amount, format_rate_line, parse_amount, CacheStore, ConversionQuery,
    Endpoint, HttpTransport, KeyValueStore, Locale, RateFetcher, RatesConfig, RatesState, RatesView,
    RefreshOutcome,
};
use tracing::{info, warn};

/// Fraction digits shown for rates.
const RATE_DIGITS: u32 = 6;

const UNAVAILABLE: &str = "Exchange rates unavailable";

/// Wires the rate state to the commands.
pub struct App {
    config: RatesConfig,
    state: RatesState,
    locale: Locale,
}

impl App {
    pub fn new(
        config: RatesConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn KeyValueStore>,
        locale: Locale,
    ) -> Self {
        let cache = Arc::new(CacheStore::new(store, config.cache_ttl));
        Self::with_cache(config, transport, cache, locale)
    }

    pub fn with_cache(
        config: RatesConfig,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<CacheStore>,
        locale: Locale,
    ) -> Self {
        let fetcher = RateFetcher::from_config(&config, transport, cache);
        Self {
            config,
            state: RatesState::new(fetcher),
            locale,
        }
    }

    /// `convert <amount> <from> <to>`
    pub async fn convert(&self, amount: &str, from: &str, to: &str) -> anyhow::Result<String> {
        let amount = parse_amount(amount).with_context(|| format!("Invalid amount {amount:?}"))?;
        let query = ConversionQuery::new(amount, from, to);

        self.state.init().await;
        let view = self.state.view();

        let mut out = String::new();
        match self.state.convert(&query) {
            Some(result) => {
                let _ = writeln!(
                    out,
                    "{} = {}",
                    format_amount(result.amount, &result.from, self.locale),
                    format_amount(result.result, &result.to, self.locale)
                );
                let _ = writeln!(
                    out,
                    "{}",
                    format_rate_line(&result.from, &result.to, result.rate, self.locale, RATE_DIGITS)
                );
                let _ = write!(
                    out,
                    "{}",
                    format_rate_line(
                        &result.to,
                        &result.from,
                        result.inverse_rate(),
                        self.locale,
                        RATE_DIGITS
                    )
                );
            }
            None if view.rates.is_none() => out.push_str(UNAVAILABLE),
            None if amount <= 0.0 => out.push_str("Enter an amount greater than zero"),
            None => {
                let _ = write!(
                    out,
                    "No rate for {} to {} from the current provider",
                    query.from, query.to
                );
            }
        }

        push_footer(&mut out, &view);
        Ok(out)
    }

    /// `rates [--base <code>]`
    pub async fn rates(&self, base: Option<&str>) -> String {
        self.state.init().await;
        let view = self.state.view();

        let Some(rates) = &view.rates else {
            let mut out = UNAVAILABLE.to_string();
            push_footer(&mut out, &view);
            return out;
        };

        let base = base.map(CurrencyCode::new).unwrap_or_else(|| view.base.clone());
        let mut out = String::new();
        let _ = write!(out, "Rates against {base}");
        if let Some(date) = &view.date {
            let _ = write!(out, " ({date})");
        }

        for code in rates.codes().filter(|code| **code != base) {
            match exchange_rate(&base, code, rates) {
                Some(rate) => {
                    let _ = write!(
                        out,
                        "\n  {}",
                        format_rate_line(&base, code, rate, self.locale, RATE_DIGITS)
                    );
                }
                None => {
                    let _ = write!(out, "\n  1 {base} = ? {code}");
                }
            }
        }

        push_footer(&mut out, &view);
        out
    }

    /// `refresh`
    pub async fn refresh(&self) -> anyhow::Result<String> {
        match self.state.refresh().await {
            RefreshOutcome::Updated => {
                let view = self.state.view();
                let count = view.rates.as_ref().map_or(0, |r| r.len());
                info!(currencies = count, "Rates refreshed");
                Ok(format!(
                    "Updated {count} rates against {} at {}",
                    view.base,
                    view.last_updated.map_or_else(|| "-".to_string(), display_time)
                ))
            }
            RefreshOutcome::Failed(e) => {
                warn!(error = %e, "Refresh failed");
                if self.state.snapshot().is_some() {
                    let mut out = format!("Refresh failed: {e}");
                    push_footer(&mut out, &self.state.view());
                    Ok(out)
                } else {
                    bail!(e)
                }
            }
            RefreshOutcome::AlreadyInFlight => Ok("A refresh is already running".to_string()),
        }
    }

    /// `currencies [query]`
    pub fn currencies(&self, query: Option<&str>) -> String {
        let matches = search(query.unwrap_or(""));
        if matches.is_empty() {
            return format!("No currencies match {:?}", query.unwrap_or(""));
        }

        let quoted = self.state.available_currencies();
        matches
            .iter()
            .map(|c| {
                let marker = if quoted.is_empty() || quoted.iter().any(|q| q.as_str() == c.code) {
                    ""
                } else {
                    "  (not quoted)"
                };
                format!("{:<4} {:<4} {}{marker}", c.code, c.symbol, c.name)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `status`
    pub fn status(&self) -> String {
        let view = self.state.view();
        let mut out = String::new();

        let _ = writeln!(out, "Base:         {}", view.base);
        let _ = writeln!(
            out,
            "Currencies:   {}",
            view.rates.as_ref().map_or(0, |r| r.len())
        );
        let _ = writeln!(out, "Rates date:   {}", view.date.as_deref().unwrap_or("-"));
        let _ = writeln!(
            out,
            "Last updated: {}",
            view.last_updated.map_or_else(|| "never".to_string(), display_time)
        );
        let _ = writeln!(
            out,
            "Cache:        {} (TTL {} min)",
            if view.is_cache_stale { "stale" } else { "fresh" },
            self.config.cache_ttl.num_minutes()
        );
        let _ = writeln!(out, "Data dir:     {}", self.config.data_dir.display());
        let _ = write!(out, "Endpoints:");
        if let Some(url) = &self.config.custom_endpoint {
            let _ = write!(out, "\n  {} (custom)", Endpoint::new(url.as_str()).redacted_url());
        }
        for endpoint in self.config.default_endpoints() {
            let _ = write!(out, "\n  {}", endpoint.redacted_url());
        }
        out
    }

    /// `clear-cache`
    pub fn clear_cache(&self) -> String {
        self.state.clear();
        "Cached rates cleared".to_string()
    }
}

/// Staleness and fallback notes under a result.
fn push_footer(out: &mut String, view: &RatesView) {
    if let Some(error) = &view.error {
        let _ = write!(out, "\n\n{error}");
        if view.using_cached {
            let _ = write!(
                out,
                "\nShowing cached rates from {}",
                view.last_updated.map_or_else(|| "-".to_string(), display_time)
            );
            if view.is_cache_stale {
                out.push_str(" (stale)");
            }
        }
    } else if let Some(ts) = view.last_updated {
        let _ = write!(out, "\n\nRates as of {}", display_time(ts));
        if view.is_cache_stale {
            out.push_str(" (stale)");
        }
    }
}

fn display_time(ts: Timestamp) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
