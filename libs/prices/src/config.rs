use std::env::var;

use anyhow::{Context, Result};
use chrono::Duration;
use tracing::warn;

pub const DEFAULT_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_CACHE_TTL_MS: i64 = 300_000;
pub const DEFAULT_VS_CURRENCY: &str = "usd";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct PriceConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub vs_currency: String,
    pub cache_ttl: Duration,
    pub request_timeout: std::time::Duration,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            vs_currency: DEFAULT_VS_CURRENCY.to_string(),
            cache_ttl: Duration::milliseconds(DEFAULT_CACHE_TTL_MS),
            request_timeout: std::time::Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl PriceConfig {
    /// Reads `COINGECKO_API_URL`, `COINGECKO_API_KEY`, `PRICE_VS_CURRENCY`,
    /// `PRICE_CACHE_TTL_MS` and `PRICE_REQUEST_TIMEOUT_SECS`; every one of
    /// them is optional.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let request_timeout = match var("PRICE_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => std::time::Duration::from_secs(
                raw.trim()
                    .parse()
                    .context("PRICE_REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            Err(_) => defaults.request_timeout,
        };

        Ok(Self {
            api_url: var("COINGECKO_API_URL").unwrap_or(defaults.api_url),
            api_key: var("COINGECKO_API_KEY").ok().filter(|s| !s.is_empty()),
            vs_currency: var("PRICE_VS_CURRENCY")
                .map(|c| c.trim().to_lowercase())
                .unwrap_or(defaults.vs_currency),
            cache_ttl: parse_cache_ttl(var("PRICE_CACHE_TTL_MS").ok().as_deref()),
            request_timeout,
        })
    }
}

/// Missing, non-numeric and non-positive values all fall back to five minutes.
pub fn parse_cache_ttl(raw: Option<&str>) -> Duration {
    match raw.map(|s| s.trim().parse::<i64>()) {
        Some(Ok(ms)) if ms > 0 => Duration::milliseconds(ms),
        Some(_) => {
            warn!(value = ?raw, "invalid PRICE_CACHE_TTL_MS, using default");
            Duration::milliseconds(DEFAULT_CACHE_TTL_MS)
        }
        None => Duration::milliseconds(DEFAULT_CACHE_TTL_MS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_defaults_to_five_minutes() {
        assert_eq!(parse_cache_ttl(None), Duration::minutes(5));
    }

    #[test]
    fn ttl_reads_milliseconds() {
        assert_eq!(parse_cache_ttl(Some("60000")), Duration::minutes(1));
        assert_eq!(parse_cache_ttl(Some(" 1500 ")), Duration::milliseconds(1_500));
    }

    #[test]
    fn ttl_rejects_garbage_and_zero() {
        assert_eq!(parse_cache_ttl(Some("soon")), Duration::minutes(5));
        assert_eq!(parse_cache_ttl(Some("0")), Duration::minutes(5));
        assert_eq!(parse_cache_ttl(Some("-10")), Duration::minutes(5));
    }
}
