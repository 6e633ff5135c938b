//! Alpha Vantage data provider.
//!
//! Fetches daily and intraday OHLCV series plus the latest quote from the
//! `query` endpoint. Handles in-band API errors, rate limiting, retries with
//! exponential backoff, the circuit breaker and the bar cache.
//!
//! Alpha Vantage reports most failures with HTTP 200 and an "Error Message",
//! "Note" or "Information" field, so every payload is checked before parsing.

use super::cache::BarCache;
use super::circuit_breaker::CircuitBreaker;
use super::ingest::{ingest, parse_timestamp};
use super::provider::{DataError, DataProvider, DataSource, FetchResult, Interval, Quote};
use crate::domain::PriceBar;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Seconds to wait after a per-minute quota message.
const QUOTA_WINDOW_SECS: u64 = 60;

/// One entry of a `Time Series (...)` object. Alpha Vantage sends numbers
/// as strings.
#[derive(Debug, Deserialize)]
struct RawCandle {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

fn number(field: &str, raw: &str) -> Result<f64, DataError> {
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| DataError::ResponseFormatChanged(format!("non-numeric {field}: '{raw}'")))
}

fn volume(raw: &str) -> Result<u64, DataError> {
    let v = number("volume", raw)?;
    if v < 0.0 {
        return Err(DataError::ResponseFormatChanged(format!(
            "negative volume: '{raw}'"
        )));
    }
    Ok(v.round() as u64)
}

/// Map in-band error fields to structured errors.
fn check_payload(symbol: &str, payload: &Value) -> Result<(), DataError> {
    if let Some(msg) = payload.get("Error Message").and_then(Value::as_str) {
        let lower = msg.to_ascii_lowercase();
        if lower.contains("apikey") {
            return Err(DataError::AuthenticationRequired(msg.to_string()));
        }
        if lower.contains("invalid api call") {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        return Err(DataError::ResponseFormatChanged(msg.to_string()));
    }
    if payload.get("Note").is_some() || payload.get("Information").is_some() {
        return Err(DataError::RateLimited {
            retry_after_secs: QUOTA_WINDOW_SECS,
        });
    }
    Ok(())
}

/// Parse the `series_key` object of a time-series payload into ingested bars.
fn parse_time_series(
    symbol: &str,
    payload: &Value,
    series_key: &str,
) -> Result<Vec<PriceBar>, DataError> {
    let series = payload.get(series_key).ok_or_else(|| {
        DataError::ResponseFormatChanged(format!("missing '{series_key}' for {symbol}"))
    })?;
    let candles: BTreeMap<String, RawCandle> = serde_json::from_value(series.clone())
        .map_err(|e| DataError::ResponseFormatChanged(format!("{series_key}: {e}")))?;

    let mut bars = Vec::with_capacity(candles.len());
    for (stamp, c) in &candles {
        bars.push(PriceBar {
            timestamp: parse_timestamp(stamp)
                .map_err(|_| DataError::ResponseFormatChanged(format!("bad timestamp '{stamp}'")))?,
            open: number("open", &c.open)?,
            high: number("high", &c.high)?,
            low: number("low", &c.low)?,
            close: number("close", &c.close)?,
            volume: volume(&c.volume)?,
        });
    }

    let bars = ingest(symbol, bars);
    if bars.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    Ok(bars)
}

fn parse_quote(symbol: &str, payload: &Value) -> Result<Quote, DataError> {
    let raw = payload
        .get("Global Quote")
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("missing 'Global Quote' for {symbol}")))?;
    let raw: RawQuote = serde_json::from_value(raw.clone())
        .map_err(|e| DataError::ResponseFormatChanged(format!("Global Quote: {e}")))?;

    // An unknown symbol comes back as an empty object.
    let price = match raw.price.as_deref() {
        Some(p) => number("price", p)?,
        None => {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
        }
    };
    let opt_number = |field: &str, v: Option<&str>| v.map(|s| number(field, s)).transpose();

    Ok(Quote {
        symbol: raw.symbol.unwrap_or_else(|| symbol.to_string()),
        price,
        volume: raw.volume.as_deref().map(volume).transpose()?.unwrap_or(0),
        latest_trading_day: raw
            .latest_trading_day
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        previous_close: opt_number("previous close", raw.previous_close.as_deref())?.unwrap_or(0.0),
        change: opt_number("change", raw.change.as_deref())?.unwrap_or(0.0),
        change_percent: opt_number("change percent", raw.change_percent.as_deref())?.unwrap_or(0.0),
    })
}

/// Alpha Vantage data provider.
pub struct AlphaVantageProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    cache: BarCache,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl AlphaVantageProvider {
    pub fn new(
        api_key: impl Into<String>,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DataError::AuthenticationRequired(
                "Alpha Vantage API key required (set ALPHA_VANTAGE_API_KEY)".into(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            cache: BarCache::default(),
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Replace the default one-hour cache.
    pub fn with_cache(mut self, cache: BarCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &BarCache {
        &self.cache
    }

    /// GET the query endpoint with retry and circuit breaker logic, returning
    /// a payload that passed the in-band error check.
    fn fetch_with_retry(&self, symbol: &str, params: &[(&str, &str)]) -> Result<Value, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let request = self
                .client
                .get(BASE_URL)
                .query(params)
                .query(&[("apikey", self.api_key.as_str())]);

            match request.send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(QUOTA_WINDOW_SECS);
                        warn!(symbol, retry_after, "HTTP 429 from Alpha Vantage");
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let payload: Value = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    if let Err(e) = check_payload(symbol, &payload) {
                        if matches!(e, DataError::RateLimited { .. }) {
                            // Quota messages persist for the rest of the window.
                            self.circuit_breaker.record_failure();
                            warn!(symbol, "Alpha Vantage quota message");
                        }
                        return Err(e);
                    }

                    self.circuit_breaker.record_success();
                    return Ok(payload);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        warn!(symbol, error = %e, "network error");
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn cached(&self, symbol: &str, key: &str) -> Option<FetchResult> {
        self.cache.get(key).map(|bars| FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Cache,
        })
    }
}

impl DataProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn fetch_daily(&self, symbol: &str) -> Result<FetchResult, DataError> {
        let key = BarCache::daily_key(symbol);
        if let Some(hit) = self.cached(symbol, &key) {
            return Ok(hit);
        }
        let payload = self.fetch_with_retry(
            symbol,
            &[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", "full"),
            ],
        )?;
        let bars = parse_time_series(symbol, &payload, "Time Series (Daily)")?;
        self.cache.insert(key, bars.clone());
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::AlphaVantage,
        })
    }

    fn fetch_intraday(&self, symbol: &str, interval: Interval) -> Result<FetchResult, DataError> {
        let key = BarCache::intraday_key(symbol, interval);
        if let Some(hit) = self.cached(symbol, &key) {
            return Ok(hit);
        }
        let payload = self.fetch_with_retry(
            symbol,
            &[
                ("function", "TIME_SERIES_INTRADAY"),
                ("symbol", symbol),
                ("interval", interval.as_str()),
                ("outputsize", "full"),
            ],
        )?;
        let series_key = format!("Time Series ({interval})");
        let bars = parse_time_series(symbol, &payload, &series_key)?;
        self.cache.insert(key, bars.clone());
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::AlphaVantage,
        })
    }

    fn fetch_quote(&self, symbol: &str) -> Result<Quote, DataError> {
        let payload =
            self.fetch_with_retry(symbol, &[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])?;
        parse_quote(symbol, &payload)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn daily_payload() -> Value {
        json!({
            "Meta Data": { "2. Symbol": "CPB" },
            "Time Series (Daily)": {
                "2025-09-19": {
                    "1. open": "33.5700", "2. high": "33.9000", "3. low": "33.1000",
                    "4. close": "33.2000", "5. volume": "3100000"
                },
                "2025-09-18": {
                    "1. open": "32.8100", "2. high": "33.8200", "3. low": "32.7400",
                    "4. close": "33.5700", "5. volume": "4886821"
                }
            }
        })
    }

    #[test]
    fn parses_daily_series_ascending() {
        let bars = parse_time_series("CPB", &daily_payload(), "Time Series (Daily)").unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].close, 33.57);
        assert_eq!(bars[0].volume, 4_886_821);
    }

    #[test]
    fn parses_intraday_timestamps() {
        let payload = json!({
            "Time Series (5min)": {
                "2025-09-19 15:55:00": {
                    "1. open": "33.2", "2. high": "33.3", "3. low": "33.1",
                    "4. close": "33.25", "5. volume": "12000"
                }
            }
        });
        let bars = parse_time_series("CPB", &payload, "Time Series (5min)").unwrap();
        assert_eq!(bars[0].timestamp.to_string(), "2025-09-19 15:55:00");
    }

    #[test]
    fn missing_series_is_format_change() {
        let err = parse_time_series("CPB", &json!({}), "Time Series (Daily)").unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn non_numeric_field_is_format_change() {
        let payload = json!({
            "Time Series (Daily)": {
                "2025-09-18": {
                    "1. open": "n/a", "2. high": "1", "3. low": "1",
                    "4. close": "1", "5. volume": "1"
                }
            }
        });
        let err = parse_time_series("CPB", &payload, "Time Series (Daily)").unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn in_band_errors_are_classified() {
        let invalid = json!({ "Error Message": "Invalid API call. Please retry or visit the documentation." });
        assert!(matches!(
            check_payload("ZZZZ", &invalid),
            Err(DataError::SymbolNotFound { .. })
        ));

        let note = json!({ "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute." });
        assert!(matches!(
            check_payload("CPB", &note),
            Err(DataError::RateLimited { retry_after_secs: 60 })
        ));

        let info = json!({ "Information": "rate limit" });
        assert!(matches!(
            check_payload("CPB", &info),
            Err(DataError::RateLimited { .. })
        ));

        let key = json!({ "Error Message": "the parameter apikey is invalid or missing." });
        assert!(matches!(
            check_payload("CPB", &key),
            Err(DataError::AuthenticationRequired(_))
        ));

        assert!(check_payload("CPB", &daily_payload()).is_ok());
    }

    #[test]
    fn parses_global_quote() {
        let payload = json!({
            "Global Quote": {
                "01. symbol": "CPB",
                "05. price": "33.2000",
                "06. volume": "3100000",
                "07. latest trading day": "2025-09-19",
                "08. previous close": "33.5700",
                "09. change": "-0.3700",
                "10. change percent": "-1.1022%"
            }
        });
        let q = parse_quote("CPB", &payload).unwrap();
        assert_eq!(q.price, 33.2);
        assert_eq!(q.volume, 3_100_000);
        assert_eq!(q.latest_trading_day, NaiveDate::from_ymd_opt(2025, 9, 19));
        assert!((q.change_percent + 1.1022).abs() < 1e-9);
    }

    #[test]
    fn empty_global_quote_is_unknown_symbol() {
        let payload = json!({ "Global Quote": {} });
        assert!(matches!(
            parse_quote("ZZZZ", &payload),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let breaker = Arc::new(CircuitBreaker::default());
        assert!(matches!(
            AlphaVantageProvider::new("  ", breaker),
            Err(DataError::AuthenticationRequired(_))
        ));
    }

    #[test]
    fn cached_series_skips_the_network() {
        let breaker = Arc::new(CircuitBreaker::default());
        let provider = AlphaVantageProvider::new("demo", breaker).unwrap();
        let bars = parse_time_series("CPB", &daily_payload(), "Time Series (Daily)").unwrap();
        provider.cache().insert(BarCache::daily_key("CPB"), bars.clone());
        let hit = provider.fetch_daily("CPB").unwrap();
        assert_eq!(hit.source, DataSource::Cache);
        assert_eq!(hit.bars, bars);
    }
}
