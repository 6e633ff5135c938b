//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over bar sources (Alpha Vantage, CSV
//! import) so the batch driver and CLI can swap implementations and mock
//! them in tests.

use crate::domain::PriceBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Structured error types for data operations.
///
/// A fetch failure is always an `Err`; it is never turned into an empty or
/// zero-valued series.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("unsupported by {provider}: {operation}")]
    Unsupported {
        provider: String,
        operation: String,
    },

    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Where a bar series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    AlphaVantage,
    CsvImport,
    Cache,
}

/// Result of a successful fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    /// Ascending, deduplicated, sane bars.
    pub bars: Vec<PriceBar>,
    pub source: DataSource,
}

/// Latest quote for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub volume: u64,
    pub latest_trading_day: Option<NaiveDate>,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
}

/// Intraday bar spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1min")]
    Min1,
    #[serde(rename = "5min")]
    Min5,
    #[serde(rename = "15min")]
    Min15,
    #[serde(rename = "30min")]
    Min30,
    #[serde(rename = "60min")]
    Min60,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Min1 => "1min",
            Interval::Min5 => "5min",
            Interval::Min15 => "15min",
            Interval::Min30 => "30min",
            Interval::Min60 => "60min",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1min" => Ok(Interval::Min1),
            "5min" => Ok(Interval::Min5),
            "15min" => Ok(Interval::Min15),
            "30min" => Ok(Interval::Min30),
            "60min" => Ok(Interval::Min60),
            other => Err(DataError::ValidationError(format!(
                "unknown interval '{other}' (expected 1min, 5min, 15min, 30min or 60min)"
            ))),
        }
    }
}

/// Trait for bar providers.
///
/// Implementations own their caching and rate-limit state; callers only see
/// finished, ingested bar series.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Full daily history for a symbol.
    fn fetch_daily(&self, symbol: &str) -> Result<FetchResult, DataError>;

    /// Intraday history for a symbol at `interval`.
    fn fetch_intraday(&self, symbol: &str, interval: Interval) -> Result<FetchResult, DataError>;

    /// Latest quote for a symbol.
    fn fetch_quote(&self, symbol: &str) -> Result<Quote, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parses_and_displays() {
        let i: Interval = "15min".parse().unwrap();
        assert_eq!(i, Interval::Min15);
        assert_eq!(i.to_string(), "15min");
        assert!("2min".parse::<Interval>().is_err());
    }

    #[test]
    fn errors_render_for_reports() {
        let e = DataError::SymbolNotFound {
            symbol: "ZZZZ".into(),
        };
        assert_eq!(e.to_string(), "symbol not found: ZZZZ");
        let e = DataError::RateLimited {
            retry_after_secs: 60,
        };
        assert!(e.to_string().contains("60s"));
    }
}
