//! CSV bar import.
//!
//! Expected header: `timestamp,open,high,low,close,volume` (`date` is
//! accepted in place of `timestamp`). Rows are parsed with serde and then
//! normalized through [`ingest`].

use super::ingest::{ingest, parse_timestamp};
use super::provider::{DataError, DataProvider, DataSource, FetchResult, Interval, Quote};
use crate::domain::PriceBar;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "Date", alias = "Timestamp")]
    timestamp: String,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(alias = "Volume")]
    volume: f64,
}

impl CsvRow {
    fn into_bar(self) -> Result<PriceBar, DataError> {
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(DataError::ValidationError(format!(
                "invalid volume {} at {}",
                self.volume, self.timestamp
            )));
        }
        Ok(PriceBar {
            timestamp: parse_timestamp(&self.timestamp)?,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume.round() as u64,
        })
    }
}

/// Read raw bars from any reader. No sorting or filtering is applied.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<PriceBar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    rdr.deserialize::<CsvRow>()
        .map(|row| row?.into_bar())
        .collect()
}

/// Load and ingest a CSV file.
pub fn load_csv(path: &Path) -> Result<Vec<PriceBar>, DataError> {
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = read_bars(file)?;
    let symbol = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("csv");
    let bars = ingest(symbol, raw);
    debug!(path = %path.display(), bars = bars.len(), "loaded CSV");
    Ok(bars)
}

/// Serves bars from `{dir}/{SYMBOL}.csv` (daily) and
/// `{dir}/{SYMBOL}_{interval}.csv` (intraday).
#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn daily_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    pub fn intraday_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.dir.join(format!("{symbol}_{interval}.csv"))
    }

    fn load(&self, symbol: &str, path: PathBuf) -> Result<FetchResult, DataError> {
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars: load_csv(&path)?,
            source: DataSource::CsvImport,
        })
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_daily(&self, symbol: &str) -> Result<FetchResult, DataError> {
        self.load(symbol, self.daily_path(symbol))
    }

    fn fetch_intraday(&self, symbol: &str, interval: Interval) -> Result<FetchResult, DataError> {
        self.load(symbol, self.intraday_path(symbol, interval))
    }

    /// Quote derived from the last two daily bars.
    fn fetch_quote(&self, symbol: &str) -> Result<Quote, DataError> {
        let daily = self.fetch_daily(symbol)?;
        let last = daily.bars.last().ok_or_else(|| DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;
        let previous_close = daily
            .bars
            .len()
            .checked_sub(2)
            .map(|i| daily.bars[i].close)
            .unwrap_or(last.open);
        let change = last.close - previous_close;
        let change_percent = if previous_close > 0.0 {
            change / previous_close * 100.0
        } else {
            0.0
        };
        Ok(Quote {
            symbol: symbol.to_string(),
            price: last.close,
            volume: last.volume,
            latest_trading_day: Some(last.date()),
            previous_close,
            change,
            change_percent,
        })
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}
