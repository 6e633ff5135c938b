//! Bar normalization shared by every data source.

use super::provider::DataError;
use crate::domain::PriceBar;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` (a `T` separator and
/// minute precision are accepted too). Dates map to midnight.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DataError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| DataError::ValidationError(format!("unparseable timestamp '{raw}'")))
}

/// Sort ascending, keep the last bar for a repeated timestamp, drop bars
/// that fail the OHLC sanity check.
pub fn ingest(symbol: &str, mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    // Stable sort keeps input order among equal timestamps.
    bars.sort_by_key(|b| b.timestamp);

    let mut out: Vec<PriceBar> = Vec::with_capacity(bars.len());
    let mut duplicates = 0usize;
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => {
                *last = bar;
                duplicates += 1;
            }
            _ => out.push(bar),
        }
    }
    if duplicates > 0 {
        warn!(symbol, duplicates, "dropped duplicate timestamps");
    }

    let before = out.len();
    out.retain(|bar| {
        let sane = bar.is_sane();
        if !sane {
            warn!(symbol, timestamp = %bar.timestamp, "dropped insane bar");
        }
        sane
    });
    if out.len() < before {
        warn!(symbol, dropped = before - out.len(), kept = out.len(), "bars failed sanity check");
    }
    out
}
