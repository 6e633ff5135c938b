//! Failed breaks: bars that pierced a level intrabar but closed back on the
//! original side.

use super::{days_ago, recent_window, usable};
use crate::domain::{KeyLevel, PeriodKind, PriceBar};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedBreakKind {
    /// High reached the level, close fell back below.
    FailedBullishBreak,
    /// Low reached the level, close recovered above.
    FailedBearishBreak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedBreak {
    pub timeframe: PeriodKind,
    pub label: String,
    pub level: f64,
    pub kind: FailedBreakKind,
    pub timestamp: NaiveDateTime,
    pub candle_close: f64,
    pub days_ago: i64,
}

/// Every qualifying bar is reported; no deduplication.
pub fn find_failed_breaks(
    bars: &[PriceBar],
    levels: &[KeyLevel],
    lookback_days: i64,
) -> Vec<FailedBreak> {
    let window = recent_window(bars, lookback_days);
    let mut out = Vec::new();
    for level in usable(levels) {
        let value = level.value;
        for b in window {
            let kind = if b.high >= value && b.close < value {
                FailedBreakKind::FailedBullishBreak
            } else if b.low <= value && b.close > value {
                FailedBreakKind::FailedBearishBreak
            } else {
                continue;
            };
            out.push(FailedBreak {
                timeframe: level.timeframe,
                label: level.label.clone(),
                level: value,
                kind,
                timestamp: b.timestamp,
                candle_close: b.close,
                days_ago: days_ago(window, b),
            });
        }
    }
    out
}
