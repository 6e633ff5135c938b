//! Analysis periods: the calendar or rolling windows a VWAP is anchored to.

use super::bar::PriceBar;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which family of window a period belongs to.
///
/// The kind drives both the boundary rule (see `vwap::periods`) and the
/// timeframe weight used by the level scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Yearly,
    Quarterly,
    ThreeMonth,
    Daily,
}

impl PeriodKind {
    pub const ALL: [PeriodKind; 4] = [
        PeriodKind::Yearly,
        PeriodKind::Quarterly,
        PeriodKind::ThreeMonth,
        PeriodKind::Daily,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodKind::Yearly => "yearly",
            PeriodKind::Quarterly => "quarterly",
            PeriodKind::ThreeMonth => "three_month",
            PeriodKind::Daily => "daily",
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A window of bars a VWAP is computed over.
///
/// Current periods are open-ended (`end == None`) and accumulate up to the
/// latest available bar. Prior periods are completed and carry an inclusive
/// `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub kind: PeriodKind,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub is_current: bool,
    pub label: String,
}

impl Period {
    pub fn current(kind: PeriodKind, start: NaiveDateTime, label: impl Into<String>) -> Self {
        Self {
            kind,
            start,
            end: None,
            is_current: true,
            label: label.into(),
        }
    }

    pub fn prior(
        kind: PeriodKind,
        start: NaiveDateTime,
        end: NaiveDateTime,
        label: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            start,
            end: Some(end),
            is_current: false,
            label: label.into(),
        }
    }

    pub fn is_prior(&self) -> bool {
        !self.is_current
    }

    /// Whether `ts` falls inside the period (both bounds inclusive).
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && self.end.map_or(true, |end| ts <= end)
    }

    /// The contiguous sub-slice of an ascending bar series inside this period.
    ///
    /// Returns an empty slice when no bar matches.
    pub fn slice<'a>(&self, bars: &'a [PriceBar]) -> &'a [PriceBar] {
        let from = bars.partition_point(|b| b.timestamp < self.start);
        let to = match self.end {
            Some(end) => bars.partition_point(|b| b.timestamp <= end),
            None => bars.len(),
        };
        if from >= to {
            &bars[0..0]
        } else {
            &bars[from..to]
        }
    }
}
