//! Key levels: VWAP values handed from the engine to patterns and scoring.

use super::period::{Period, PeriodKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a reference a level sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Above,
    Below,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Above => f.write_str("above"),
            Side::Below => f.write_str("below"),
        }
    }
}

/// A VWAP value tagged with the period it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyLevel {
    pub timeframe: PeriodKind,
    pub label: String,
    pub value: f64,
    pub is_current: bool,
}

impl KeyLevel {
    pub fn new(period: &Period, value: f64) -> Self {
        Self {
            timeframe: period.kind,
            label: period.label.clone(),
            value,
            is_current: period.is_current,
        }
    }

    /// Only strictly positive levels take part in pattern detection and scoring.
    pub fn is_usable(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}
