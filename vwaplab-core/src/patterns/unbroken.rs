//! Unbroken priors: levels price has stayed entirely on one side of for the
//! whole lookback.

use super::{recent_window, usable, LevelRole, Strength};
use crate::domain::{KeyLevel, PeriodKind, PriceBar};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnbrokenPrior {
    pub timeframe: PeriodKind,
    pub label: String,
    pub level: f64,
    pub role: LevelRole,
    pub days_unbroken: i64,
    /// `|last close - level|`.
    pub distance_from_price: f64,
    pub strength: Strength,
}

/// Support when every low in the window stays above the level and the last
/// close is above it; resistance when every high stays below and the last
/// close is below.
pub fn find_unbroken_priors(
    bars: &[PriceBar],
    levels: &[KeyLevel],
    lookback_days: i64,
) -> Vec<UnbrokenPrior> {
    let window = recent_window(bars, lookback_days);
    let Some(last) = window.last() else {
        return Vec::new();
    };
    let max_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let min_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let close = last.close;

    usable(levels)
        .filter_map(|level| {
            let value = level.value;
            let role = if close > value && min_low > value {
                LevelRole::Support
            } else if close < value && max_high < value {
                LevelRole::Resistance
            } else {
                return None;
            };
            Some(UnbrokenPrior {
                timeframe: level.timeframe,
                label: level.label.clone(),
                level: value,
                role,
                days_unbroken: lookback_days,
                distance_from_price: (close - value).abs(),
                strength: Strength::Strong,
            })
        })
        .collect()
}
