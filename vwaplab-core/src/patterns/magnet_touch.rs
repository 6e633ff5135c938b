//! Magnet interactions: bars whose extremes tagged a magnet level.
//!
//! Highs are tested against the above magnet (acting as resistance), lows
//! against the below magnet (acting as support). The tolerance is relative
//! to the magnet being tested.

use super::{recent_window, usable, LevelRole};
use crate::domain::{KeyLevel, PeriodKind, PriceBar, Side};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnetInteraction {
    pub timeframe: PeriodKind,
    pub label: String,
    /// VWAP the magnet is derived from.
    pub vwap: f64,
    pub multiplier: f64,
    pub side: Side,
    pub magnet_level: f64,
    pub acted_as: LevelRole,
    pub touches: usize,
    pub last_touch: NaiveDateTime,
}

impl MagnetInteraction {
    /// Display tag such as `+27%` or `-127%`.
    pub fn magnet_pct(&self) -> String {
        let pct = (self.multiplier * 100.0).round() as i64;
        match self.side {
            Side::Above => format!("+{pct}%"),
            Side::Below => format!("-{pct}%"),
        }
    }
}

/// Touch groups with at least one touch, most touched first.
pub fn find_magnet_interactions(
    bars: &[PriceBar],
    levels: &[KeyLevel],
    lookback_days: i64,
    multipliers: &[f64],
    tolerance: f64,
) -> Vec<MagnetInteraction> {
    let window = recent_window(bars, lookback_days);
    if window.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    for level in usable(levels) {
        for &m in multipliers {
            let above = level.value * (1.0 + m);
            let below = level.value * (1.0 - m);

            let groups = [
                (Side::Above, above, LevelRole::Resistance),
                (Side::Below, below, LevelRole::Support),
            ];
            for (side, magnet, role) in groups {
                if magnet <= 0.0 {
                    continue;
                }
                let band = magnet * tolerance;
                let touched: Vec<&PriceBar> = window
                    .iter()
                    .filter(|b| {
                        let extreme = match side {
                            Side::Above => b.high,
                            Side::Below => b.low,
                        };
                        (extreme - magnet).abs() <= band
                    })
                    .collect();
                let Some(last) = touched.last() else {
                    continue;
                };
                out.push(MagnetInteraction {
                    timeframe: level.timeframe,
                    label: level.label.clone(),
                    vwap: level.value,
                    multiplier: m,
                    side,
                    magnet_level: magnet,
                    acted_as: role,
                    touches: touched.len(),
                    last_touch: last.timestamp,
                });
            }
        }
    }
    out.sort_by(|a, b| b.touches.cmp(&a.touches));
    out
}
