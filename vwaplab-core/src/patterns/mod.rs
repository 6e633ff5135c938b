//! Pattern detection against current VWAP levels.
//!
//! Five independent detectors, each a pure function over the bar history
//! and the key levels. Levels that are not strictly positive are ignored.
//! Lookbacks are calendar days back from the latest bar, inclusive.

pub mod confluence;
pub mod failed_break;
pub mod magnet_touch;
pub mod reclaim;
pub mod unbroken;

pub use confluence::{find_confluences, Confluence};
pub use failed_break::{find_failed_breaks, FailedBreak, FailedBreakKind};
pub use magnet_touch::{find_magnet_interactions, MagnetInteraction};
pub use reclaim::{find_reclaims, Reclaim, ReclaimKind};
pub use unbroken::{find_unbroken_priors, UnbrokenPrior};

use crate::config::PatternConfig;
use crate::domain::{KeyLevel, PeriodKind, PriceBar, Side};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a level held price from above or below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelRole {
    Support,
    Resistance,
}

impl fmt::Display for LevelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelRole::Support => f.write_str("support"),
            LevelRole::Resistance => f.write_str("resistance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Strong,
    VeryStrong,
}

/// One detected pattern of any class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum PatternRecord {
    UnbrokenPrior(UnbrokenPrior),
    FailedBreak(FailedBreak),
    Confluence(Confluence),
    Reclaim(Reclaim),
    MagnetInteraction(MagnetInteraction),
}

/// All detected patterns, one list per class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub unbroken_priors: Vec<UnbrokenPrior>,
    pub failed_breaks: Vec<FailedBreak>,
    pub confluences: Vec<Confluence>,
    pub reclaims: Vec<Reclaim>,
    pub magnet_interactions: Vec<MagnetInteraction>,
}

impl PatternReport {
    pub fn is_empty(&self) -> bool {
        self.unbroken_priors.is_empty()
            && self.failed_breaks.is_empty()
            && self.confluences.is_empty()
            && self.reclaims.is_empty()
            && self.magnet_interactions.is_empty()
    }

    pub fn total(&self) -> usize {
        self.unbroken_priors.len()
            + self.failed_breaks.len()
            + self.confluences.len()
            + self.reclaims.len()
            + self.magnet_interactions.len()
    }

    /// Flatten into tagged records, class by class.
    pub fn records(&self) -> Vec<PatternRecord> {
        let mut out = Vec::with_capacity(self.total());
        out.extend(self.unbroken_priors.iter().cloned().map(PatternRecord::UnbrokenPrior));
        out.extend(self.failed_breaks.iter().cloned().map(PatternRecord::FailedBreak));
        out.extend(self.confluences.iter().cloned().map(PatternRecord::Confluence));
        out.extend(self.reclaims.iter().cloned().map(PatternRecord::Reclaim));
        out.extend(
            self.magnet_interactions
                .iter()
                .cloned()
                .map(PatternRecord::MagnetInteraction),
        );
        out
    }

    /// An unbroken-prior record exists at exactly `level`.
    pub fn unbroken_at(&self, level: f64) -> Option<&UnbrokenPrior> {
        self.unbroken_priors.iter().find(|u| u.level == level)
    }

    /// The confluence cluster with a member at exactly `level`.
    pub fn confluence_containing(&self, level: f64) -> Option<&Confluence> {
        self.confluences.iter().find(|c| c.contains(level))
    }

    /// A reclaim or breakdown of exactly `level` within `max_days_ago`.
    pub fn recent_reclaim(&self, level: f64, max_days_ago: i64) -> Option<&Reclaim> {
        self.reclaims
            .iter()
            .find(|r| r.level == level && r.days_ago <= max_days_ago)
    }

    /// Touches of the magnet derived from (`timeframe`, `vwap`) at
    /// `multiplier` on `side`; zero when no interaction was recorded.
    pub fn magnet_touches(&self, timeframe: PeriodKind, vwap: f64, multiplier: f64, side: Side) -> usize {
        self.magnet_interactions
            .iter()
            .filter(|m| {
                m.timeframe == timeframe
                    && m.vwap == vwap
                    && m.side == side
                    && (m.multiplier - multiplier).abs() < 1e-12
            })
            .map(|m| m.touches)
            .sum()
    }
}

/// Run every detector.
pub fn detect_all(
    bars: &[PriceBar],
    levels: &[KeyLevel],
    current_price: f64,
    config: &PatternConfig,
) -> PatternReport {
    PatternReport {
        unbroken_priors: find_unbroken_priors(bars, levels, config.lookback_days),
        failed_breaks: find_failed_breaks(bars, levels, config.failed_break_lookback_days),
        confluences: find_confluences(
            levels,
            current_price,
            config.confluence_tolerance,
            config.confluence_nearby_pct,
        ),
        reclaims: find_reclaims(bars, levels, config.reclaim_lookback_days),
        magnet_interactions: find_magnet_interactions(
            bars,
            levels,
            config.lookback_days,
            &config.interaction_multipliers,
            config.touch_tolerance,
        ),
    }
}

/// Bars from `days` calendar days before the latest bar onward. A window
/// reaching past the representable calendar covers the whole history.
pub(crate) fn recent_window(bars: &[PriceBar], days: i64) -> &[PriceBar] {
    let Some(last) = bars.last() else {
        return bars;
    };
    let Some(cutoff) = Duration::try_days(days).and_then(|d| last.timestamp.checked_sub_signed(d))
    else {
        return bars;
    };
    let from = bars.partition_point(|b| b.timestamp < cutoff);
    &bars[from..]
}

/// Whole calendar days between `bar` and the latest bar of `window`.
pub(crate) fn days_ago(window: &[PriceBar], bar: &PriceBar) -> i64 {
    window
        .last()
        .map_or(0, |last| (last.timestamp - bar.timestamp).num_days())
}

pub(crate) fn usable(levels: &[KeyLevel]) -> impl Iterator<Item = &KeyLevel> {
    levels.iter().filter(|l| l.is_usable())
}
