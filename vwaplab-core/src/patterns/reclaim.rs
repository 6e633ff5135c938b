//! Reclaims and breakdowns: closes crossing a level between consecutive bars.

use super::{days_ago, recent_window, usable};
use crate::domain::{KeyLevel, PeriodKind, PriceBar};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimKind {
    /// Close moved from at/below the level to above it.
    BullishReclaim,
    /// Close moved from above the level to at/below it.
    BearishBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reclaim {
    pub timeframe: PeriodKind,
    pub label: String,
    pub level: f64,
    pub kind: ReclaimKind,
    /// Timestamp of the bar whose close completed the cross.
    pub timestamp: NaiveDateTime,
    pub days_ago: i64,
    pub close: f64,
}

/// Crosses within the lookback, most recent first. Needs at least two bars
/// in the window.
pub fn find_reclaims(bars: &[PriceBar], levels: &[KeyLevel], lookback_days: i64) -> Vec<Reclaim> {
    let window = recent_window(bars, lookback_days);
    if window.len() < 2 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for level in usable(levels) {
        let value = level.value;
        for pair in window.windows(2) {
            let was_above = pair[0].close > value;
            let is_above = pair[1].close > value;
            let kind = match (was_above, is_above) {
                (false, true) => ReclaimKind::BullishReclaim,
                (true, false) => ReclaimKind::BearishBreakdown,
                _ => continue,
            };
            out.push(Reclaim {
                timeframe: level.timeframe,
                label: level.label.clone(),
                level: value,
                kind,
                timestamp: pair[1].timestamp,
                days_ago: days_ago(window, &pair[1]),
                close: pair[1].close,
            });
        }
    }
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bar, key_level};

    fn closes(values: &[f64]) -> Vec<PriceBar> {
        values
            .iter()
            .enumerate()
            .map(|(d, &c)| bar(d as i64, c + 1.0, c - 1.0, c, 100))
            .collect()
    }

    #[test]
    fn cross_up_is_bullish_reclaim() {
        let found = find_reclaims(&closes(&[99.0, 98.0, 101.0]), &[key_level(PeriodKind::Yearly, 100.0)], 5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ReclaimKind::BullishReclaim);
        assert_eq!(found[0].days_ago, 0);
        assert_eq!(found[0].close, 101.0);
    }

    #[test]
    fn cross_down_is_bearish_breakdown() {
        let found = find_reclaims(&closes(&[101.0, 99.0, 98.0]), &[key_level(PeriodKind::Yearly, 100.0)], 5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ReclaimKind::BearishBreakdown);
        assert_eq!(found[0].days_ago, 1);
    }

    #[test]
    fn results_are_most_recent_first() {
        let found = find_reclaims(
            &closes(&[99.0, 101.0, 102.0, 99.0, 101.0]),
            &[key_level(PeriodKind::Yearly, 100.0)],
            5,
        );
        let kinds: Vec<_> = found.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ReclaimKind::BullishReclaim,
                ReclaimKind::BearishBreakdown,
                ReclaimKind::BullishReclaim,
            ]
        );
        let ages: Vec<_> = found.iter().map(|r| r.days_ago).collect();
        assert_eq!(ages, vec![0, 1, 3]);
    }

    #[test]
    fn close_exactly_at_level_counts_as_below() {
        let found = find_reclaims(&closes(&[101.0, 100.0]), &[key_level(PeriodKind::Daily, 100.0)], 5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ReclaimKind::BearishBreakdown);
    }

    #[test]
    fn single_bar_window_has_no_crosses() {
        let bars = vec![bar(0, 99.0, 97.0, 98.0, 100), bar(10, 102.0, 100.5, 101.0, 100)];
        // Only the latest bar falls inside a 5-day window.
        assert!(find_reclaims(&bars, &[key_level(PeriodKind::Yearly, 100.0)], 5).is_empty());
    }
}
