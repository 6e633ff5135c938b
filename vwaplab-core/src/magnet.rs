//! Magnet levels: fixed fractional offsets around a VWAP that price tends to
//! gravitate toward.
//!
//! For a multiplier `m`, the above level is `vwap * (1 + m)` and the below
//! level is `vwap * (1 - m)`. A below level at or under zero is not a price
//! and is skipped.

use crate::config::MagnetConfig;
use crate::domain::{KeyLevel, Side};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnetLevel {
    /// VWAP the level is derived from.
    pub vwap: f64,
    /// Unsigned fractional offset; direction is carried by `side`.
    pub multiplier: f64,
    pub price: f64,
    pub side: Side,
    /// `|current_price - price|`.
    pub distance_from_price: f64,
    pub nearby: bool,
}

impl MagnetLevel {
    /// Signed offset in percent, e.g. `+27.0` or `-127.0`.
    pub fn deviation_pct(&self) -> f64 {
        match self.side {
            Side::Above => self.multiplier * 100.0,
            Side::Below => -self.multiplier * 100.0,
        }
    }

    /// Same VWAP, multiplier and side.
    pub fn matches(&self, vwap: f64, multiplier: f64, side: Side) -> bool {
        self.side == side
            && (self.vwap - vwap).abs() < 1e-12
            && (self.multiplier - multiplier).abs() < 1e-12
    }
}

/// Closest magnets for one timeframe VWAP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeMagnets {
    pub level: KeyLevel,
    pub magnets: Vec<MagnetLevel>,
}

/// All magnet levels around one VWAP, sorted by distance from `price`.
///
/// `nearby` marks levels within `nearby_pct` (a fraction) of price. When
/// `price_range` is given only levels inside `[min, max]` are returned.
pub fn magnet_levels(
    vwap: f64,
    price: f64,
    multipliers: &[f64],
    nearby_pct: f64,
    price_range: Option<(f64, f64)>,
) -> Vec<MagnetLevel> {
    if !(vwap > 0.0) {
        return Vec::new();
    }

    let make = |multiplier: f64, level: f64, side: Side| {
        let distance = (price - level).abs();
        MagnetLevel {
            vwap,
            multiplier,
            price: level,
            side,
            distance_from_price: distance,
            nearby: price > 0.0 && distance / price < nearby_pct,
        }
    };

    let mut magnets = Vec::with_capacity(multipliers.len() * 2);
    for &m in multipliers {
        magnets.push(make(m, vwap * (1.0 + m), Side::Above));
        let below = vwap * (1.0 - m);
        if below > 0.0 {
            magnets.push(make(m, below, Side::Below));
        }
    }

    if let Some((min, max)) = price_range {
        magnets.retain(|mag| mag.price >= min && mag.price <= max);
    }
    magnets.sort_by(|a, b| a.distance_from_price.total_cmp(&b.distance_from_price));
    magnets
}

/// Magnets within `aggregate_nearby_pct` of price for every usable level,
/// keeping the `per_timeframe_cap` closest per level.
pub fn find_all_magnet_levels(
    levels: &[KeyLevel],
    price: f64,
    config: &MagnetConfig,
) -> Vec<TimeframeMagnets> {
    levels
        .iter()
        .filter(|level| level.is_usable())
        .map(|level| {
            let magnets = magnet_levels(
                level.value,
                price,
                &config.multipliers,
                config.listing_nearby_pct,
                None,
            )
            .into_iter()
            .filter(|m| price > 0.0 && m.distance_from_price / price < config.aggregate_nearby_pct)
            .take(config.per_timeframe_cap)
            .collect();
            TimeframeMagnets {
                level: level.clone(),
                magnets,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PeriodKind;
    use crate::test_support::{assert_approx, key_level, DEFAULT_EPSILON};

    #[test]
    fn first_multiplier_produces_both_sides() {
        let magnets = magnet_levels(100.0, 120.0, &[0.27], 0.05, None);
        assert_eq!(magnets.len(), 2);

        let above = magnets.iter().find(|m| m.side == Side::Above).unwrap();
        assert_approx(above.price, 127.0, 1e-9);
        assert_approx(above.distance_from_price, 7.0, 1e-9);
        assert!(!above.nearby);

        let below = magnets.iter().find(|m| m.side == Side::Below).unwrap();
        assert_approx(below.price, 73.0, 1e-9);
        assert_approx(below.distance_from_price, 47.0, 1e-9);
        assert_approx(below.deviation_pct(), -27.0, 1e-9);

        // Sorted by distance: above (7) before below (47).
        assert_eq!(magnets[0].side, Side::Above);
    }

    #[test]
    fn below_levels_at_or_under_zero_are_skipped() {
        let magnets = magnet_levels(100.0, 100.0, &[0.27, 1.27, 2.27], 0.05, None);
        assert_eq!(magnets.len(), 4);
        assert_eq!(magnets.iter().filter(|m| m.side == Side::Below).count(), 1);
        assert!(magnets.iter().all(|m| m.price > 0.0));
    }

    #[test]
    fn nearby_threshold_is_relative_to_price() {
        let magnets = magnet_levels(100.0, 125.0, &[0.27], 0.05, None);
        let above = &magnets[0];
        assert_eq!(above.side, Side::Above);
        assert!(above.nearby, "127 is within 5% of 125");
    }

    #[test]
    fn price_range_filters_levels() {
        let magnets = magnet_levels(100.0, 100.0, &[0.27, 1.27], 0.05, Some((50.0, 150.0)));
        let prices: Vec<f64> = magnets.iter().map(|m| m.price).collect();
        assert_eq!(prices.len(), 2);
        assert!(prices.iter().all(|p| (50.0..=150.0).contains(p)));
    }

    #[test]
    fn non_positive_vwap_has_no_magnets() {
        assert!(magnet_levels(0.0, 100.0, &[0.27], 0.05, None).is_empty());
        assert!(magnet_levels(-5.0, 100.0, &[0.27], 0.05, None).is_empty());
    }

    #[test]
    fn aggregate_finder_keeps_close_levels_only() {
        let config = MagnetConfig::default();
        let levels = vec![
            key_level(PeriodKind::Yearly, 100.0),
            key_level(PeriodKind::Quarterly, 0.0),
        ];
        let all = find_all_magnet_levels(&levels, 125.0, &config);
        assert_eq!(all.len(), 1, "zero VWAP is skipped");
        let yearly = &all[0];
        assert_eq!(yearly.level.timeframe, PeriodKind::Yearly);
        // Only 127 is within 10% of 125.
        assert_eq!(yearly.magnets.len(), 1);
        assert_approx(yearly.magnets[0].price, 127.0, 1e-9);
    }

    #[test]
    fn aggregate_finder_caps_per_timeframe() {
        let config = MagnetConfig {
            multipliers: vec![0.01, 0.02, 0.03, 0.04, 0.05, 0.06],
            per_timeframe_cap: 5,
            ..MagnetConfig::default()
        };
        let levels = vec![key_level(PeriodKind::Daily, 100.0)];
        let all = find_all_magnet_levels(&levels, 100.0, &config);
        assert_eq!(all[0].magnets.len(), 5);
        let distances: Vec<f64> = all[0].magnets.iter().map(|m| m.distance_from_price).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
        assert_approx(distances[0], 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn matches_identifies_interaction_source() {
        let magnets = magnet_levels(100.0, 100.0, &[0.27], 0.05, None);
        let above = magnets.iter().find(|m| m.side == Side::Above).unwrap();
        assert!(above.matches(100.0, 0.27, Side::Above));
        assert!(!above.matches(100.0, 0.27, Side::Below));
    }
}
