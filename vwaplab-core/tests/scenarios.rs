//! End-to-end scenarios with hand-computed expectations.

use chrono::{Duration, NaiveDate};
use vwaplab_core::config::{AnalysisConfig, EntryConfig};
use vwaplab_core::distance::Distance;
use vwaplab_core::magnet::magnet_levels;
use vwaplab_core::patterns::find_confluences;
use vwaplab_core::scoring::{assess_entry, EntryQuality};
use vwaplab_core::vwap::compute_vwap;
use vwaplab_core::{analyze, KeyLevel, Period, PeriodKind, PriceBar, Side};

const EPS: f64 = 1e-9;

fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap() + Duration::days(n)
}

fn level(kind: PeriodKind, value: f64) -> KeyLevel {
    let start = day(0).and_hms_opt(0, 0, 0).unwrap();
    KeyLevel::new(&Period::current(kind, start, format!("{kind} VWAP")), value)
}

#[test]
fn two_bar_vwap_matches_hand_computation() {
    let bars = vec![
        PriceBar::daily(day(0), 11.0, 12.0, 9.0, 11.0, 100),
        PriceBar::daily(day(1), 11.0, 13.0, 10.0, 12.0, 200),
    ];
    let result = compute_vwap(&bars, &[1.0]);
    let expected = (100.0 * 32.0 / 3.0 + 200.0 * 35.0 / 3.0) / 300.0;
    assert!((result.vwap - expected).abs() < EPS);
    assert_eq!(result.bar_count, 2);
}

#[test]
fn zero_volume_is_an_empty_result() {
    let bars = vec![PriceBar::daily(day(0), 11.0, 12.0, 9.0, 11.0, 0)];
    let result = compute_vwap(&bars, &[1.0]);
    assert!(result.is_empty());
    assert_eq!(result.std_dev, 0.0);
}

#[test]
fn one_sigma_above_sits_on_a_key_level() {
    let keys = AnalysisConfig::default().vwap.key_multipliers;
    let d = Distance::compute(105.0, 100.0, 5.0, &keys, 0.05);
    assert!((d.sigma_distance - 1.0).abs() < EPS);
    assert_eq!(d.nearest_key_level, 1.0);
    assert!(d.residual.abs() < EPS);
    assert!(d.near_key_level);
    assert!((d.percent_distance - 5.0).abs() < EPS);
}

#[test]
fn close_levels_cluster_and_distant_one_does_not() {
    let levels = vec![
        level(PeriodKind::Yearly, 100.1),
        level(PeriodKind::Quarterly, 100.3),
        level(PeriodKind::ThreeMonth, 105.0),
    ];
    let clusters = find_confluences(&levels, 100.0, 0.01, 0.02);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].count(), 2);
    assert!(clusters[0].contains(100.1));
    assert!(clusters[0].contains(100.3));
    assert!(!clusters[0].contains(105.0));
    assert!((clusters[0].level - 100.2).abs() < EPS);
}

#[test]
fn entry_on_a_vwap_is_excellent() {
    let levels = vec![level(PeriodKind::Yearly, 50.0), level(PeriodKind::Quarterly, 48.0)];
    let assessment = assess_entry(50.0, &levels, None, &EntryConfig::default());
    assert_eq!(assessment.quality, EntryQuality::Excellent);
    assert_eq!(assessment.distance_pct, Some(0.0));
    assert_eq!(
        assessment.matched_vwap.map(|l| l.timeframe),
        Some(PeriodKind::Yearly)
    );
}

#[test]
fn first_magnet_pair_and_distances() {
    let magnets = magnet_levels(100.0, 110.0, &[0.27], 0.05, None);
    assert_eq!(magnets.len(), 2);
    let above = magnets.iter().find(|m| m.side == Side::Above).unwrap();
    let below = magnets.iter().find(|m| m.side == Side::Below).unwrap();
    assert!((above.price - 127.0).abs() < EPS);
    assert!((below.price - 73.0).abs() < EPS);
    assert!((above.distance_from_price - 17.0).abs() < EPS);
    assert!((below.distance_from_price - 37.0).abs() < EPS);
    // Sorted nearest first.
    assert_eq!(magnets[0].side, Side::Above);
}

#[test]
fn empty_input_gives_empty_analysis() {
    let analysis = analyze(&[], Some(25.0), &AnalysisConfig::default());
    assert!(analysis.vwaps.is_none());
    assert!(analysis.top_levels.is_empty());
    assert!(analysis.patterns.is_empty());
    assert_eq!(analysis.current_price, 25.0);
}

#[test]
fn price_override_and_entry_flow_through_analysis() {
    // Steady uptrend through Q1 2025.
    let bars: Vec<PriceBar> = (0..60)
        .map(|i| {
            let close = 20.0 + i as f64 * 0.1;
            PriceBar::daily(
                NaiveDate::from_ymd_opt(2025, 1, 2).unwrap() + Duration::days(i),
                close - 0.05,
                close + 0.2,
                close - 0.2,
                close,
                10_000,
            )
        })
        .collect();
    let config = AnalysisConfig::default();

    let analysis = vwaplab_core::analysis::analyze_with_entry(&bars, Some(30.0), Some(22.0), &config);
    assert_eq!(analysis.current_price, 30.0);

    let yearly = analysis.vwap(PeriodKind::Yearly).unwrap();
    let first = bars.first().unwrap().typical_price();
    let last = bars.last().unwrap().typical_price();
    assert!(yearly > first && yearly < last);

    let dev = analysis
        .deviations
        .iter()
        .find(|d| d.timeframe == PeriodKind::Yearly)
        .unwrap();
    assert!(dev.above);
    assert!((dev.dollars - (30.0 - yearly)).abs() < EPS);

    let entry = analysis.entry.unwrap();
    assert_ne!(entry.quality, EntryQuality::Unknown);
    assert!(entry.distance_pct.is_some());

    // A non-positive override falls back to the latest close.
    let fallback = analyze(&bars, Some(-1.0), &config);
    assert_eq!(fallback.current_price, bars.last().unwrap().close);
}
