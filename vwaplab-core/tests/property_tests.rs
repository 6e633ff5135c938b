//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. VWAP bounds: the VWAP lies between the smallest and largest typical price
//! 2. Band symmetry: +m and -m bands are mirror images around the VWAP
//! 3. Incremental equivalence: the accumulator matches the batch calculator
//! 4. Distance signs: sigma distance has the sign of price - vwap
//! 5. Magnet sanity: below levels stay positive and output is distance-sorted
//! 6. Scoring: composites stay in [0, 100] and ranks follow composites

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use vwaplab_core::config::{AnalysisConfig, ScoringConfig};
use vwaplab_core::distance::Distance;
use vwaplab_core::magnet::magnet_levels;
use vwaplab_core::scoring::{rank_levels, LevelCandidate};
use vwaplab_core::vwap::{compute_vwap, VwapAccumulator};
use vwaplab_core::{analyze, KeyLevel, Period, PeriodKind, PriceBar};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

/// A sane bar: low <= open, close <= high.
fn arb_bar() -> impl Strategy<Value = (f64, f64, f64, f64, u64)> {
    (arb_price(), 0.0..0.05_f64, 0.0..1.0_f64, 0.0..1.0_f64, 0u64..1_000_000)
        .prop_map(|(low, spread, o, c, volume)| {
            let high = low * (1.0 + spread);
            let open = low + (high - low) * o;
            let close = low + (high - low) * c;
            (open, high, low, close, volume)
        })
}

fn arb_bars(max: usize) -> impl Strategy<Value = Vec<PriceBar>> {
    prop::collection::vec(arb_bar(), 1..max).prop_map(|raw| {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        raw.into_iter()
            .enumerate()
            .map(|(i, (o, h, l, c, v))| {
                PriceBar::daily(start + Duration::days(i as i64), o, h, l, c, v)
            })
            .collect()
    })
}

fn arb_kind() -> impl Strategy<Value = PeriodKind> {
    prop::sample::select(PeriodKind::ALL.to_vec())
}

fn key_level(kind: PeriodKind, value: f64) -> KeyLevel {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    KeyLevel::new(&Period::current(kind, start, format!("{kind} VWAP")), value)
}

const MULTS: [f64; 3] = [0.5, 1.0, 2.0];

// ── 1-3. Calculator ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn vwap_within_typical_price_range(bars in arb_bars(60)) {
        let result = compute_vwap(&bars, &MULTS);
        let traded: Vec<f64> = bars
            .iter()
            .filter(|b| b.volume > 0)
            .map(PriceBar::typical_price)
            .collect();
        if traded.is_empty() {
            prop_assert!(result.is_empty());
        } else {
            let min = traded.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = traded.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let tol = 1e-9 * max;
            prop_assert!(result.vwap >= min - tol && result.vwap <= max + tol);
            prop_assert!(result.std_dev >= 0.0);
        }
    }

    #[test]
    fn bands_are_symmetric(bars in arb_bars(40)) {
        let result = compute_vwap(&bars, &MULTS);
        prop_assume!(!result.is_empty());
        for m in MULTS {
            let up = result.band(m).unwrap() - result.vwap;
            let down = result.vwap - result.band(-m).unwrap();
            prop_assert!((up - down).abs() < 1e-9 * result.vwap.max(1.0));
        }
    }

    #[test]
    fn accumulator_matches_batch(bars in arb_bars(40)) {
        let mut acc = VwapAccumulator::new();
        for (i, bar) in bars.iter().enumerate() {
            acc.push(bar);
            let batch = compute_vwap(&bars[..=i], &MULTS);
            let incremental = acc.result(&MULTS);
            prop_assert_eq!(batch.is_empty(), incremental.is_empty());
            prop_assert!((batch.vwap - incremental.vwap).abs() < 1e-9 * batch.vwap.max(1.0));
            prop_assert!((batch.std_dev - incremental.std_dev).abs() < 1e-9 * batch.vwap.max(1.0));
        }
    }
}

// ── 4. Distance ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sigma_sign_follows_price(price in arb_price(), vwap in arb_price(), std in 0.0..10.0_f64) {
        let keys = AnalysisConfig::default().vwap.key_multipliers;
        let d = Distance::compute(price, vwap, std, &keys, 0.05);
        if std == 0.0 || price == vwap {
            prop_assert_eq!(d.sigma_distance, 0.0);
        } else {
            prop_assert_eq!(d.sigma_distance > 0.0, price > vwap);
        }
        prop_assert_eq!(d.is_above(), price > vwap);
        prop_assert!(d.residual >= 0.0);
        prop_assert!(keys.iter().any(|k| (k - d.nearest_key_level.abs()).abs() < 1e-12));
    }
}

// ── 5. Magnets ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn magnets_positive_and_sorted(vwap in arb_price(), price in arb_price()) {
        let mults = AnalysisConfig::default().magnets.multipliers;
        let magnets = magnet_levels(vwap, price, &mults, 0.05, None);
        prop_assert!(magnets.iter().all(|m| m.price > 0.0));
        for pair in magnets.windows(2) {
            prop_assert!(pair[0].distance_from_price <= pair[1].distance_from_price);
        }
    }
}

// ── 6. Scoring ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn composites_bounded_and_ranked(
        levels in prop::collection::vec((arb_kind(), arb_price()), 1..12),
        price in arb_price(),
    ) {
        let config = ScoringConfig::default();
        let pool: Vec<LevelCandidate> = levels
            .iter()
            .map(|&(kind, value)| LevelCandidate::vwap(&key_level(kind, value)))
            .collect();
        let ranked = rank_levels(pool, price, None, &config);
        prop_assert_eq!(ranked.len(), levels.len());
        for (i, scored) in ranked.iter().enumerate() {
            prop_assert_eq!(scored.rank, i + 1);
            prop_assert!((0.0..=100.0).contains(&scored.composite));
        }
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].composite >= pair[1].composite);
        }
    }

    /// Full analysis over arbitrary sane bars never panics and keeps its
    /// ranking bounded.
    #[test]
    fn analysis_is_total(bars in arb_bars(120)) {
        let config = AnalysisConfig::default();
        let analysis = analyze(&bars, None, &config);
        prop_assert_eq!(analysis.bar_count, bars.len());
        prop_assert!(analysis.top_levels.len() <= config.scoring.top_n);
        for scored in &analysis.top_levels {
            prop_assert!(scored.candidate.level > 0.0);
        }
    }
}
