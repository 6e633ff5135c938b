//! Criterion benchmarks for the analysis hot paths.
//!
//! Benchmarks:
//! 1. Batch VWAP/σ over growing bar counts
//! 2. Incremental accumulator over the same bars
//! 3. Full single-instrument analysis (periods, magnets, patterns, scoring)

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vwaplab_core::vwap::{compute_vwap, VwapAccumulator};
use vwaplab_core::{analyze, AnalysisConfig, PriceBar};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<PriceBar> {
    let base_date = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            PriceBar::daily(
                base_date + Duration::days(i as i64),
                close - 0.3,
                close + 1.5,
                close - 1.5,
                close,
                1_000_000 + (i as u64 % 500_000),
            )
        })
        .collect()
}

const MULTS: [f64; 8] = [0.27, 0.5, 1.0, 1.27, 1.618, 2.0, 2.27, 2.618];

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_calculator(c: &mut Criterion) {
    let mut group = c.benchmark_group("calculator");
    for n in [252usize, 1_000, 5_000] {
        let bars = make_bars(n);
        group.bench_with_input(BenchmarkId::new("compute_vwap", n), &bars, |b, bars| {
            b.iter(|| compute_vwap(black_box(bars), &MULTS))
        });
        group.bench_with_input(BenchmarkId::new("accumulator", n), &bars, |b, bars| {
            b.iter(|| {
                let mut acc = VwapAccumulator::new();
                for bar in black_box(bars) {
                    acc.push(bar);
                }
                acc.result(&MULTS)
            })
        });
    }
    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let mut group = c.benchmark_group("analysis");
    for n in [252usize, 1_260] {
        let bars = make_bars(n);
        group.bench_with_input(BenchmarkId::new("analyze", n), &bars, |b, bars| {
            b.iter(|| analyze(black_box(bars), None, &config))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_calculator, bench_analysis);
criterion_main!(benches);
