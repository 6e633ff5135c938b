//! Historical pattern validation.
//!
//! Two directional touch studies over full bar histories:
//!
//! - prior-quarter rejection: once a calendar quarter completes, its VWAP
//!   becomes a fixed level; each later bar that trades through it is
//!   classified by approach side and close.
//! - sigma support: the year-to-date VWAP shifted by a sigma multiple; each
//!   touch is classified by whether the touch bar closed back above it.
//!
//! Results aggregate across symbols into rates and a verdict.

use crate::config::ValidationConfig;
use crate::domain::PriceBar;
use crate::vwap::{compute_vwap, prior_quarter, quarter_of, VwapAccumulator};
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a touched level resolved on the touch bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchKind {
    /// Approached from below, closed below.
    Rejection,
    /// Approached from below, closed above.
    BreakThrough,
    /// Approached from above, closed above.
    SupportHold,
    /// Approached from above, closed below.
    SupportBreak,
}

impl TouchKind {
    /// The level held price back.
    pub fn held(&self) -> bool {
        matches!(self, TouchKind::Rejection | TouchKind::SupportHold)
    }
}

/// One touch of a prior-quarter VWAP and what followed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchOutcome {
    pub symbol: String,
    pub quarter: String,
    pub level: f64,
    pub kind: TouchKind,
    pub timestamp: NaiveDateTime,
    pub close: f64,
    /// Low after a rejection or support break, high otherwise.
    pub extreme_price: f64,
    /// `(extreme - level) / level * 100`.
    pub move_pct: f64,
    /// Bars after the touch until the extreme (1 = next bar).
    pub bars_to_extreme: usize,
}

/// One touch of the sigma-shifted yearly VWAP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmaTouch {
    pub symbol: String,
    pub year: i32,
    pub timestamp: NaiveDateTime,
    pub level: f64,
    pub vwap: f64,
    pub std_dev: f64,
    pub touch_low: f64,
    pub close: f64,
    pub bounced: bool,
    /// Bounce: `(max high - level) / level * 100`; failure: the same with
    /// the min low.
    pub move_pct: f64,
    /// Bars after the touch bar until the extreme (0 = the touch bar).
    pub bars_to_extreme: usize,
    /// The forward high reached the yearly VWAP.
    pub reached_vwap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Validated,
    Viable,
    NotValidated,
}

impl Verdict {
    pub fn from_rate(rate: f64, config: &ValidationConfig) -> Self {
        if rate >= config.validated_rate {
            Verdict::Validated
        } else if rate >= config.viable_rate {
            Verdict::Viable
        } else {
            Verdict::NotValidated
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Validated => f.write_str("PATTERN VALIDATED"),
            Verdict::Viable => f.write_str("PATTERN VIABLE"),
            Verdict::NotValidated => f.write_str("PATTERN NOT VALIDATED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionSummary {
    pub total: usize,
    /// Rejections plus support holds.
    pub held: usize,
    pub held_rate: f64,
    /// Break-throughs plus support breaks.
    pub broke: usize,
    pub broke_rate: f64,
    pub avg_reversal_pct: f64,
    pub avg_bars_to_low: f64,
    pub avg_continuation_pct: f64,
    pub by_symbol: BTreeMap<String, usize>,
    pub by_year: BTreeMap<i32, usize>,
    pub verdict: Verdict,
    pub instances: Vec<TouchOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmaSummary {
    pub sigma_level: f64,
    pub total: usize,
    pub bounces: usize,
    pub bounce_rate: f64,
    pub failures: usize,
    pub failure_rate: f64,
    pub reached_vwap: usize,
    pub vwap_reach_rate: f64,
    pub avg_bounce_pct: f64,
    pub avg_bars_to_high: f64,
    pub avg_breakdown_pct: f64,
    pub by_symbol: BTreeMap<String, usize>,
    pub by_year: BTreeMap<i32, usize>,
    pub verdict: Verdict,
    pub instances: Vec<SigmaTouch>,
}

/// Both studies over a set of symbols. A study with no instances is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rejection: Option<RejectionSummary>,
    pub sigma: Option<SigmaSummary>,
}

/// Run both studies over `(symbol, bars)` pairs.
pub fn validate(series: &[(String, Vec<PriceBar>)], config: &ValidationConfig) -> ValidationReport {
    let mut touches = Vec::new();
    let mut sigma = Vec::new();
    for (symbol, bars) in series {
        touches.extend(prior_quarter_touches(symbol, bars, config));
        sigma.extend(sigma_touches(symbol, bars, config));
    }
    ValidationReport {
        rejection: summarize_rejections(touches, config),
        sigma: summarize_sigma(sigma, config),
    }
}

/// Touches of every completed quarter's VWAP within `follow_bars` after it.
pub fn prior_quarter_touches(
    symbol: &str,
    bars: &[PriceBar],
    config: &ValidationConfig,
) -> Vec<TouchOutcome> {
    let mut out = Vec::new();
    for (year, quarter) in quarters_present(bars) {
        let Some(period) = prior_quarter(year, quarter) else {
            continue;
        };
        let result = compute_vwap(period.slice(bars), &[]);
        if result.is_empty() {
            continue;
        }
        let level = result.vwap;

        let Some(end) = period.end else {
            continue;
        };
        let after = bars.partition_point(|b| b.timestamp <= end);
        let follow = &bars[after..bars.len().min(after + config.follow_bars)];

        let tolerance = level * config.touch_tolerance;
        for (i, bar) in follow.iter().enumerate() {
            if bar.high < level - tolerance || bar.low > level + tolerance {
                continue;
            }
            let forward_end = follow.len().min(i + 1 + config.forward_bars);
            let forward = &follow[i + 1..forward_end];
            if let Some(outcome) = touch_outcome(symbol, &period.label, bar, forward, level) {
                out.push(outcome);
            }
        }
    }
    out
}

fn touch_outcome(
    symbol: &str,
    quarter: &str,
    bar: &PriceBar,
    forward: &[PriceBar],
    level: f64,
) -> Option<TouchOutcome> {
    if forward.is_empty() || bar.high < level || bar.low > level {
        return None;
    }
    let from_below = bar.open < level || bar.low < level;
    let kind = match (from_below, bar.close < level, bar.close > level) {
        (true, true, _) => TouchKind::Rejection,
        (true, _, true) => TouchKind::BreakThrough,
        (false, _, true) => TouchKind::SupportHold,
        (false, true, _) => TouchKind::SupportBreak,
        _ => return None,
    };
    let (extreme_price, idx) = match kind {
        TouchKind::Rejection | TouchKind::SupportBreak => first_extreme(forward, |b| b.low, |a, b| a < b),
        TouchKind::BreakThrough | TouchKind::SupportHold => first_extreme(forward, |b| b.high, |a, b| a > b),
    };
    Some(TouchOutcome {
        symbol: symbol.to_string(),
        quarter: quarter.to_string(),
        level,
        kind,
        timestamp: bar.timestamp,
        close: bar.close,
        extreme_price,
        move_pct: (extreme_price - level) / level * 100.0,
        bars_to_extreme: idx + 1,
    })
}

/// Touches of `vwap + sigma_level * std_dev` on the year-to-date VWAP.
pub fn sigma_touches(symbol: &str, bars: &[PriceBar], config: &ValidationConfig) -> Vec<SigmaTouch> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < bars.len() {
        let year = bars[start].timestamp.year();
        let len = bars[start..].partition_point(|b| b.timestamp.year() == year);
        let year_bars = &bars[start..start + len];
        start += len;

        let mut acc = VwapAccumulator::new();
        for (i, bar) in year_bars.iter().enumerate() {
            acc.push(bar);
            if i < config.warmup_bars {
                continue;
            }
            let (Some(vwap), Some(std_dev)) = (acc.vwap(), acc.std_dev()) else {
                continue;
            };
            let level = vwap + config.sigma_level * std_dev;
            let tolerance = vwap * config.touch_tolerance;
            if bar.low > level + tolerance || bar.high < level - tolerance {
                continue;
            }
            let future = &year_bars[i..year_bars.len().min(i + config.forward_bars)];
            if future.len() <= config.min_forward_bars {
                continue;
            }

            let (bounced, (extreme, idx)) = if bar.close > level {
                (true, first_extreme(future, |b| b.high, |a, b| a > b))
            } else if bar.close < level {
                (false, first_extreme(future, |b| b.low, |a, b| a < b))
            } else {
                continue;
            };
            let highest = future.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            out.push(SigmaTouch {
                symbol: symbol.to_string(),
                year,
                timestamp: bar.timestamp,
                level,
                vwap,
                std_dev,
                touch_low: bar.low,
                close: bar.close,
                bounced,
                move_pct: (extreme - level) / level * 100.0,
                bars_to_extreme: idx,
                reached_vwap: highest >= vwap,
            });
        }
    }
    out
}

pub fn summarize_rejections(
    instances: Vec<TouchOutcome>,
    config: &ValidationConfig,
) -> Option<RejectionSummary> {
    if instances.is_empty() {
        return None;
    }
    let total = instances.len();
    let held: Vec<&TouchOutcome> = instances.iter().filter(|o| o.kind.held()).collect();
    let broke: Vec<&TouchOutcome> = instances.iter().filter(|o| !o.kind.held()).collect();
    let rejections: Vec<&TouchOutcome> = instances
        .iter()
        .filter(|o| o.kind == TouchKind::Rejection)
        .collect();
    let break_throughs: Vec<&TouchOutcome> = instances
        .iter()
        .filter(|o| o.kind == TouchKind::BreakThrough)
        .collect();

    let held_rate = rate(held.len(), total);
    Some(RejectionSummary {
        total,
        held: held.len(),
        held_rate,
        broke: broke.len(),
        broke_rate: rate(broke.len(), total),
        avg_reversal_pct: mean(rejections.iter().map(|o| o.move_pct)),
        avg_bars_to_low: mean(rejections.iter().map(|o| o.bars_to_extreme as f64)),
        avg_continuation_pct: mean(break_throughs.iter().map(|o| o.move_pct)),
        by_symbol: count_by(instances.iter().map(|o| o.symbol.clone())),
        by_year: count_by(instances.iter().map(|o| o.timestamp.year())),
        verdict: Verdict::from_rate(held_rate, config),
        instances,
    })
}

pub fn summarize_sigma(instances: Vec<SigmaTouch>, config: &ValidationConfig) -> Option<SigmaSummary> {
    if instances.is_empty() {
        return None;
    }
    let total = instances.len();
    let bounces: Vec<&SigmaTouch> = instances.iter().filter(|t| t.bounced).collect();
    let failures: Vec<&SigmaTouch> = instances.iter().filter(|t| !t.bounced).collect();
    let reached = bounces.iter().filter(|t| t.reached_vwap).count();

    let bounce_rate = rate(bounces.len(), total);
    Some(SigmaSummary {
        sigma_level: config.sigma_level,
        total,
        bounces: bounces.len(),
        bounce_rate,
        failures: failures.len(),
        failure_rate: rate(failures.len(), total),
        reached_vwap: reached,
        vwap_reach_rate: rate(reached, bounces.len()),
        avg_bounce_pct: mean(bounces.iter().map(|t| t.move_pct)),
        avg_bars_to_high: mean(bounces.iter().map(|t| t.bars_to_extreme as f64)),
        avg_breakdown_pct: mean(failures.iter().map(|t| t.move_pct.abs())),
        by_symbol: count_by(instances.iter().map(|t| t.symbol.clone())),
        by_year: count_by(instances.iter().map(|t| t.year)),
        verdict: Verdict::from_rate(bounce_rate, config),
        instances,
    })
}

/// Distinct (year, quarter) pairs in bar order.
fn quarters_present(bars: &[PriceBar]) -> Vec<(i32, u32)> {
    let mut out: Vec<(i32, u32)> = Vec::new();
    for bar in bars {
        let key = (bar.timestamp.year(), quarter_of(bar.date()));
        if out.last() != Some(&key) {
            out.push(key);
        }
    }
    out
}

/// First bar holding the extreme of `value` under `better`; returns the
/// value and its index. `bars` must be non-empty.
fn first_extreme(
    bars: &[PriceBar],
    value: impl Fn(&PriceBar) -> f64,
    better: impl Fn(f64, f64) -> bool,
) -> (f64, usize) {
    let mut best = (value(&bars[0]), 0);
    for (i, bar) in bars.iter().enumerate().skip(1) {
        let v = value(bar);
        if better(v, best.0) {
            best = (v, i);
        }
    }
    best
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn count_by<K: Ord>(keys: impl Iterator<Item = K>) -> BTreeMap<K, usize> {
    let mut map = BTreeMap::new();
    for k in keys {
        *map.entry(k).or_insert(0) += 1;
    }
    map
}
