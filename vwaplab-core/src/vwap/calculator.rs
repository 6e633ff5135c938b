//! Volume-weighted average price and volume-weighted standard deviation.
//!
//! Deviation at each bar is measured against the *running* VWAP at that bar,
//! not the final one:
//!
//! ```text
//! S_i = Σ v_k * tp_k          V_i = Σ v_k          vwap_i = S_i / V_i
//! var_n = Σ v_i * (tp_i - vwap_i)^2 / V_n          std_n = sqrt(var_n)
//! ```
//!
//! Empty input or zero total volume produces an empty result, never an error.

use crate::domain::PriceBar;
use serde::{Deserialize, Serialize};

/// One sigma band: `vwap + multiplier * std_dev` (multiplier is signed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmaBand {
    pub multiplier: f64,
    pub price: f64,
}

/// VWAP statistics over one bar range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapResult {
    pub vwap: f64,
    pub std_dev: f64,
    /// Ordered +m then -m for each configured multiplier.
    pub bands: Vec<SigmaBand>,
    pub bar_count: usize,
    /// Total volume accumulated over the range.
    pub volume: f64,
}

impl VwapResult {
    /// The zeroed result for an empty range or zero volume.
    pub fn empty(bar_count: usize) -> Self {
        Self {
            vwap: 0.0,
            std_dev: 0.0,
            bands: Vec::new(),
            bar_count,
            volume: 0.0,
        }
    }

    /// True when no volume was accumulated (the VWAP is undefined).
    pub fn is_empty(&self) -> bool {
        !(self.volume > 0.0)
    }

    /// Band price for a signed multiplier, if it was configured.
    pub fn band(&self, multiplier: f64) -> Option<f64> {
        self.bands
            .iter()
            .find(|b| (b.multiplier - multiplier).abs() < 1e-12)
            .map(|b| b.price)
    }
}

/// Incremental VWAP/σ accumulator.
///
/// Feeding bars one at a time yields the same statistics as `compute_vwap`
/// over the same prefix, so a growing window can be tracked in O(1) per bar.
#[derive(Debug, Clone, Default)]
pub struct VwapAccumulator {
    cum_volume: f64,
    cum_pv: f64,
    cum_sq_dev: f64,
    bar_count: usize,
}

impl VwapAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bar: &PriceBar) {
        self.bar_count += 1;
        let volume = bar.volume as f64;
        if volume <= 0.0 {
            return;
        }
        let tp = bar.typical_price();
        self.cum_volume += volume;
        self.cum_pv += tp * volume;
        let running_vwap = self.cum_pv / self.cum_volume;
        let deviation = tp - running_vwap;
        self.cum_sq_dev += deviation * deviation * volume;
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    /// Current VWAP, or `None` before any volume has traded.
    pub fn vwap(&self) -> Option<f64> {
        if self.cum_volume > 0.0 {
            Some(self.cum_pv / self.cum_volume)
        } else {
            None
        }
    }

    /// Current volume-weighted standard deviation, or `None` before any volume.
    pub fn std_dev(&self) -> Option<f64> {
        if self.cum_volume > 0.0 {
            Some((self.cum_sq_dev / self.cum_volume).max(0.0).sqrt())
        } else {
            None
        }
    }

    /// Snapshot the accumulated statistics with bands for `multipliers`.
    pub fn result(&self, multipliers: &[f64]) -> VwapResult {
        let (Some(vwap), Some(std_dev)) = (self.vwap(), self.std_dev()) else {
            return VwapResult::empty(self.bar_count);
        };
        let bands = multipliers
            .iter()
            .flat_map(|&m| {
                [
                    SigmaBand {
                        multiplier: m,
                        price: vwap + m * std_dev,
                    },
                    SigmaBand {
                        multiplier: -m,
                        price: vwap - m * std_dev,
                    },
                ]
            })
            .collect();
        VwapResult {
            vwap,
            std_dev,
            bands,
            bar_count: self.bar_count,
            volume: self.cum_volume,
        }
    }
}

/// Compute VWAP, σ and bands over an ascending bar slice.
pub fn compute_vwap(bars: &[PriceBar], multipliers: &[f64]) -> VwapResult {
    let mut acc = VwapAccumulator::new();
    for bar in bars {
        acc.push(bar);
    }
    acc.result(multipliers)
}
