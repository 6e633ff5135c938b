//! Multi-period orchestrator: derives the period set from a reference
//! instant and runs the calculator over each period's bar slice.

use super::calculator::{compute_vwap, VwapResult};
use super::periods::BoundaryPolicy;
use crate::config::VwapConfig;
use crate::distance::Distance;
use crate::domain::{KeyLevel, Period, PeriodKind, PriceBar};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// VWAP statistics and price distance for one period.
///
/// `vwap == None` means the period had no bars (or no volume): there is no
/// VWAP for it, which is different from a VWAP of zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodVwap {
    pub period: Period,
    pub vwap: Option<VwapResult>,
    pub distance: Option<Distance>,
}

impl PeriodVwap {
    /// The VWAP value when one exists and is positive.
    pub fn level(&self) -> Option<f64> {
        self.vwap
            .as_ref()
            .map(|v| v.vwap)
            .filter(|v| v.is_finite() && *v > 0.0)
    }

    pub fn key_level(&self) -> Option<KeyLevel> {
        self.level().map(|v| KeyLevel::new(&self.period, v))
    }
}

/// All period VWAPs for one instrument at one reference instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPeriodVwap {
    pub reference: NaiveDateTime,
    pub current_price: f64,
    /// Current periods in yearly, quarterly, three_month, daily order.
    pub current: Vec<PeriodVwap>,
    pub prior_yearly: Vec<PeriodVwap>,
    pub prior_quarterly: Vec<PeriodVwap>,
}

impl MultiPeriodVwap {
    /// The current period of a given kind.
    pub fn current(&self, kind: PeriodKind) -> Option<&PeriodVwap> {
        self.current.iter().find(|p| p.period.kind == kind)
    }

    /// Swap in a current period of the same kind, e.g. a session VWAP built
    /// from intraday bars.
    pub fn replace_current(&mut self, period: PeriodVwap) {
        match self.current.iter_mut().find(|p| p.period.kind == period.period.kind) {
            Some(slot) => *slot = period,
            None => self.current.push(period),
        }
    }

    /// Positive current VWAPs, optionally followed by prior-period VWAPs.
    pub fn key_levels(&self, include_prior: bool) -> Vec<KeyLevel> {
        let mut levels: Vec<KeyLevel> =
            self.current.iter().filter_map(PeriodVwap::key_level).collect();
        if include_prior {
            levels.extend(
                self.prior_yearly
                    .iter()
                    .chain(self.prior_quarterly.iter())
                    .filter_map(PeriodVwap::key_level),
            );
        }
        levels
    }
}

/// Runs the calculator over every configured period.
#[derive(Debug, Clone)]
pub struct VwapOrchestrator {
    current: Vec<BoundaryPolicy>,
    prior_yearly: BoundaryPolicy,
    prior_quarterly: BoundaryPolicy,
    key_multipliers: Vec<f64>,
    near_key_threshold: f64,
}

impl VwapOrchestrator {
    pub fn new(config: &VwapConfig) -> Self {
        Self {
            current: vec![
                BoundaryPolicy::CalendarYear,
                BoundaryPolicy::CalendarQuarter,
                BoundaryPolicy::Trailing {
                    days: config.three_month_days,
                },
                BoundaryPolicy::Session {
                    open: config.session_open,
                },
            ],
            prior_yearly: BoundaryPolicy::PriorYears {
                count: config.prior_years,
            },
            prior_quarterly: BoundaryPolicy::PriorQuarters {
                count: config.prior_quarters,
            },
            key_multipliers: config.key_multipliers.clone(),
            near_key_threshold: config.near_key_threshold,
        }
    }

    /// Current periods for `reference`.
    pub fn current_periods(&self, reference: NaiveDateTime) -> Vec<Period> {
        self.current
            .iter()
            .flat_map(|policy| policy.periods(reference))
            .collect()
    }

    /// VWAP for a single period over an ascending bar series.
    pub fn compute_period(&self, bars: &[PriceBar], period: Period, price: f64) -> PeriodVwap {
        let slice = period.slice(bars);
        let result = compute_vwap(slice, &self.key_multipliers);
        if result.is_empty() {
            debug!(
                period = %period.label,
                bars = slice.len(),
                "no volume in period, skipping VWAP"
            );
            return PeriodVwap {
                period,
                vwap: None,
                distance: None,
            };
        }
        let distance = Distance::compute(
            price,
            result.vwap,
            result.std_dev,
            &self.key_multipliers,
            self.near_key_threshold,
        );
        PeriodVwap {
            period,
            vwap: Some(result),
            distance: Some(distance),
        }
    }

    /// Session VWAP over intraday bars, anchored to the latest intraday bar.
    pub fn compute_session(&self, intraday: &[PriceBar], price: f64) -> Option<PeriodVwap> {
        let reference = intraday.last()?.timestamp;
        let policy = self.current.iter().find(|p| p.kind() == PeriodKind::Daily)?;
        let period = policy.periods(reference).into_iter().next()?;
        Some(self.compute_period(intraday, period, price))
    }

    /// Compute every period. `reference` defaults to the latest bar's
    /// timestamp; with no bars and no reference there is nothing to anchor
    /// to and `None` is returned.
    pub fn compute(
        &self,
        bars: &[PriceBar],
        current_price: f64,
        reference: Option<NaiveDateTime>,
    ) -> Option<MultiPeriodVwap> {
        let reference = reference.or_else(|| bars.last().map(|b| b.timestamp))?;

        let run = |periods: Vec<Period>| -> Vec<PeriodVwap> {
            periods
                .into_iter()
                .map(|p| self.compute_period(bars, p, current_price))
                .collect()
        };

        Some(MultiPeriodVwap {
            reference,
            current_price,
            current: run(self.current_periods(reference)),
            prior_yearly: run(self.prior_yearly.periods(reference)),
            prior_quarterly: run(self.prior_quarterly.periods(reference)),
        })
    }
}
