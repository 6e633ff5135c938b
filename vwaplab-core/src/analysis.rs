//! One-call analysis: VWAPs, magnets, patterns, ranked levels and an
//! optional entry assessment for a single instrument.

use crate::config::AnalysisConfig;
use crate::domain::{KeyLevel, PeriodKind, PriceBar};
use crate::magnet::{find_all_magnet_levels, TimeframeMagnets};
use crate::patterns::{detect_all, LevelRole, PatternReport};
use crate::scoring::{
    assess_entry, strongest_level, top_levels, EntryAssessment, ScoredLevel, StrongestLevel,
};
use crate::vwap::{MultiPeriodVwap, VwapOrchestrator};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Bars used for the recent high/low range.
pub const RECENT_RANGE_BARS: usize = 20;

/// Price position relative to one current VWAP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub timeframe: PeriodKind,
    pub label: String,
    pub vwap: f64,
    pub percent: f64,
    pub dollars: f64,
    pub above: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportResistanceLevel {
    pub timeframe: PeriodKind,
    pub level: f64,
    pub role: LevelRole,
}

/// Current VWAPs tagged by role plus the recent trading range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub levels: Vec<SupportResistanceLevel>,
    pub recent_high: f64,
    pub recent_low: f64,
    pub range_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapAnalysis {
    pub current_price: f64,
    pub bar_count: usize,
    /// `None` when there were no bars to anchor periods to.
    pub vwaps: Option<MultiPeriodVwap>,
    pub deviations: Vec<Deviation>,
    pub magnets: Vec<TimeframeMagnets>,
    pub patterns: PatternReport,
    pub top_levels: Vec<ScoredLevel>,
    pub strongest_level: Option<StrongestLevel>,
    pub support_resistance: Option<SupportResistance>,
    pub entry: Option<EntryAssessment>,
}

impl VwapAnalysis {
    fn empty(current_price: f64) -> Self {
        Self {
            current_price,
            bar_count: 0,
            vwaps: None,
            deviations: Vec::new(),
            magnets: Vec::new(),
            patterns: PatternReport::default(),
            top_levels: Vec::new(),
            strongest_level: None,
            support_resistance: None,
            entry: None,
        }
    }

    /// Levels that took part in pattern detection and scoring.
    pub fn key_levels(&self, include_prior: bool) -> Vec<KeyLevel> {
        self.vwaps
            .as_ref()
            .map(|v| v.key_levels(include_prior))
            .unwrap_or_default()
    }

    /// VWAP value for a current timeframe, if one exists.
    pub fn vwap(&self, kind: PeriodKind) -> Option<f64> {
        self.vwaps.as_ref()?.current(kind)?.level()
    }
}

/// Analyze an ascending bar series.
///
/// `price_override` replaces the latest close as the current price when it
/// is finite and positive.
pub fn analyze(bars: &[PriceBar], price_override: Option<f64>, config: &AnalysisConfig) -> VwapAnalysis {
    analyze_with_entry(bars, price_override, None, config)
}

/// `analyze`, plus an entry-quality assessment for `entry_price`.
pub fn analyze_with_entry(
    bars: &[PriceBar],
    price_override: Option<f64>,
    entry_price: Option<f64>,
    config: &AnalysisConfig,
) -> VwapAnalysis {
    analyze_market(bars, &[], price_override, entry_price, config)
}

/// Full analysis over daily history plus optional intraday bars.
///
/// When `intraday` holds bars, the daily session VWAP is computed from them
/// instead of from the daily series. Everything else uses the daily bars.
pub fn analyze_market(
    bars: &[PriceBar],
    intraday: &[PriceBar],
    price_override: Option<f64>,
    entry_price: Option<f64>,
    config: &AnalysisConfig,
) -> VwapAnalysis {
    let current_price = resolve_price(bars, price_override);
    let orchestrator = VwapOrchestrator::new(&config.vwap);
    let Some(mut vwaps) = orchestrator.compute(bars, current_price, None) else {
        return VwapAnalysis::empty(current_price);
    };
    if let Some(session) = orchestrator.compute_session(intraday, current_price) {
        vwaps.replace_current(session);
    }

    let levels = vwaps.key_levels(config.vwap.include_prior_levels);
    let magnets = find_all_magnet_levels(&levels, current_price, &config.magnets);
    let patterns = detect_all(bars, &levels, current_price, &config.patterns);
    let top = top_levels(&levels, &magnets, current_price, Some(&patterns), &config.scoring);
    let strongest = strongest_level(&levels, &magnets, current_price, &config.scoring);
    let entry = entry_price.map(|p| assess_entry(p, &levels, Some(&patterns), &config.entry));

    VwapAnalysis {
        current_price,
        bar_count: bars.len(),
        deviations: deviations(&vwaps),
        support_resistance: support_resistance(bars, &vwaps),
        vwaps: Some(vwaps),
        magnets,
        patterns,
        top_levels: top,
        strongest_level: strongest,
        entry,
    }
}

/// Override when valid, otherwise the latest close, otherwise 0.
fn resolve_price(bars: &[PriceBar], price_override: Option<f64>) -> f64 {
    let latest = bars.last().map_or(0.0, |b| b.close);
    match price_override {
        Some(p) if p.is_finite() && p > 0.0 => p,
        Some(p) => {
            warn!(price = p, fallback = latest, "ignoring invalid price override");
            latest
        }
        None => latest,
    }
}

fn deviations(vwaps: &MultiPeriodVwap) -> Vec<Deviation> {
    vwaps
        .current
        .iter()
        .filter_map(|p| {
            let d = p.distance.as_ref()?;
            p.level()?;
            Some(Deviation {
                timeframe: p.period.kind,
                label: p.period.label.clone(),
                vwap: d.vwap,
                percent: d.percent_distance,
                dollars: d.absolute_distance,
                above: d.is_above(),
            })
        })
        .collect()
}

fn support_resistance(bars: &[PriceBar], vwaps: &MultiPeriodVwap) -> Option<SupportResistance> {
    let recent = &bars[bars.len().saturating_sub(RECENT_RANGE_BARS)..];
    if recent.is_empty() {
        return None;
    }
    let recent_high = recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let recent_low = recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let range_pct = if recent_low > 0.0 {
        (recent_high - recent_low) / recent_low * 100.0
    } else {
        0.0
    };

    let levels = vwaps
        .current
        .iter()
        .filter_map(|p| {
            let level = p.level()?;
            Some(SupportResistanceLevel {
                timeframe: p.period.kind,
                level,
                role: if vwaps.current_price > level {
                    LevelRole::Support
                } else {
                    LevelRole::Resistance
                },
            })
        })
        .collect();

    Some(SupportResistance {
        levels,
        recent_high,
        recent_low,
        range_pct,
    })
}
