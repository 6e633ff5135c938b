//! Analysis configuration.
//!
//! Every tunable constant of the engine lives here: band/key multipliers,
//! magnet ratios, pattern lookbacks and tolerances, scoring weights and
//! bonuses, entry-quality thresholds. Loaded from TOML; every section and
//! field falls back to its default, so a partial file only overrides what it
//! names.

use crate::domain::PeriodKind;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest day window any lookback may span (about a century).
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Errors from loading or validating an `AnalysisConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration for a full analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub vwap: VwapConfig,
    pub magnets: MagnetConfig,
    pub patterns: PatternConfig,
    pub scoring: ScoringConfig,
    pub entry: EntryConfig,
    pub validation: ValidationConfig,
}

impl AnalysisConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_multipliers("vwap.key_multipliers", &self.vwap.key_multipliers)?;
        check_multipliers("magnets.multipliers", &self.magnets.multipliers)?;
        check_multipliers(
            "patterns.interaction_multipliers",
            &self.patterns.interaction_multipliers,
        )?;

        for (name, value) in [
            ("vwap.near_key_threshold", self.vwap.near_key_threshold),
            ("magnets.listing_nearby_pct", self.magnets.listing_nearby_pct),
            ("magnets.aggregate_nearby_pct", self.magnets.aggregate_nearby_pct),
            ("patterns.confluence_tolerance", self.patterns.confluence_tolerance),
            ("patterns.confluence_nearby_pct", self.patterns.confluence_nearby_pct),
            ("patterns.touch_tolerance", self.patterns.touch_tolerance),
            ("scoring.proximity_zero_pct", self.scoring.proximity_zero_pct),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive and finite"
                )));
            }
        }
        for (name, value) in [
            ("vwap.three_month_days", self.vwap.three_month_days),
            ("patterns.lookback_days", self.patterns.lookback_days),
            (
                "patterns.failed_break_lookback_days",
                self.patterns.failed_break_lookback_days,
            ),
            (
                "patterns.reclaim_lookback_days",
                self.patterns.reclaim_lookback_days,
            ),
        ] {
            if !(1..=MAX_LOOKBACK_DAYS).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 1 and {MAX_LOOKBACK_DAYS} days"
                )));
            }
        }
        if !(0..=MAX_LOOKBACK_DAYS).contains(&self.scoring.reclaim_recency_days) {
            return Err(ConfigError::Invalid(format!(
                "scoring.reclaim_recency_days must be between 0 and {MAX_LOOKBACK_DAYS}"
            )));
        }

        let sum = self.scoring.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "scoring weights must sum to 1.0, got {sum}"
            )));
        }

        let e = &self.entry;
        if !(0.0 < e.excellent_pct && e.excellent_pct < e.good_pct && e.good_pct < e.fair_pct) {
            return Err(ConfigError::Invalid(
                "entry thresholds must satisfy 0 < excellent < good < fair".into(),
            ));
        }

        let v = &self.validation;
        if !(v.touch_tolerance > 0.0) {
            return Err(ConfigError::Invalid(
                "validation.touch_tolerance must be positive".into(),
            ));
        }
        if v.follow_bars == 0 || v.forward_bars == 0 {
            return Err(ConfigError::Invalid(
                "validation bar windows must be non-zero".into(),
            ));
        }
        if !(v.viable_rate <= v.validated_rate) {
            return Err(ConfigError::Invalid(
                "validation.viable_rate must not exceed validated_rate".into(),
            ));
        }

        Ok(())
    }
}

fn check_multipliers(name: &str, values: &[f64]) -> Result<(), ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::Invalid(format!("{name} must not be empty")));
    }
    if values.iter().any(|m| !m.is_finite() || *m <= 0.0) {
        return Err(ConfigError::Invalid(format!(
            "{name} must contain only positive finite values"
        )));
    }
    Ok(())
}

/// VWAP calculator and period orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VwapConfig {
    /// Sigma multiples for bands; also the key-level set for sigma distance.
    pub key_multipliers: Vec<f64>,
    /// Start of the trading session used for the daily period.
    pub session_open: NaiveTime,
    /// Length of the trailing `three_month` window.
    pub three_month_days: i64,
    /// Number of completed calendar years to report.
    pub prior_years: usize,
    /// Number of completed calendar quarters to report.
    pub prior_quarters: usize,
    /// Sigma residual under which a price counts as "at" a key level.
    pub near_key_threshold: f64,
    /// Feed prior-period VWAPs to the pattern detector and scorer too.
    pub include_prior_levels: bool,
}

impl Default for VwapConfig {
    fn default() -> Self {
        Self {
            key_multipliers: vec![0.27, 0.5, 1.0, 1.27, 1.618, 2.0, 2.27, 2.618],
            session_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            three_month_days: 90,
            prior_years: 3,
            prior_quarters: 4,
            near_key_threshold: 0.05,
            include_prior_levels: false,
        }
    }
}

/// Magnet level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnetConfig {
    /// Fractional offsets from VWAP: level = vwap * (1 ± m).
    pub multipliers: Vec<f64>,
    /// "Nearby" threshold for a single-VWAP magnet listing (fraction of price).
    pub listing_nearby_pct: f64,
    /// Inclusion threshold for the cross-timeframe magnet finder.
    pub aggregate_nearby_pct: f64,
    /// Closest magnets kept per timeframe by the cross-timeframe finder.
    pub per_timeframe_cap: usize,
}

impl Default for MagnetConfig {
    fn default() -> Self {
        Self {
            multipliers: vec![0.27, 1.27, 2.27, 3.27, 4.27],
            listing_nearby_pct: 0.05,
            aggregate_nearby_pct: 0.10,
            per_timeframe_cap: 5,
        }
    }
}

/// Pattern detector settings. Lookbacks are calendar days back from the
/// latest bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub lookback_days: i64,
    pub failed_break_lookback_days: i64,
    pub reclaim_lookback_days: i64,
    /// Relative distance from the seed level that joins a confluence cluster.
    pub confluence_tolerance: f64,
    /// A confluence within this fraction of price is flagged nearby.
    pub confluence_nearby_pct: f64,
    /// Magnet ratios checked for price interaction.
    pub interaction_multipliers: Vec<f64>,
    /// Relative tolerance for a high/low to count as a magnet touch.
    pub touch_tolerance: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            failed_break_lookback_days: 10,
            reclaim_lookback_days: 5,
            confluence_tolerance: 0.01,
            confluence_nearby_pct: 0.02,
            interaction_multipliers: vec![0.27, 1.27, 2.27],
            touch_tolerance: 0.005,
        }
    }
}

/// Composite score weights. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub proximity: f64,
    pub timeframe: f64,
    pub pattern: f64,
    pub touches: f64,
    pub confluence: f64,
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.proximity + self.timeframe + self.pattern + self.touches + self.confluence
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            proximity: 0.35,
            timeframe: 0.25,
            pattern: 0.20,
            touches: 0.15,
            confluence: 0.05,
        }
    }
}

/// Fixed timeframe importance scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeScores {
    pub yearly: f64,
    pub quarterly: f64,
    pub three_month: f64,
    pub daily: f64,
}

impl TimeframeScores {
    pub fn for_kind(&self, kind: PeriodKind) -> f64 {
        match kind {
            PeriodKind::Yearly => self.yearly,
            PeriodKind::Quarterly => self.quarterly,
            PeriodKind::ThreeMonth => self.three_month,
            PeriodKind::Daily => self.daily,
        }
    }
}

impl Default for TimeframeScores {
    fn default() -> Self {
        Self {
            yearly: 100.0,
            quarterly: 85.0,
            three_month: 70.0,
            daily: 50.0,
        }
    }
}

/// Additive pattern bonuses (capped at 100 in total).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternBonuses {
    pub unbroken_prior: f64,
    pub confluence: f64,
    pub recent_reclaim: f64,
}

impl Default for PatternBonuses {
    fn default() -> Self {
        Self {
            unbroken_prior: 30.0,
            confluence: 25.0,
            recent_reclaim: 20.0,
        }
    }
}

/// Level scorer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub timeframe_scores: TimeframeScores,
    pub bonuses: PatternBonuses,
    /// Relative distance at which proximity reaches zero.
    pub proximity_zero_pct: f64,
    pub points_per_touch: f64,
    pub points_per_confluence_member: f64,
    /// A reclaim counts as recent within this many days.
    pub reclaim_recency_days: i64,
    /// Magnet candidates taken per timeframe into the ranking pool.
    pub magnets_per_timeframe: usize,
    /// Levels returned by `top_levels`.
    pub top_n: usize,
    /// VWAP candidates for the strongest-level pick must be this close.
    pub strongest_max_pct: f64,
    /// Magnet candidates per timeframe for the strongest-level pick.
    pub strongest_magnets_per_timeframe: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            timeframe_scores: TimeframeScores::default(),
            bonuses: PatternBonuses::default(),
            proximity_zero_pct: 0.10,
            points_per_touch: 20.0,
            points_per_confluence_member: 33.0,
            reclaim_recency_days: 3,
            magnets_per_timeframe: 3,
            top_n: 5,
            strongest_max_pct: 0.05,
            strongest_magnets_per_timeframe: 2,
        }
    }
}

/// Entry-quality thresholds, in percent distance from the nearest VWAP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    pub excellent_pct: f64,
    pub good_pct: f64,
    pub fair_pct: f64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            excellent_pct: 0.5,
            good_pct: 1.5,
            fair_pct: 3.0,
        }
    }
}

/// Historical pattern validation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Relative band around a level that counts as a touch.
    pub touch_tolerance: f64,
    /// Bars after a completed quarter searched for touches of its VWAP.
    pub follow_bars: usize,
    /// Bars after a touch searched for the resulting move.
    pub forward_bars: usize,
    /// Sigma multiple below (negative) or above the yearly VWAP to test.
    pub sigma_level: f64,
    /// Bars into the year before the sigma level is trusted.
    pub warmup_bars: usize,
    /// A sigma touch needs more than this many bars in its forward window.
    pub min_forward_bars: usize,
    /// Success rate (percent) for a validated pattern.
    pub validated_rate: f64,
    /// Success rate (percent) for a viable pattern.
    pub viable_rate: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            touch_tolerance: 0.005,
            follow_bars: 60,
            forward_bars: 20,
            sigma_level: -0.27,
            warmup_bars: 30,
            min_forward_bars: 5,
            validated_rate: 80.0,
            viable_rate: 70.0,
        }
    }
}
