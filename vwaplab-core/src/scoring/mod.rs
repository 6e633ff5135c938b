//! Level scoring: a weighted composite per candidate level, ranking and the
//! candidate pool built from timeframe VWAPs and their closest magnets.
//!
//! ```text
//! proximity  = max(0, 100 * (1 - |price - level| / price / proximity_zero_pct))
//! timeframe  = fixed per period kind
//! pattern    = unbroken + confluence + recent reclaim bonuses, capped at 100
//! touches    = min(touches * points_per_touch, 100)
//! confluence = min(cluster members * points_per_member, 100)
//! composite  = Σ weight * sub-score, one decimal
//! ```

pub mod entry;

pub use entry::{assess_entry, EntryAssessment, EntryQuality};

use crate::config::ScoringConfig;
use crate::domain::{KeyLevel, PeriodKind, Side};
use crate::magnet::TimeframeMagnets;
use crate::patterns::PatternReport;
use serde::{Deserialize, Serialize};

/// Where a candidate level comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LevelSource {
    Vwap,
    Magnet {
        /// VWAP the magnet is derived from.
        vwap: f64,
        multiplier: f64,
        side: Side,
    },
}

/// A price level competing for a rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCandidate {
    pub timeframe: PeriodKind,
    pub label: String,
    pub level: f64,
    pub source: LevelSource,
    /// Recorded magnet touches; always 0 for a VWAP.
    pub touches: usize,
    /// Members of the confluence cluster containing the level, 0 if none.
    pub confluence_count: usize,
}

impl LevelCandidate {
    pub fn vwap(level: &KeyLevel) -> Self {
        Self {
            timeframe: level.timeframe,
            label: level.label.clone(),
            level: level.value,
            source: LevelSource::Vwap,
            touches: 0,
            confluence_count: 0,
        }
    }

    pub fn is_magnet(&self) -> bool {
        matches!(self.source, LevelSource::Magnet { .. })
    }

    /// Fill `touches` and `confluence_count` from detected patterns.
    pub fn with_pattern_evidence(mut self, patterns: &PatternReport) -> Self {
        if let LevelSource::Magnet {
            vwap,
            multiplier,
            side,
        } = self.source
        {
            self.touches = patterns.magnet_touches(self.timeframe, vwap, multiplier, side);
        }
        self.confluence_count = patterns
            .confluence_containing(self.level)
            .map_or(0, |c| c.count());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub proximity: f64,
    pub timeframe: f64,
    pub pattern: f64,
    pub touches: f64,
    pub confluence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredLevel {
    pub candidate: LevelCandidate,
    pub scores: SubScores,
    pub composite: f64,
    /// 1-based.
    pub rank: usize,
}

/// Sub-scores for one candidate, each clamped to `[0, 100]`.
pub fn sub_scores(
    candidate: &LevelCandidate,
    current_price: f64,
    patterns: Option<&PatternReport>,
    config: &ScoringConfig,
) -> SubScores {
    let distance_frac = if current_price > 0.0 {
        (current_price - candidate.level).abs() / current_price
    } else {
        1.0
    };
    let proximity = 100.0 * (1.0 - distance_frac / config.proximity_zero_pct);

    let mut pattern = 0.0;
    if let Some(report) = patterns {
        let bonuses = &config.bonuses;
        if report.unbroken_at(candidate.level).is_some() {
            pattern += bonuses.unbroken_prior;
        }
        if report.confluence_containing(candidate.level).is_some() {
            pattern += bonuses.confluence;
        }
        if report
            .recent_reclaim(candidate.level, config.reclaim_recency_days)
            .is_some()
        {
            pattern += bonuses.recent_reclaim;
        }
    }

    SubScores {
        proximity: clamp_score(proximity),
        timeframe: clamp_score(config.timeframe_scores.for_kind(candidate.timeframe)),
        pattern: clamp_score(pattern),
        touches: clamp_score(candidate.touches as f64 * config.points_per_touch),
        confluence: clamp_score(
            candidate.confluence_count as f64 * config.points_per_confluence_member,
        ),
    }
}

/// Weighted sum of the sub-scores, rounded to one decimal.
pub fn composite(scores: &SubScores, config: &ScoringConfig) -> f64 {
    let w = &config.weights;
    let total = scores.proximity * w.proximity
        + scores.timeframe * w.timeframe
        + scores.pattern * w.pattern
        + scores.touches * w.touches
        + scores.confluence * w.confluence;
    (total * 10.0).round() / 10.0
}

/// Score every candidate and sort descending; equal composites keep their
/// input order.
pub fn rank_levels(
    candidates: Vec<LevelCandidate>,
    current_price: f64,
    patterns: Option<&PatternReport>,
    config: &ScoringConfig,
) -> Vec<ScoredLevel> {
    let mut scored: Vec<ScoredLevel> = candidates
        .into_iter()
        .map(|candidate| {
            let scores = sub_scores(&candidate, current_price, patterns, config);
            let composite = composite(&scores, config);
            ScoredLevel {
                candidate,
                scores,
                composite,
                rank: 0,
            }
        })
        .collect();
    scored.sort_by(|a, b| b.composite.total_cmp(&a.composite));
    for (i, level) in scored.iter_mut().enumerate() {
        level.rank = i + 1;
    }
    scored
}

/// One candidate per usable timeframe VWAP, then up to
/// `magnets_per_timeframe` magnets per timeframe.
pub fn candidate_pool(
    levels: &[KeyLevel],
    magnets: &[TimeframeMagnets],
    patterns: Option<&PatternReport>,
    config: &ScoringConfig,
) -> Vec<LevelCandidate> {
    let vwaps = levels
        .iter()
        .filter(|l| l.is_usable())
        .map(LevelCandidate::vwap);
    let magnet_candidates = magnets.iter().flat_map(|tf| {
        tf.magnets
            .iter()
            .take(config.magnets_per_timeframe)
            .map(move |m| LevelCandidate {
                timeframe: tf.level.timeframe,
                label: format!(
                    "{} {:+.1}% Magnet",
                    tf.level.timeframe.as_str().to_uppercase(),
                    m.deviation_pct()
                ),
                level: m.price,
                source: LevelSource::Magnet {
                    vwap: m.vwap,
                    multiplier: m.multiplier,
                    side: m.side,
                },
                touches: 0,
                confluence_count: 0,
            })
    });

    vwaps
        .chain(magnet_candidates)
        .map(|c| match patterns {
            Some(report) => c.with_pattern_evidence(report),
            None => c,
        })
        .collect()
}

/// Build the pool, rank it and keep the best `top_n`.
pub fn top_levels(
    levels: &[KeyLevel],
    magnets: &[TimeframeMagnets],
    current_price: f64,
    patterns: Option<&PatternReport>,
    config: &ScoringConfig,
) -> Vec<ScoredLevel> {
    let pool = candidate_pool(levels, magnets, patterns, config);
    let mut ranked = rank_levels(pool, current_price, patterns, config);
    ranked.truncate(config.top_n);
    ranked
}

/// The level closest to price, chosen among VWAPs within
/// `strongest_max_pct` and the closest few magnets per timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrongestLevel {
    pub timeframe: PeriodKind,
    pub level: f64,
    pub source: LevelSource,
    pub distance: f64,
}

pub fn strongest_level(
    levels: &[KeyLevel],
    magnets: &[TimeframeMagnets],
    current_price: f64,
    config: &ScoringConfig,
) -> Option<StrongestLevel> {
    if !(current_price > 0.0) {
        return None;
    }
    let vwaps = levels.iter().filter(|l| l.is_usable()).filter_map(|l| {
        let distance = (current_price - l.value).abs();
        (distance / current_price < config.strongest_max_pct).then(|| StrongestLevel {
            timeframe: l.timeframe,
            level: l.value,
            source: LevelSource::Vwap,
            distance,
        })
    });
    let magnet_candidates = magnets.iter().flat_map(|tf| {
        tf.magnets
            .iter()
            .take(config.strongest_magnets_per_timeframe)
            .map(move |m| StrongestLevel {
                timeframe: tf.level.timeframe,
                level: m.price,
                source: LevelSource::Magnet {
                    vwap: m.vwap,
                    multiplier: m.multiplier,
                    side: m.side,
                },
                distance: m.distance_from_price,
            })
    });

    let mut best: Option<StrongestLevel> = None;
    for candidate in vwaps.chain(magnet_candidates) {
        if best.as_ref().map_or(true, |b| candidate.distance < b.distance) {
            best = Some(candidate);
        }
    }
    best
}

/// Human-readable ranking, one line per level.
pub fn level_summary(top: &[ScoredLevel]) -> String {
    if top.is_empty() {
        return "No significant levels detected.".to_string();
    }
    let mut lines = vec!["Top Trading Levels:".to_string(), "-".repeat(50)];
    for level in top {
        lines.push(format!(
            "{}. {}: ${:.2} (Score: {:.1})",
            level.rank, level.candidate.label, level.candidate.level, level.composite
        ));
    }
    lines.join("\n")
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
