//! Entry-quality classification: how close a proposed entry sits to the
//! nearest VWAP.

use crate::config::EntryConfig;
use crate::domain::KeyLevel;
use crate::patterns::PatternReport;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl fmt::Display for EntryQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryQuality::Excellent => "excellent",
            EntryQuality::Good => "good",
            EntryQuality::Fair => "fair",
            EntryQuality::Poor => "poor",
            EntryQuality::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryAssessment {
    pub quality: EntryQuality,
    pub reason: String,
    pub matched_vwap: Option<KeyLevel>,
    /// `|entry - vwap| / entry * 100`, two decimals.
    pub distance_pct: Option<f64>,
    pub confirmations: Vec<String>,
}

impl EntryAssessment {
    fn unknown(reason: &str) -> Self {
        Self {
            quality: EntryQuality::Unknown,
            reason: reason.to_string(),
            matched_vwap: None,
            distance_pct: None,
            confirmations: Vec::new(),
        }
    }
}

/// Classify `entry_price` against the nearest usable VWAP in `levels`.
///
/// The first level wins a distance tie. Confirmations are attached when
/// the matched VWAP is exactly an unbroken-prior level or a confluence
/// member.
pub fn assess_entry(
    entry_price: f64,
    levels: &[KeyLevel],
    patterns: Option<&PatternReport>,
    config: &EntryConfig,
) -> EntryAssessment {
    if !(entry_price.is_finite() && entry_price > 0.0) {
        return EntryAssessment::unknown("Entry price must be positive");
    }

    let mut nearest: Option<(&KeyLevel, f64)> = None;
    for level in levels.iter().filter(|l| l.is_usable()) {
        let distance = (entry_price - level.value).abs();
        if nearest.map_or(true, |(_, best)| distance < best) {
            nearest = Some((level, distance));
        }
    }
    let Some((matched, distance)) = nearest else {
        return EntryAssessment::unknown("No VWAP data available");
    };

    let distance_pct = distance / entry_price * 100.0;
    let (quality, reason) = if distance_pct < config.excellent_pct {
        (
            EntryQuality::Excellent,
            format!("Entry within {}% of {} VWAP", config.excellent_pct, matched.timeframe),
        )
    } else if distance_pct < config.good_pct {
        (
            EntryQuality::Good,
            format!("Entry within {}% of {} VWAP", config.good_pct, matched.timeframe),
        )
    } else if distance_pct < config.fair_pct {
        (
            EntryQuality::Fair,
            format!("Entry within {}% of {} VWAP", config.fair_pct, matched.timeframe),
        )
    } else {
        (
            EntryQuality::Poor,
            format!("Entry {distance_pct:.1}% away from nearest VWAP"),
        )
    };

    let mut confirmations = Vec::new();
    if let Some(report) = patterns {
        if report.unbroken_at(matched.value).is_some() {
            confirmations.push("Unbroken prior support".to_string());
        }
        if report.confluence_containing(matched.value).is_some() {
            confirmations.push("Confluence zone".to_string());
        }
    }

    EntryAssessment {
        quality,
        reason,
        matched_vwap: Some(matched.clone()),
        distance_pct: Some((distance_pct * 100.0).round() / 100.0),
        confirmations,
    }
}
