//! Confluence: independently derived levels landing within a small relative
//! tolerance of one another.
//!
//! Clustering is a single greedy pass. Each level not yet claimed seeds a
//! cluster and collects every later unclaimed level within `tolerance` of
//! the seed. The result depends on input order: permuting the levels can
//! change membership.

use super::{usable, Strength};
use crate::domain::{KeyLevel, PeriodKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confluence {
    /// Mean of the member levels.
    pub level: f64,
    pub members: Vec<KeyLevel>,
    pub strength: Strength,
    pub distance_from_price: f64,
    pub nearby: bool,
}

impl Confluence {
    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn timeframes(&self) -> Vec<PeriodKind> {
        self.members.iter().map(|m| m.timeframe).collect()
    }

    /// Whether a member sits at exactly `level`.
    pub fn contains(&self, level: f64) -> bool {
        self.members.iter().any(|m| m.value == level)
    }
}

/// Clusters of two or more levels, largest first.
///
/// `nearby_pct` flags clusters within that fraction of `current_price`.
/// Clusters whose mean rounds to the same cent keep only the larger one.
pub fn find_confluences(
    levels: &[KeyLevel],
    current_price: f64,
    tolerance: f64,
    nearby_pct: f64,
) -> Vec<Confluence> {
    let candidates: Vec<&KeyLevel> = usable(levels).collect();
    let mut claimed = vec![false; candidates.len()];
    let mut clusters = Vec::new();

    for i in 0..candidates.len() {
        if claimed[i] {
            continue;
        }
        let seed = candidates[i].value;
        let mut members = vec![i];
        for j in (i + 1)..candidates.len() {
            if !claimed[j] && (seed - candidates[j].value).abs() / seed <= tolerance {
                members.push(j);
            }
        }
        if members.len() < 2 {
            continue;
        }
        for &m in &members {
            claimed[m] = true;
        }

        let members: Vec<KeyLevel> = members.iter().map(|&m| candidates[m].clone()).collect();
        let level = members.iter().map(|m| m.value).sum::<f64>() / members.len() as f64;
        let distance = (current_price - level).abs();
        clusters.push(Confluence {
            level,
            strength: if members.len() >= 3 {
                Strength::VeryStrong
            } else {
                Strength::Strong
            },
            distance_from_price: distance,
            nearby: current_price > 0.0 && distance / current_price < nearby_pct,
            members,
        });
    }

    clusters.sort_by(|a, b| b.count().cmp(&a.count()));
    let mut seen = HashSet::new();
    clusters.retain(|c| seen.insert((c.level * 100.0).round() as i64));
    clusters
}
