//! Price-to-VWAP distance in percent and in sigma units, plus the nearest
//! configured key multiplier.

use serde::{Deserialize, Serialize};

/// How far a price sits from one VWAP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub current_price: f64,
    pub vwap: f64,
    pub std_dev: f64,
    /// Signed, in price units: `price - vwap`.
    pub absolute_distance: f64,
    pub percent_distance: f64,
    pub sigma_distance: f64,
    /// Signed key multiplier closest to `sigma_distance`.
    pub nearest_key_level: f64,
    /// `|sigma_distance - nearest_key_level|`.
    pub residual: f64,
    pub near_key_level: bool,
}

impl Distance {
    /// Measure `price` against a VWAP with standard deviation `std_dev`.
    ///
    /// Zero divisors give zero distances rather than infinities.
    pub fn compute(
        price: f64,
        vwap: f64,
        std_dev: f64,
        key_multipliers: &[f64],
        near_threshold: f64,
    ) -> Self {
        let absolute_distance = price - vwap;
        let percent_distance = if vwap != 0.0 {
            absolute_distance / vwap * 100.0
        } else {
            0.0
        };
        let sigma_distance = if std_dev > 0.0 {
            absolute_distance / std_dev
        } else {
            0.0
        };
        let (nearest_key_level, residual) = nearest_key_level(sigma_distance, key_multipliers);

        Self {
            current_price: price,
            vwap,
            std_dev,
            absolute_distance,
            percent_distance,
            sigma_distance,
            nearest_key_level,
            residual,
            near_key_level: residual < near_threshold,
        }
    }

    pub fn is_above(&self) -> bool {
        self.absolute_distance > 0.0
    }
}

/// Closest signed key level to `sigma` among `{+m, -m}` for every `m`.
///
/// Ties go to the smaller absolute level, then to the positive one. With no
/// multipliers the level is 0 and the residual is `|sigma|`.
pub fn nearest_key_level(sigma: f64, key_multipliers: &[f64]) -> (f64, f64) {
    let mut best: Option<(f64, f64)> = None;
    for &m in key_multipliers {
        for level in [m, -m] {
            let residual = (sigma - level).abs();
            let better = match best {
                None => true,
                Some((best_level, best_residual)) => {
                    residual < best_residual
                        || (residual == best_residual
                            && (level.abs() < best_level.abs()
                                || (level.abs() == best_level.abs() && level > best_level)))
                }
            };
            if better {
                best = Some((level, residual));
            }
        }
    }
    best.unwrap_or((0.0, sigma.abs()))
}
