//! Sector-organized ticker lists for batch scans and validation runs.
//!
//! Stored as TOML: one table key per sector, each a list of tickers.
//!
//! ```toml
//! [sectors]
//! energy = ["XOM", "CVX"]
//! ```

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let universe: Self = toml::from_str(content)?;
        if universe.ticker_count() == 0 {
            return Err(ConfigError::Invalid("universe has no tickers".into()));
        }
        Ok(universe)
    }

    /// All tickers, sector by sector in name order.
    pub fn all_tickers(&self) -> Vec<&str> {
        self.sectors
            .values()
            .flat_map(|tickers| tickers.iter().map(String::as_str))
            .collect()
    }

    pub fn sector_tickers(&self, sector: &str) -> Option<&[String]> {
        self.sectors.get(sector).map(Vec::as_slice)
    }

    /// Sector containing `ticker`, or `"unknown"`.
    pub fn sector_of(&self, ticker: &str) -> &str {
        self.sectors
            .iter()
            .find(|(_, tickers)| tickers.iter().any(|t| t == ticker))
            .map(|(sector, _)| sector.as_str())
            .unwrap_or("unknown")
    }

    /// Roll per-ticker counts up to per-sector counts.
    pub fn count_by_sector<'a>(
        &self,
        by_symbol: impl IntoIterator<Item = (&'a String, &'a usize)>,
    ) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        for (symbol, count) in by_symbol {
            *out.entry(self.sector_of(symbol).to_string()).or_insert(0) += *count;
        }
        out
    }

    pub fn ticker_count(&self) -> usize {
        self.sectors.values().map(Vec::len).sum()
    }

    /// Twenty liquid US names across eight sectors, used when a validation
    /// run names no symbols.
    pub fn validation_default() -> Self {
        let table: [(&str, &[&str]); 8] = [
            ("agriculture", &["DE", "ADM"]),
            ("airlines", &["UAL"]),
            ("consumer", &["DIS", "NKE", "MCD"]),
            ("energy", &["XOM", "CVX"]),
            ("financials", &["JPM", "BAC", "GS"]),
            ("healthcare", &["JNJ", "UNH"]),
            ("industrials", &["CAT", "BA", "UNP"]),
            ("tech", &["AAPL", "INTC", "NVDA", "MSFT"]),
        ];
        let sectors = table
            .iter()
            .map(|(name, tickers)| {
                (
                    name.to_string(),
                    tickers.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        Self { sectors }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(format!("serialize universe: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_universe_shape() {
        let u = Universe::validation_default();
        assert_eq!(u.ticker_count(), 20);
        assert_eq!(u.sectors.len(), 8);
        assert!(u.all_tickers().contains(&"UAL"));
        assert_eq!(u.sector_tickers("energy").map(|t| t.len()), Some(2));
    }

    #[test]
    fn sector_lookup_falls_back_to_unknown() {
        let u = Universe::validation_default();
        assert_eq!(u.sector_of("XOM"), "energy");
        assert_eq!(u.sector_of("CPB"), "unknown");
    }

    #[test]
    fn counts_roll_up_by_sector() {
        let u = Universe::validation_default();
        let mut by_symbol = BTreeMap::new();
        by_symbol.insert("XOM".to_string(), 2usize);
        by_symbol.insert("CVX".to_string(), 3usize);
        by_symbol.insert("CPB".to_string(), 1usize);
        let sectors = u.count_by_sector(&by_symbol);
        assert_eq!(sectors.get("energy"), Some(&5));
        assert_eq!(sectors.get("unknown"), Some(&1));
    }

    #[test]
    fn toml_round_trip_and_empty_rejection() {
        let u = Universe::validation_default();
        let parsed = Universe::from_toml(&u.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, u);
        assert!(matches!(
            Universe::from_toml("[sectors]\n"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
