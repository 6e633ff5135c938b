//! In-memory bar cache with a time-to-live.
//!
//! Keys follow `{SYMBOL}_daily` and `{SYMBOL}_intraday_{interval}`, so all
//! entries for one symbol share the `{SYMBOL}_` prefix. Expired entries are
//! evicted on lookup, and every insert sweeps all expired entries. The cache
//! is owned by a provider and shared by reference; there is no global
//! instance.

use super::provider::Interval;
use crate::domain::PriceBar;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct CacheEntry {
    bars: Vec<PriceBar>,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct BarCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl BarCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn daily_key(symbol: &str) -> String {
        format!("{symbol}_daily")
    }

    pub fn intraday_key(symbol: &str, interval: Interval) -> String {
        format!("{symbol}_intraday_{interval}")
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached bars for `key`, or `None` if missing or expired. An expired
    /// entry is removed.
    pub fn get(&self, key: &str) -> Option<Vec<PriceBar>> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => entry.stored_at.elapsed() > self.ttl,
        };
        if expired {
            entries.remove(key);
            debug!(key, "cache entry expired");
            return None;
        }
        debug!(key, "cache hit");
        entries.get(key).map(|entry| entry.bars.clone())
    }

    /// Store `bars` under `key`, first dropping every expired entry.
    pub fn insert(&self, key: impl Into<String>, bars: Vec<PriceBar>) {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() <= self.ttl);
        let swept = before - entries.len();
        if swept > 0 {
            debug!(swept, "swept expired cache entries");
        }
        entries.insert(
            key.into(),
            CacheEntry {
                bars,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry for one symbol. Returns the number removed.
    pub fn clear_symbol(&self, symbol: &str) -> usize {
        let prefix = format!("{symbol}_");
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including any not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BarCache {
    /// One-hour TTL.
    fn default() -> Self {
        Self::new(Duration::from_secs(60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_bars;

    #[test]
    fn keys_share_symbol_prefix() {
        assert_eq!(BarCache::daily_key("CPB"), "CPB_daily");
        assert_eq!(
            BarCache::intraday_key("CPB", Interval::Min5),
            "CPB_intraday_5min"
        );
    }

    #[test]
    fn hit_returns_stored_bars() {
        let cache = BarCache::default();
        let bars = make_bars(&[10.0, 11.0]);
        cache.insert(BarCache::daily_key("CPB"), bars.clone());
        assert_eq!(cache.get("CPB_daily"), Some(bars));
        assert_eq!(cache.get("XOM_daily"), None);
    }

    #[test]
    fn expired_entry_is_evicted_on_lookup() {
        let cache = BarCache::new(Duration::from_millis(5));
        cache.insert("CPB_daily", make_bars(&[10.0]));
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(cache.get("CPB_daily"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_sweeps_expired_entries_of_other_symbols() {
        let cache = BarCache::new(Duration::from_millis(20));
        cache.insert(BarCache::daily_key("CPB"), make_bars(&[10.0]));
        cache.insert(BarCache::daily_key("XOM"), make_bars(&[10.0]));
        assert_eq!(cache.len(), 2);
        std::thread::sleep(Duration::from_millis(40));

        // Neither expired key is looked up again; the next insert drops both.
        cache.insert(BarCache::daily_key("CVX"), make_bars(&[10.0]));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("CVX_daily").is_some());
    }

    #[test]
    fn insert_keeps_fresh_entries() {
        let cache = BarCache::default();
        for symbol in ["CPB", "XOM", "CVX"] {
            cache.insert(BarCache::daily_key(symbol), make_bars(&[10.0]));
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn clear_symbol_leaves_other_symbols() {
        let cache = BarCache::default();
        cache.insert(BarCache::daily_key("CPB"), make_bars(&[10.0]));
        cache.insert(
            BarCache::intraday_key("CPB", Interval::Min15),
            make_bars(&[10.0]),
        );
        cache.insert(BarCache::daily_key("CPBX"), make_bars(&[10.0]));
        assert_eq!(cache.clear_symbol("CPB"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("CPBX_daily").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
