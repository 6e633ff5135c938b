//! Multi-symbol batch driver.
//!
//! Fetches each symbol through a [`DataProvider`], analyzes it, and keeps one
//! `Result` per symbol. A failing symbol is logged and recorded; it never
//! aborts the rest of the batch. The pause between network fetches is a
//! parameter so rate-limited providers can be paced by the caller.

use crate::analysis::{analyze_market, VwapAnalysis};
use crate::config::AnalysisConfig;
use crate::data::{DataError, DataProvider, DataSource, FetchResult, Interval};
use crate::domain::PriceBar;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Live inputs fetched next to the daily history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveOptions {
    /// Price the analysis at the provider's latest quote when no override
    /// is given.
    pub quote: bool,
    /// Build the session VWAP from intraday bars at this spacing.
    pub session_interval: Option<Interval>,
}

impl LiveOptions {
    /// Daily history only; price is the override or the latest close.
    pub const OFF: LiveOptions = LiveOptions {
        quote: false,
        session_interval: None,
    };
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            quote: true,
            session_interval: Some(Interval::Min5),
        }
    }
}

/// Progress callbacks for a batch run.
pub trait BatchProgress: Send {
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    fn on_complete(&self, symbol: &str, index: usize, total: usize, error: Option<&DataError>);

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that prints to stderr, leaving stdout for reports.
pub struct StderrProgress;

impl BatchProgress for StderrProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        eprintln!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, _index: usize, _total: usize, error: Option<&DataError>) {
        match error {
            None => eprintln!("  OK: {symbol}"),
            Some(e) => eprintln!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        eprintln!("\nBatch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that does nothing.
pub struct NoProgress;

impl BatchProgress for NoProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_complete(&self, _symbol: &str, _index: usize, _total: usize, _error: Option<&DataError>) {}
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}

/// Per-symbol outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchSummary<T> {
    pub results: Vec<(String, Result<T, DataError>)>,
}

impl<T> BatchSummary<T> {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn errors(&self) -> impl Iterator<Item = (&str, &DataError)> {
        self.results
            .iter()
            .filter_map(|(s, r)| r.as_ref().err().map(|e| (s.as_str(), e)))
    }
}

/// Fetch daily bars for every symbol.
pub fn fetch_daily_batch(
    provider: &dyn DataProvider,
    symbols: &[&str],
    pause: Duration,
    progress: &dyn BatchProgress,
) -> BatchSummary<Vec<PriceBar>> {
    run_batch(provider, symbols, pause, progress, |fetched| fetched.bars)
}

/// Analyze one symbol from daily bars already fetched through `provider`.
///
/// A valid `price_override` wins; otherwise, with `live.quote`, the latest
/// quote prices the analysis. A failed quote or intraday fetch is logged and
/// the analysis falls back to the latest close and the daily session.
pub fn analyze_fetched(
    provider: &dyn DataProvider,
    fetched: &FetchResult,
    price_override: Option<f64>,
    entry_price: Option<f64>,
    live: LiveOptions,
    config: &AnalysisConfig,
) -> VwapAnalysis {
    let symbol = fetched.symbol.as_str();
    let valid_override = price_override.filter(|p| p.is_finite() && *p > 0.0);
    let price = match valid_override {
        Some(p) => Some(p),
        None if live.quote => quote_price(provider, symbol),
        None => price_override,
    };

    let intraday = match live.session_interval {
        Some(interval) => match provider.fetch_intraday(symbol, interval) {
            Ok(result) => result.bars,
            Err(e) => {
                debug!(symbol, %interval, error = %e, "no intraday bars, using daily session");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    analyze_market(&fetched.bars, &intraday, price, entry_price, config)
}

/// Fetch daily bars for `symbol`, then analyze them with live inputs.
pub fn fetch_and_analyze(
    provider: &dyn DataProvider,
    symbol: &str,
    price_override: Option<f64>,
    entry_price: Option<f64>,
    live: LiveOptions,
    config: &AnalysisConfig,
) -> Result<VwapAnalysis, DataError> {
    let fetched = provider.fetch_daily(symbol)?;
    Ok(analyze_fetched(
        provider,
        &fetched,
        price_override,
        entry_price,
        live,
        config,
    ))
}

fn quote_price(provider: &dyn DataProvider, symbol: &str) -> Option<f64> {
    match provider.fetch_quote(symbol) {
        Ok(quote) if quote.price.is_finite() && quote.price > 0.0 => Some(quote.price),
        Ok(quote) => {
            warn!(symbol, price = quote.price, "unusable quote price, using latest close");
            None
        }
        Err(e) => {
            warn!(symbol, provider = provider.name(), error = %e, "quote failed, using latest close");
            None
        }
    }
}

/// Fetch and analyze every symbol with `config`.
pub fn analyze_batch(
    provider: &dyn DataProvider,
    symbols: &[&str],
    config: &AnalysisConfig,
    live: LiveOptions,
    pause: Duration,
    progress: &dyn BatchProgress,
) -> BatchSummary<VwapAnalysis> {
    run_batch(provider, symbols, pause, progress, |fetched| {
        analyze_fetched(provider, &fetched, None, None, live, config)
    })
}

fn run_batch<T>(
    provider: &dyn DataProvider,
    symbols: &[&str],
    pause: Duration,
    progress: &dyn BatchProgress,
    mut finish: impl FnMut(FetchResult) -> T,
) -> BatchSummary<T> {
    let total = symbols.len();
    let mut results = Vec::with_capacity(total);
    let mut succeeded = 0;

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        let fetched = provider.fetch_daily(symbol);
        let from_network = matches!(&fetched, Ok(f) if f.source != DataSource::Cache);

        let result = fetched.map(&mut finish);
        progress.on_complete(symbol, i, total, result.as_ref().err());
        match &result {
            Ok(_) => succeeded += 1,
            Err(e) => warn!(symbol = *symbol, provider = provider.name(), error = %e, "symbol failed"),
        }
        results.push((symbol.to_string(), result));

        // Nothing after this symbol can succeed while the breaker is open.
        if !provider.is_available() {
            for rest in &symbols[i + 1..] {
                results.push((rest.to_string(), Err(DataError::CircuitBreakerTripped)));
            }
            warn!(skipped = total - i - 1, "provider unavailable, stopping batch");
            break;
        }

        if from_network && i + 1 < total && !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }

    let failed = total - succeeded;
    info!(total, succeeded, failed, "batch complete");
    progress.on_batch_complete(succeeded, failed, total);
    BatchSummary { results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Quote;
    use crate::domain::PeriodKind;
    use crate::test_support::{assert_approx, make_bars, session_bars, DEFAULT_EPSILON};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockProvider {
        available: AtomicBool,
        trip_on: Option<&'static str>,
        quote: Option<f64>,
        intraday: bool,
        quote_calls: AtomicUsize,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                available: AtomicBool::new(true),
                trip_on: None,
                quote: None,
                intraday: false,
                quote_calls: AtomicUsize::new(0),
            }
        }

        fn daily_bars() -> Vec<PriceBar> {
            make_bars(&[10.0, 11.0, 12.0, 11.5])
        }
    }

    impl DataProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn fetch_daily(&self, symbol: &str) -> Result<FetchResult, DataError> {
            if Some(symbol) == self.trip_on {
                self.available.store(false, Ordering::SeqCst);
                return Err(DataError::RateLimited {
                    retry_after_secs: 60,
                });
            }
            if symbol == "BAD" {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.into(),
                });
            }
            Ok(FetchResult {
                symbol: symbol.into(),
                bars: Self::daily_bars(),
                source: DataSource::Cache,
            })
        }

        fn fetch_intraday(&self, symbol: &str, _interval: Interval) -> Result<FetchResult, DataError> {
            if !self.intraday {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.into(),
                });
            }
            let last = Self::daily_bars().last().unwrap().timestamp.date();
            Ok(FetchResult {
                symbol: symbol.into(),
                bars: session_bars(last + chrono::Duration::days(1), &[11.8, 12.0, 12.2], 400),
                source: DataSource::AlphaVantage,
            })
        }

        fn fetch_quote(&self, symbol: &str) -> Result<Quote, DataError> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            match self.quote {
                Some(price) => Ok(Quote {
                    symbol: symbol.into(),
                    price,
                    volume: 1_000,
                    latest_trading_day: None,
                    previous_close: 11.5,
                    change: price - 11.5,
                    change_percent: (price - 11.5) / 11.5 * 100.0,
                }),
                None => Err(DataError::Unsupported {
                    provider: "mock".into(),
                    operation: format!("quote for {symbol}"),
                }),
            }
        }

        fn is_available(&self) -> bool {
            self.available.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn failure_does_not_abort_batch() {
        let provider = MockProvider::new();
        let config = AnalysisConfig::default();
        let summary = analyze_batch(
            &provider,
            &["CPB", "BAD", "XOM"],
            &config,
            LiveOptions::default(),
            Duration::ZERO,
            &NoProgress,
        );
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.results[1].0, "BAD");
        assert!(matches!(
            summary.results[1].1,
            Err(DataError::SymbolNotFound { .. })
        ));
        // Quote unsupported: falls back to the latest close.
        let xom = summary.results[2].1.as_ref().unwrap();
        assert_eq!(xom.current_price, 11.5);
        assert_eq!(summary.errors().count(), 1);
    }

    #[test]
    fn live_quote_prices_the_analysis() {
        let provider = MockProvider {
            quote: Some(12.4),
            ..MockProvider::new()
        };
        let config = AnalysisConfig::default();
        let a = fetch_and_analyze(&provider, "CPB", None, None, LiveOptions::default(), &config)
            .unwrap();
        assert_eq!(a.current_price, 12.4);
        let yearly = a.vwaps.as_ref().unwrap().current(PeriodKind::Yearly).unwrap();
        assert_eq!(yearly.distance.as_ref().unwrap().current_price, 12.4);
    }

    #[test]
    fn price_override_skips_the_quote() {
        let provider = MockProvider {
            quote: Some(12.4),
            ..MockProvider::new()
        };
        let config = AnalysisConfig::default();
        let a = fetch_and_analyze(&provider, "CPB", Some(10.5), None, LiveOptions::default(), &config)
            .unwrap();
        assert_eq!(a.current_price, 10.5);
        assert_eq!(provider.quote_calls.load(Ordering::SeqCst), 0);

        // An unusable override does not block the live quote.
        let a = fetch_and_analyze(&provider, "CPB", Some(-1.0), None, LiveOptions::default(), &config)
            .unwrap();
        assert_eq!(a.current_price, 12.4);
    }

    #[test]
    fn live_off_uses_latest_close() {
        let provider = MockProvider {
            quote: Some(12.4),
            intraday: true,
            ..MockProvider::new()
        };
        let config = AnalysisConfig::default();
        let a = fetch_and_analyze(&provider, "CPB", None, None, LiveOptions::OFF, &config).unwrap();
        assert_eq!(a.current_price, 11.5);
        assert_eq!(provider.quote_calls.load(Ordering::SeqCst), 0);
        let daily = a.vwaps.as_ref().unwrap().current(PeriodKind::Daily).unwrap();
        assert_eq!(daily.vwap.as_ref().unwrap().bar_count, 1);
    }

    #[test]
    fn intraday_bars_build_the_session_vwap() {
        let provider = MockProvider {
            intraday: true,
            ..MockProvider::new()
        };
        let config = AnalysisConfig::default();
        let a = fetch_and_analyze(&provider, "CPB", None, None, LiveOptions::default(), &config)
            .unwrap();
        let daily = a.vwaps.as_ref().unwrap().current(PeriodKind::Daily).unwrap();
        assert_eq!(daily.vwap.as_ref().unwrap().bar_count, 3);
        assert_approx(a.vwap(PeriodKind::Daily).unwrap(), 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn daily_fetch_error_propagates() {
        let provider = MockProvider::new();
        let err = fetch_and_analyze(
            &provider,
            "BAD",
            None,
            None,
            LiveOptions::default(),
            &AnalysisConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn unavailable_provider_fails_remaining_symbols() {
        let provider = MockProvider {
            trip_on: Some("XOM"),
            ..MockProvider::new()
        };
        let summary = fetch_daily_batch(
            &provider,
            &["CPB", "XOM", "CVX", "DE"],
            Duration::ZERO,
            &NoProgress,
        );
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.succeeded(), 1);
        assert!(matches!(
            summary.results[3].1,
            Err(DataError::CircuitBreakerTripped)
        ));
        assert!(!summary.all_succeeded());
    }
}
