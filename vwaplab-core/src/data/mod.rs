//! Market data plumbing: providers, bar cache, circuit breaker, CSV import.

pub mod alpha_vantage;
pub mod cache;
pub mod circuit_breaker;
pub mod csv_import;
pub mod ingest;
pub mod provider;
pub mod universe;

pub use alpha_vantage::AlphaVantageProvider;
pub use cache::BarCache;
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use csv_import::{load_csv, read_bars, CsvProvider};
pub use ingest::{ingest, parse_timestamp};
pub use provider::{DataError, DataProvider, DataSource, FetchResult, Interval, Quote};
pub use universe::Universe;
