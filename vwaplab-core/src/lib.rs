//! vwaplab core: multi-period VWAP levels, magnets, patterns and scoring.
//!
//! This crate contains the analysis engine and its data plumbing:
//! - Domain types (bars, periods, key levels)
//! - VWAP calculator and the multi-period orchestrator
//! - Distance and magnet levels around each VWAP
//! - Pattern detection against current VWAP levels
//! - Level scoring, ranking and entry-quality classification
//! - Data providers (Alpha Vantage, CSV), bar cache and circuit breaker
//! - Historical pattern validation and the multi-ticker batch driver

pub mod analysis;
pub mod batch;
pub mod config;
pub mod data;
pub mod distance;
pub mod domain;
pub mod magnet;
pub mod patterns;
pub mod scoring;
pub mod validation;
pub mod vwap;

pub use analysis::{analyze, VwapAnalysis};
pub use config::{AnalysisConfig, ConfigError};
pub use domain::{KeyLevel, Period, PeriodKind, PriceBar, Side};
