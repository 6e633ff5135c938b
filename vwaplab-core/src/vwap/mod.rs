//! VWAP engine: the calculator, period boundary derivation, and the
//! multi-period orchestrator.

pub mod calculator;
pub mod orchestrator;
pub mod periods;

pub use calculator::{compute_vwap, SigmaBand, VwapAccumulator, VwapResult};
pub use orchestrator::{MultiPeriodVwap, PeriodVwap, VwapOrchestrator};
pub use periods::{prior_quarter, quarter_of, quarter_start, BoundaryPolicy};
