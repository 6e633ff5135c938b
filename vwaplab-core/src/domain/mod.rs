//! Domain types: price bars, analysis periods, key levels.

pub mod bar;
pub mod level;
pub mod period;

pub use bar::PriceBar;
pub use level::{KeyLevel, Side};
pub use period::{Period, PeriodKind};

/// Symbol type alias
pub type Symbol = String;
