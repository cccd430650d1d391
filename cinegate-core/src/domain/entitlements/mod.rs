//! Plan capabilities, daily counters, bonus credits and the access decision.

pub mod access;
pub mod bonus;
pub mod counter;
pub mod registry;

pub use access::{AccessEngine, QuotaOutcome, QuotaStep, evaluate_quota};
pub use bonus::BonusLedger;
pub use counter::{DailyCounterManager, DayBoundary};
pub use registry::{ConfigurationError, PlanRegistry};
