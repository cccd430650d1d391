use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::plan::Plan;

/// Read-only view of a viewer's remaining metered views, for account pages.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuotaSnapshot {
    /// Plan the numbers were computed for (after Premium expiry).
    pub plan: Plan,
    /// Daily allowance left, `None` when the plan is unbounded.
    pub daily_remaining: Option<u32>,
    pub bonus_available: u32,
    /// `daily_remaining + bonus_available`, `None` when unbounded.
    pub total_remaining: Option<u32>,
    /// When the daily counter next returns to zero.
    pub resets_at: DateTime<Utc>,
}

impl QuotaSnapshot {
    pub fn is_unbounded(&self) -> bool {
        self.total_remaining.is_none()
    }
}
