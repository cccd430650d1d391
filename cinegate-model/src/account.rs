use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::AccountId;
use crate::plan::Plan;

/// Entitlement state of an authenticated viewer.
///
/// Counters are unsigned so the non-negative invariants hold by construction.
/// `daily_views_consumed` and `bonus_views_available` are only ever changed
/// through the daily counter and the bonus ledger, which route through the
/// account store's atomic update.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewerAccount {
    pub id: AccountId,
    /// Normalized (trimmed, lowercase) login email.
    pub email: String,
    pub plan: Plan,
    /// End of the paid Premium term, if any.
    pub premium_until: Option<DateTime<Utc>>,
    pub daily_views_consumed: u32,
    pub last_reset_at: DateTime<Utc>,
    pub bonus_views_available: u32,
    pub created_at: DateTime<Utc>,
}

impl ViewerAccount {
    /// A freshly registered account: Free plan, zeroed counters.
    pub fn register(email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::register_with_id(AccountId::new(), email, now)
    }

    pub fn register_with_id(
        id: AccountId,
        email: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            plan: Plan::Free,
            premium_until: None,
            daily_views_consumed: 0,
            last_reset_at: now,
            bonus_views_available: 0,
            created_at: now,
        }
    }

    /// The plan whose capabilities apply at `now`. A Premium account whose
    /// paid term has lapsed is treated as Free until it is renewed.
    pub fn effective_plan(&self, now: DateTime<Utc>) -> Plan {
        match (self.plan, self.premium_until) {
            (Plan::Premium, Some(until)) if until <= now => Plan::Free,
            (plan, _) => plan,
        }
    }

    pub fn premium_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.plan == Plan::Premium && self.effective_plan(now) != Plan::Premium
    }
}
