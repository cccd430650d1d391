use std::fmt;

use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::plan::Plan;

/// Canonical reasons a watch request is refused.
///
/// Denials are ordinary outcomes; callers map them to status codes and copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DenyReason {
    /// Adult-only asset requested without signing in.
    AdultContentRequiresAuth,
    /// Signed in, but the plan does not grant adult content.
    PlanForbidsAdultContent,
    /// Requested resolution is above the plan ceiling.
    ResolutionRequiresUpgrade,
    /// Bonus credits and daily allowance are both spent.
    DailyQuotaExceeded,
    /// The account store failed or timed out; the view was not metered.
    TransientStoreError,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdultContentRequiresAuth => "adult_content_requires_auth",
            Self::PlanForbidsAdultContent => "plan_forbids_adult_content",
            Self::ResolutionRequiresUpgrade => "resolution_requires_upgrade",
            Self::DailyQuotaExceeded => "daily_quota_exceeded",
            Self::TransientStoreError => "transient_store_error",
        }
    }

    /// Whether retrying the same request later may succeed without any
    /// change on the viewer's side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStoreError)
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which credit pool paid for an allowed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConsumptionSource {
    Bonus,
    Daily,
}

/// Outcome of evaluating a [`WatchRequest`](crate::WatchRequest).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    /// Start of the next calendar day, set on `DailyQuotaExceeded`.
    pub reset_time: Option<DateTime<Utc>>,
    /// Cheapest plan that would satisfy the request, set on
    /// `ResolutionRequiresUpgrade` and `PlanForbidsAdultContent`.
    pub minimum_plan_required: Option<Plan>,
    /// Credit pool charged for an allowed, metered view.
    pub consumed_from: Option<ConsumptionSource>,
    /// Metered views left today (bonus included). `None` when unmetered.
    pub remaining_views: Option<u32>,
}

impl AccessDecision {
    /// Allowed without touching any counter.
    pub fn unmetered() -> Self {
        Self {
            allowed: true,
            reason: None,
            reset_time: None,
            minimum_plan_required: None,
            consumed_from: None,
            remaining_views: None,
        }
    }

    pub fn consumed(source: ConsumptionSource, remaining_views: u32) -> Self {
        Self {
            consumed_from: Some(source),
            remaining_views: Some(remaining_views),
            ..Self::unmetered()
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            reset_time: None,
            minimum_plan_required: None,
            consumed_from: None,
            remaining_views: None,
        }
    }

    pub fn quota_exceeded(reset_time: DateTime<Utc>) -> Self {
        Self {
            reset_time: Some(reset_time),
            remaining_views: Some(0),
            ..Self::deny(DenyReason::DailyQuotaExceeded)
        }
    }

    pub fn upgrade_required(reason: DenyReason, minimum: Option<Plan>) -> Self {
        Self {
            minimum_plan_required: minimum,
            ..Self::deny(reason)
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn denied_because(&self, reason: DenyReason) -> bool {
        !self.allowed && self.reason == Some(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_keep_allowed_and_reason_consistent() {
        let allowed = AccessDecision::consumed(ConsumptionSource::Bonus, 4);
        assert!(allowed.is_allowed());
        assert!(allowed.reason.is_none());

        let denied = AccessDecision::upgrade_required(
            DenyReason::ResolutionRequiresUpgrade,
            Some(Plan::Premium),
        );
        assert!(!denied.is_allowed());
        assert!(denied.denied_because(DenyReason::ResolutionRequiresUpgrade));
        assert_eq!(denied.minimum_plan_required, Some(Plan::Premium));
    }

    #[test]
    fn only_store_errors_are_retryable() {
        assert!(DenyReason::TransientStoreError.is_retryable());
        assert!(!DenyReason::DailyQuotaExceeded.is_retryable());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn wire_codes_match_as_str() {
        for reason in [
            DenyReason::AdultContentRequiresAuth,
            DenyReason::PlanForbidsAdultContent,
            DenyReason::ResolutionRequiresUpgrade,
            DenyReason::DailyQuotaExceeded,
            DenyReason::TransientStoreError,
        ] {
            let wire = serde_json::to_value(reason).unwrap();
            assert_eq!(wire, serde_json::Value::from(reason.as_str()));
        }
        assert_eq!(
            DenyReason::TransientStoreError.as_str(),
            "transient_store_error"
        );
    }
}
