use std::fmt;
use std::str::FromStr;

use chrono::Duration;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::resolution::ResolutionTier;

/// Subscription tier. Declared in ascending order of entitlement so that the
/// derived `Ord` reads as "at least this plan".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Plan {
    /// Anonymous viewer, never persisted.
    #[cfg_attr(feature = "serde", serde(alias = "GUEST"))]
    Guest,
    #[cfg_attr(feature = "serde", serde(alias = "FREE"))]
    Free,
    #[cfg_attr(feature = "serde", serde(alias = "PREMIUM"))]
    Premium,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Guest, Plan::Free, Plan::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Guest => "guest",
            Plan::Free => "free",
            Plan::Premium => "premium",
        }
    }

    /// Dense index used by lookup tables keyed on every plan.
    pub const fn index(&self) -> usize {
        match self {
            Plan::Guest => 0,
            Plan::Free => 1,
            Plan::Premium => 2,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(Plan::Guest),
            "free" => Ok(Plan::Free),
            "premium" => Ok(Plan::Premium),
            _ => Err(ModelError::UnknownPlan(s.to_string())),
        }
    }
}

/// Number of metered views a plan grants per calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "RawAllowance", into = "RawAllowance")
)]
pub enum DailyAllowance {
    Limited(u32),
    Unbounded,
}

impl DailyAllowance {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, DailyAllowance::Unbounded)
    }

    /// Views left after `consumed` metered views, `None` when unbounded.
    pub fn remaining_after(&self, consumed: u32) -> Option<u32> {
        match self {
            DailyAllowance::Limited(limit) => {
                Some(limit.saturating_sub(consumed))
            }
            DailyAllowance::Unbounded => None,
        }
    }
}

impl fmt::Display for DailyAllowance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DailyAllowance::Limited(limit) => write!(f, "{limit}"),
            DailyAllowance::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl FromStr for DailyAllowance {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("unbounded")
            || trimmed.eq_ignore_ascii_case("unlimited")
        {
            return Ok(DailyAllowance::Unbounded);
        }
        trimmed
            .parse::<u32>()
            .map(DailyAllowance::Limited)
            .map_err(|_| ModelError::InvalidAllowance(s.to_string()))
    }
}

/// Wire form of [`DailyAllowance`]: a bare count or the word `"unbounded"`.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawAllowance {
    Count(u32),
    Word(String),
}

#[cfg(feature = "serde")]
impl TryFrom<RawAllowance> for DailyAllowance {
    type Error = ModelError;

    fn try_from(raw: RawAllowance) -> Result<Self, Self::Error> {
        match raw {
            RawAllowance::Count(limit) => Ok(DailyAllowance::Limited(limit)),
            RawAllowance::Word(word) => word.parse(),
        }
    }
}

#[cfg(feature = "serde")]
impl From<DailyAllowance> for RawAllowance {
    fn from(value: DailyAllowance) -> Self {
        match value {
            DailyAllowance::Limited(limit) => RawAllowance::Count(limit),
            DailyAllowance::Unbounded => {
                RawAllowance::Word("unbounded".to_string())
            }
        }
    }
}

/// Capability tuple granted by a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Capabilities {
    pub max_resolution: ResolutionTier,
    pub daily_allowance: DailyAllowance,
    pub adult_access: bool,
}

impl Capabilities {
    pub const fn new(
        max_resolution: ResolutionTier,
        daily_allowance: DailyAllowance,
        adult_access: bool,
    ) -> Self {
        Self {
            max_resolution,
            daily_allowance,
            adult_access,
        }
    }

    /// Default policy entry for `plan`.
    pub const fn default_for(plan: Plan) -> Self {
        match plan {
            Plan::Guest => Self::new(
                ResolutionTier::P720,
                DailyAllowance::Limited(0),
                false,
            ),
            Plan::Free => Self::new(
                ResolutionTier::P720,
                DailyAllowance::Limited(5),
                true,
            ),
            Plan::Premium => Self::new(
                ResolutionTier::P1080,
                DailyAllowance::Unbounded,
                true,
            ),
        }
    }

    pub fn permits_resolution(&self, requested: ResolutionTier) -> bool {
        requested <= self.max_resolution
    }
}

/// Billing term for a Premium upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PremiumTerm {
    Monthly,
    Yearly,
}

impl PremiumTerm {
    pub fn duration(&self) -> Duration {
        match self {
            PremiumTerm::Monthly => Duration::days(30),
            PremiumTerm::Yearly => Duration::days(365),
        }
    }
}
