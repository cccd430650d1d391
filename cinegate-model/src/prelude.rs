//! Flat re-export of the model surface for request handlers.

pub use super::account::ViewerAccount;
pub use super::asset::{Asset, WatchRequest};
pub use super::decision::{AccessDecision, ConsumptionSource, DenyReason};
pub use super::ids::{AccountId, AssetId, InviteId};
pub use super::invite::{Invite, InviteStatus};
pub use super::plan::{Capabilities, DailyAllowance, Plan, PremiumTerm};
pub use super::quota::QuotaSnapshot;
pub use super::resolution::ResolutionTier;
