//! Core data model definitions shared across Cinegate crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod account;
pub mod asset;
pub mod decision;
pub mod error;
pub mod ids;
pub mod invite;
pub mod plan;
pub mod prelude;
pub mod quota;
pub mod resolution;

pub use account::ViewerAccount;
pub use asset::{Asset, WatchRequest};
pub use decision::{AccessDecision, ConsumptionSource, DenyReason};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{AccountId, AssetId, InviteId};
pub use invite::{Invite, InviteStatus};
pub use plan::{Capabilities, DailyAllowance, Plan, PremiumTerm};
pub use quota::QuotaSnapshot;
pub use resolution::ResolutionTier;
