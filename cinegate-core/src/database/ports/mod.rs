//! Storage seams consumed by the engine services.
//!
//! Every mutation of a [`ViewerAccount`](cinegate_model::ViewerAccount)'s
//! counters goes through [`AccountStore::atomic_update_account`] or
//! [`AccountStore::credit_bonus_once`], both of which serialize per account.

pub mod accounts;
pub mod invites;

pub use accounts::{AccountMutation, AccountStore, CreditOutcome};
pub use invites::InviteStore;
