//! Invite/referral tracking feeding the bonus ledger.

pub mod invites;

pub use invites::{AcceptedInvite, InviteError, InviteService};
