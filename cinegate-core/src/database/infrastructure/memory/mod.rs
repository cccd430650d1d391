//! In-process stores for tests, demos and single-node embedding.

pub mod accounts;
pub mod invites;

pub use accounts::InMemoryAccountStore;
pub use invites::InMemoryInviteStore;
