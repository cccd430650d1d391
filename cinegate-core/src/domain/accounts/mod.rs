//! Account registration and plan lifecycle.

pub mod email;
pub mod manager;

pub use email::{InvalidEmail, normalize_email};
pub use manager::{AccountError, PlanManager};
