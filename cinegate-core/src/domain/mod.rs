pub mod accounts;
pub mod entitlements;
pub mod referrals;
