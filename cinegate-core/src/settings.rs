use std::time::Duration;

use chrono::{FixedOffset, Offset, TimeDelta, Utc};

/// Default bonus views credited per accepted invite.
pub const DEFAULT_BONUS_PER_INVITE: u32 = 2;
/// Default validity window of a pending invite, in days.
pub const DEFAULT_INVITE_TTL_DAYS: i64 = 7;
/// Default upper bound on a single store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);
/// Default number of retries after an optimistic-concurrency conflict.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;
/// Default length of generated invite codes.
pub const DEFAULT_INVITE_CODE_LENGTH: usize = 8;

/// Runtime knobs shared by the engine services.
///
/// Built by the config loader; every field has a working default so tests
/// and embedders can start from [`EngineSettings::default`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Reference timezone for the daily reset.
    pub utc_offset: FixedOffset,
    pub store_timeout: Duration,
    pub conflict_retries: u32,
    pub invite_ttl: TimeDelta,
    pub bonus_per_invite: u32,
    pub invite_code_length: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            invite_ttl: TimeDelta::days(DEFAULT_INVITE_TTL_DAYS),
            bonus_per_invite: DEFAULT_BONUS_PER_INVITE,
            invite_code_length: DEFAULT_INVITE_CODE_LENGTH,
        }
    }
}
