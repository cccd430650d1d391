use std::time::Duration;

use cinegate_model::{DailyAllowance, Plan};
use thiserror::Error;

use super::models::Config;

/// Furthest real-world zones sit at UTC-12 and UTC+14.
const MAX_OFFSET_SECS: i32 = 14 * 3600;
const MIN_INVITE_CODE_LENGTH: usize = 4;
pub const MAX_INVITE_TTL: Duration = Duration::from_secs(365 * 86_400);

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("invites.ttl must be at most {max_days} days")]
    InviteTtlTooLong { max_days: u64 },
    #[error(
        "plans.guest.daily_allowance must be 0 or \"unbounded\", got \
         {allowance}; anonymous views cannot be counted per viewer"
    )]
    PartialGuestAllowance { allowance: u32 },
    #[error("invites.bonus_per_invite must be greater than zero")]
    ZeroBonus,
    #[error("invites.code_length must be at least {minimum}, got {actual}")]
    InviteCodeTooShort { minimum: usize, actual: usize },
    #[error("quota.utc_offset {offset_secs}s is outside UTC-12:00..=UTC+14:00")]
    OffsetOutOfRange { offset_secs: i32 },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    require_non_zero("invites.ttl", config.invites.ttl)?;
    require_non_zero("store.timeout", config.store.timeout)?;
    if config.invites.ttl > MAX_INVITE_TTL {
        return Err(ConfigGuardRailError::InviteTtlTooLong {
            max_days: MAX_INVITE_TTL.as_secs() / 86_400,
        });
    }

    if config.invites.bonus_per_invite == 0 {
        return Err(ConfigGuardRailError::ZeroBonus);
    }
    if config.invites.code_length < MIN_INVITE_CODE_LENGTH {
        return Err(ConfigGuardRailError::InviteCodeTooShort {
            minimum: MIN_INVITE_CODE_LENGTH,
            actual: config.invites.code_length,
        });
    }

    let offset_secs = config.quota.utc_offset.local_minus_utc();
    if offset_secs.abs() > MAX_OFFSET_SECS {
        return Err(ConfigGuardRailError::OffsetOutOfRange { offset_secs });
    }

    match config.plans.allowance_for(Plan::Guest) {
        DailyAllowance::Limited(0) => {}
        DailyAllowance::Limited(allowance) => {
            return Err(ConfigGuardRailError::PartialGuestAllowance {
                allowance,
            });
        }
        DailyAllowance::Unbounded => warnings.push_with_hint(
            "Guest daily allowance is unbounded; unlimited anonymous viewing \
             is enabled",
            "Set plans.guest.daily_allowance = 0 to require sign-in",
        ),
    }

    let free = config.plans.capabilities_for(Plan::Free);
    let premium = config.plans.capabilities_for(Plan::Premium);
    if premium.max_resolution < free.max_resolution {
        warnings.push(format!(
            "Premium resolution ceiling {} is below Free's {}",
            premium.max_resolution, free.max_resolution
        ));
    }
    if premium_allowance_below_free(
        free.daily_allowance,
        premium.daily_allowance,
    ) {
        warnings.push(format!(
            "Premium daily allowance {} is below Free's {}",
            premium.daily_allowance, free.daily_allowance
        ));
    }

    if config.plans.minimum_plan_for_adult().is_none() {
        warnings.push(
            "No purchasable plan grants adult content; adult assets are \
             unreachable",
        );
    }

    if config.database.url.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL not configured; only in-memory stores are available",
            "Set DATABASE_URL or database.url to persist accounts and invites",
        );
    }

    if config.store.conflict_retries == 0 {
        warnings.push(
            "store.conflict_retries is 0; any write conflict denies the \
             request",
        );
    }

    Ok(warnings)
}

fn require_non_zero(
    field: &'static str,
    value: Duration,
) -> Result<(), ConfigGuardRailError> {
    if value.is_zero() {
        return Err(ConfigGuardRailError::ZeroDuration { field });
    }
    Ok(())
}

fn premium_allowance_below_free(
    free: DailyAllowance,
    premium: DailyAllowance,
) -> bool {
    match (free, premium) {
        (_, DailyAllowance::Unbounded) => false,
        (DailyAllowance::Unbounded, DailyAllowance::Limited(_)) => true,
        (DailyAllowance::Limited(free), DailyAllowance::Limited(premium)) => {
            premium < free
        }
    }
}
