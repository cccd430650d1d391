use std::path::PathBuf;

use cinegate_model::{DailyAllowance, ResolutionTier};
use serde::{Deserialize, Serialize};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub plans: FilePlansConfig,
    #[serde(default)]
    pub quota: FileQuotaConfig,
    #[serde(default)]
    pub invites: FileInvitesConfig,
    #[serde(default)]
    pub store: FileStoreConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
}

/// Per-plan overrides. A missing plan keeps its default policy entry.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilePlansConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest: Option<FilePlanConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free: Option<FilePlanConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium: Option<FilePlanConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilePlanConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_resolution: Option<ResolutionTier>,
    /// A view count or `"unbounded"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_allowance: Option<DailyAllowance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adult_access: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileQuotaConfig {
    /// Fixed offset such as `"+07:00"` or `"UTC"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileInvitesConfig {
    /// Humantime duration, e.g. `"7d"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_per_invite: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_length: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileStoreConfig {
    /// Humantime duration, e.g. `"2s"` or `"500ms"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_retries: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Environment-derived configuration values. Values are kept raw and parsed
/// by the loader so bad input is reported with the variable name.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub utc_offset: Option<String>,
    pub invite_ttl: Option<String>,
    pub bonus_per_invite: Option<String>,
    pub invite_code_length: Option<String>,
    pub store_timeout: Option<String>,
    pub conflict_retries: Option<String>,
    pub guest_daily_allowance: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: var("CINEGATE_CONFIG").map(PathBuf::from),
            database_url: var("DATABASE_URL"),
            utc_offset: var("CINEGATE_UTC_OFFSET"),
            invite_ttl: var("CINEGATE_INVITE_TTL"),
            bonus_per_invite: var("CINEGATE_BONUS_PER_INVITE"),
            invite_code_length: var("CINEGATE_INVITE_CODE_LENGTH"),
            store_timeout: var("CINEGATE_STORE_TIMEOUT"),
            conflict_retries: var("CINEGATE_CONFLICT_RETRIES"),
            guest_daily_allowance: var("CINEGATE_GUEST_DAILY_ALLOWANCE"),
        }
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
