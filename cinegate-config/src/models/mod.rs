pub mod sources;

use std::{path::PathBuf, time::Duration};

use chrono::{FixedOffset, TimeDelta};
use cinegate_core::{EngineSettings, domain::entitlements::PlanRegistry};

/// Fully resolved configuration: file values overlaid by the environment,
/// defaults filled in.
#[derive(Debug, Clone)]
pub struct Config {
    pub plans: PlanRegistry,
    pub quota: QuotaConfig,
    pub invites: InviteConfig,
    pub store: StoreConfig,
    pub database: DatabaseConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn plan_registry(&self) -> PlanRegistry {
        self.plans.clone()
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            utc_offset: self.quota.utc_offset,
            store_timeout: self.store.timeout,
            conflict_retries: self.store.conflict_retries,
            // Guard rails cap the TTL at a year.
            invite_ttl: TimeDelta::from_std(self.invites.ttl)
                .unwrap_or(TimeDelta::MAX),
            bonus_per_invite: self.invites.bonus_per_invite,
            invite_code_length: self.invites.code_length,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuotaConfig {
    /// Reference timezone whose midnight resets daily counters.
    pub utc_offset: FixedOffset,
}

#[derive(Debug, Clone, Copy)]
pub struct InviteConfig {
    pub ttl: Duration,
    pub bonus_per_invite: u32,
    pub code_length: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub timeout: Duration,
    pub conflict_retries: u32,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
