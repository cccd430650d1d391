//! Configuration for the Cinegate entitlement engine.
//!
//! Loads the plan policy table and engine knobs from `cinegate.toml`, `.env`
//! and `CINEGATE_*` environment variables, applies guard rails, and hands the
//! result to `cinegate-core` as a [`PlanRegistry`] plus [`EngineSettings`].
//! The `cinegate-policy` binary wraps the same loader for operators.
//!
//! [`PlanRegistry`]: cinegate_core::domain::entitlements::PlanRegistry
//! [`EngineSettings`]: cinegate_core::EngineSettings

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError,
};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    Config, ConfigMetadata, DatabaseConfig, InviteConfig, QuotaConfig,
    StoreConfig,
};
pub use validation::{
    ConfigGuardRailError, ConfigWarning, ConfigWarnings, apply_guard_rails,
};
