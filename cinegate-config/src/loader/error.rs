use std::path::PathBuf;

use cinegate_core::domain::entitlements::ConfigurationError;
use thiserror::Error;

use crate::validation::ConfigGuardRailError;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid database URL")]
    InvalidDatabaseUrl {
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Registry(#[from] ConfigurationError),
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigLoadError {
    pub(crate) fn invalid(
        field: &'static str,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
