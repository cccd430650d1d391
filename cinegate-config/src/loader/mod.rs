pub mod error;

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use chrono::{FixedOffset, Offset, Utc};
use cinegate_core::{
    domain::entitlements::PlanRegistry,
    settings::{
        DEFAULT_BONUS_PER_INVITE, DEFAULT_CONFLICT_RETRIES,
        DEFAULT_INVITE_CODE_LENGTH, DEFAULT_INVITE_TTL_DAYS,
        DEFAULT_STORE_TIMEOUT,
    },
};
use cinegate_model::{Capabilities, DailyAllowance, Plan};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::{
    models::{
        Config, ConfigMetadata, DatabaseConfig, InviteConfig, QuotaConfig,
        StoreConfig,
        sources::{EnvConfig, FileConfig, FilePlanConfig, FilePlansConfig},
    },
    validation::{self, ConfigWarnings},
};

pub use error::ConfigLoadError;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("cinegate.toml"),
        PathBuf::from("config/cinegate.toml"),
    ]
});

static OFFSET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-])(\d{2}):?(\d{2})$").expect("offset pattern compiles")
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env`, gather the process environment, then resolve.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        self.resolve(EnvConfig::gather(), env_file_loaded)
    }

    /// Resolve against an explicit environment, leaving the process
    /// environment and `.env` untouched.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        self.resolve(env, false)
    }

    fn resolve(
        &self,
        env: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            compose_config(file_config, env, config_path, env_file_loaded)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env.config_path {
            source.env = Some(from_env.clone());
        } else {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        debug!(
            path = %path.display(),
            ?provenance,
            "loaded configuration file"
        );
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
    env_file_loaded: bool,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if file_config.is_none() {
        warnings.push_with_hint(
            "No cinegate.toml detected; using the default plan policy",
            "Create cinegate.toml or set CINEGATE_CONFIG to customise plans",
        );
    }

    let FileConfig {
        plans: file_plans,
        quota: file_quota,
        invites: file_invites,
        store: file_store,
        database: file_database,
    } = file_config.unwrap_or_default();

    let guest_allowance = env
        .guest_daily_allowance
        .as_deref()
        .map(|raw| {
            DailyAllowance::from_str(raw).map_err(|err| {
                ConfigLoadError::invalid(
                    "CINEGATE_GUEST_DAILY_ALLOWANCE",
                    raw,
                    err,
                )
            })
        })
        .transpose()?;
    let plans = compose_plans(file_plans, guest_allowance)?;

    let utc_offset = match env.utc_offset.as_deref() {
        Some(raw) => parse_offset("CINEGATE_UTC_OFFSET", raw)?,
        None => match file_quota.utc_offset.as_deref() {
            Some(raw) => parse_offset("quota.utc_offset", raw)?,
            None => Utc.fix(),
        },
    };

    let invites = InviteConfig {
        ttl: pick(
            env.invite_ttl.as_deref(),
            file_invites.ttl.as_deref(),
            ("CINEGATE_INVITE_TTL", "invites.ttl"),
            parse_duration,
        )?
        .unwrap_or(Duration::from_secs(
            DEFAULT_INVITE_TTL_DAYS as u64 * 86_400,
        )),
        bonus_per_invite: env_number(
            "CINEGATE_BONUS_PER_INVITE",
            &env.bonus_per_invite,
        )?
        .or(file_invites.bonus_per_invite)
        .unwrap_or(DEFAULT_BONUS_PER_INVITE),
        code_length: env_number(
            "CINEGATE_INVITE_CODE_LENGTH",
            &env.invite_code_length,
        )?
        .or(file_invites.code_length)
        .unwrap_or(DEFAULT_INVITE_CODE_LENGTH),
    };

    let store = StoreConfig {
        timeout: pick(
            env.store_timeout.as_deref(),
            file_store.timeout.as_deref(),
            ("CINEGATE_STORE_TIMEOUT", "store.timeout"),
            parse_duration,
        )?
        .unwrap_or(DEFAULT_STORE_TIMEOUT),
        conflict_retries: env_number(
            "CINEGATE_CONFLICT_RETRIES",
            &env.conflict_retries,
        )?
        .or(file_store.conflict_retries)
        .unwrap_or(DEFAULT_CONFLICT_RETRIES),
    };

    let database = DatabaseConfig {
        url: resolve_database_url(
            env.database_url.as_deref().or(file_database.url.as_deref()),
        )?,
    };

    let config = Config {
        plans,
        quota: QuotaConfig { utc_offset },
        invites,
        store,
        database,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded,
        },
    };

    let guard_warnings = validation::apply_guard_rails(&config)?;
    warnings.extend(guard_warnings);

    Ok((config, warnings))
}

/// Default policy table with file overrides laid over it field by field.
fn compose_plans(
    file_plans: FilePlansConfig,
    guest_allowance: Option<DailyAllowance>,
) -> Result<PlanRegistry, ConfigLoadError> {
    let FilePlansConfig {
        guest,
        free,
        premium,
    } = file_plans;

    let mut guest = overlay(Plan::Guest, guest);
    if let Some(allowance) = guest_allowance {
        guest.daily_allowance = allowance;
    }

    Ok(PlanRegistry::from_entries([
        (Plan::Guest, guest),
        (Plan::Free, overlay(Plan::Free, free)),
        (Plan::Premium, overlay(Plan::Premium, premium)),
    ])?)
}

fn overlay(plan: Plan, file: Option<FilePlanConfig>) -> Capabilities {
    let defaults = Capabilities::default_for(plan);
    let Some(file) = file else {
        return defaults;
    };
    Capabilities::new(
        file.max_resolution.unwrap_or(defaults.max_resolution),
        file.daily_allowance.unwrap_or(defaults.daily_allowance),
        file.adult_access.unwrap_or(defaults.adult_access),
    )
}

/// Environment value first, then the file value, each parsed under its own
/// name so errors point at the right source.
fn pick<T>(
    env_value: Option<&str>,
    file_value: Option<&str>,
    (env_field, file_field): (&'static str, &'static str),
    parse: fn(&'static str, &str) -> Result<T, ConfigLoadError>,
) -> Result<Option<T>, ConfigLoadError> {
    match (env_value, file_value) {
        (Some(raw), _) => parse(env_field, raw).map(Some),
        (None, Some(raw)) => parse(file_field, raw).map(Some),
        (None, None) => Ok(None),
    }
}

fn env_number<T>(
    field: &'static str,
    raw: &Option<String>,
) -> Result<Option<T>, ConfigLoadError>
where
    T: FromStr,
    T::Err: ToString,
{
    raw.as_deref()
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|err| ConfigLoadError::invalid(field, value, err))
        })
        .transpose()
}

fn parse_duration(
    field: &'static str,
    raw: &str,
) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim())
        .map_err(|err| ConfigLoadError::invalid(field, raw, err))
}

/// `Z`, `UTC`, `+HH:MM`, `-HHMM`.
pub fn parse_offset(
    field: &'static str,
    raw: &str,
) -> Result<FixedOffset, ConfigLoadError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z")
    {
        return Ok(Utc.fix());
    }

    let captures = OFFSET_PATTERN.captures(trimmed).ok_or_else(|| {
        ConfigLoadError::invalid(field, raw, "expected UTC or ±HH:MM")
    })?;
    let hours: i32 = captures[2]
        .parse()
        .map_err(|err| ConfigLoadError::invalid(field, raw, err))?;
    let minutes: i32 = captures[3]
        .parse()
        .map_err(|err| ConfigLoadError::invalid(field, raw, err))?;
    if minutes >= 60 {
        return Err(ConfigLoadError::invalid(
            field,
            raw,
            "minutes must be below 60",
        ));
    }

    let sign = if &captures[1] == "-" { -1 } else { 1 };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(
        || ConfigLoadError::invalid(field, raw, "offset out of range"),
    )
}

fn resolve_database_url(
    raw: Option<&str>,
) -> Result<Option<String>, ConfigLoadError> {
    let Some(trimmed) = raw.map(str::trim).filter(|value| !value.is_empty())
    else {
        return Ok(None);
    };

    let parsed = Url::parse(trimmed)
        .map_err(|source| ConfigLoadError::InvalidDatabaseUrl { source })?;
    if !matches!(parsed.scheme(), "postgres" | "postgresql") {
        return Err(ConfigLoadError::invalid(
            "database.url",
            parsed.scheme(),
            "only postgres URLs are supported",
        ));
    }
    Ok(Some(trimmed.to_string()))
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(
            self,
            ConfigPathProvenance::Explicit | ConfigPathProvenance::Env
        )
    }
}
