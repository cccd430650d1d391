use std::{fs, path::PathBuf, time::Duration};

use cinegate_config::{
    ConfigGuardRailError, ConfigLoadError, ConfigLoader, EnvConfig,
};
use cinegate_model::{DailyAllowance, Plan, ResolutionTier};
use once_cell::sync::Lazy;
use tempfile::{TempDir, tempdir};

static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> =
    Lazy::new(|| tokio::sync::Mutex::new(()));

fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cinegate.toml");
    fs::write(&path, contents).expect("write config");
    (dir, path)
}

#[test]
fn file_overrides_merge_with_default_policy() {
    let (_dir, path) = write_config(
        r#"
[plans.free]
daily_allowance = 10

[plans.premium]
daily_allowance = "unbounded"
max_resolution = "FHD"

[quota]
utc_offset = "+07:00"

[invites]
ttl = "3days"
bonus_per_invite = 4

[store]
timeout = "750ms"
conflict_retries = 5

[database]
url = "postgres://cinegate@localhost/cinegate"
"#,
    );

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .expect("config loads");
    let config = load.config;

    let free = config.plans.capabilities_for(Plan::Free);
    assert_eq!(free.daily_allowance, DailyAllowance::Limited(10));
    assert_eq!(free.max_resolution, ResolutionTier::P720);
    assert!(free.adult_access);

    let premium = config.plans.capabilities_for(Plan::Premium);
    assert_eq!(premium.max_resolution, ResolutionTier::P1080);
    assert_eq!(premium.daily_allowance, DailyAllowance::Unbounded);

    let guest = config.plans.capabilities_for(Plan::Guest);
    assert_eq!(guest.daily_allowance, DailyAllowance::Limited(0));

    let settings = config.engine_settings();
    assert_eq!(settings.utc_offset.local_minus_utc(), 7 * 3600);
    assert_eq!(settings.invite_ttl, chrono::TimeDelta::days(3));
    assert_eq!(settings.bonus_per_invite, 4);
    assert_eq!(settings.invite_code_length, 8);
    assert_eq!(settings.store_timeout, Duration::from_millis(750));
    assert_eq!(settings.conflict_retries, 5);

    assert_eq!(config.metadata.config_path.as_deref(), Some(path.as_path()));
    assert!(load.warnings.is_empty(), "{:?}", load.warnings.items);
}

#[test]
fn environment_wins_over_file() {
    let (_dir, path) = write_config(
        r#"
[invites]
bonus_per_invite = 4

[quota]
utc_offset = "+07:00"
"#,
    );

    let env = EnvConfig {
        bonus_per_invite: Some("6".into()),
        utc_offset: Some("-05:00".into()),
        guest_daily_allowance: Some("unbounded".into()),
        database_url: Some("postgresql://localhost/cinegate".into()),
        ..Default::default()
    };
    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env)
        .expect("config loads");

    assert_eq!(load.config.invites.bonus_per_invite, 6);
    assert_eq!(load.config.quota.utc_offset.local_minus_utc(), -5 * 3600);
    assert_eq!(
        load.config.plans.allowance_for(Plan::Guest),
        DailyAllowance::Unbounded
    );
    assert_eq!(load.warnings.items.len(), 1);
    assert!(
        load.warnings.items[0]
            .message
            .contains("unlimited anonymous viewing")
    );
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let load = ConfigLoader::new()
        .with_config_path(dir.path().join("absent.toml"))
        .load_with_env(EnvConfig::default());
    assert!(matches!(load, Err(ConfigLoadError::MissingConfig { .. })));

    let env = EnvConfig {
        config_path: Some(dir.path().join("also-absent.toml")),
        ..Default::default()
    };
    let load = ConfigLoader::new().load_with_env(env);
    assert!(matches!(load, Err(ConfigLoadError::MissingConfig { .. })));
}

#[test]
fn unknown_keys_are_rejected() {
    let (_dir, path) = write_config(
        r#"
[plans.platinum]
daily_allowance = 100
"#,
    );

    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Parse { .. }), "{err:?}");
}

#[test]
fn bad_values_name_their_source() {
    let (_dir, path) = write_config(
        r#"
[invites]
ttl = "a week"
"#,
    );
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .unwrap_err();
    assert!(
        matches!(
            err,
            ConfigLoadError::InvalidValue {
                field: "invites.ttl",
                ..
            }
        ),
        "{err:?}"
    );

    let env = EnvConfig {
        conflict_retries: Some("many".into()),
        ..Default::default()
    };
    let (_dir, path) = write_config("");
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env)
        .unwrap_err();
    assert!(
        matches!(
            err,
            ConfigLoadError::InvalidValue {
                field: "CINEGATE_CONFLICT_RETRIES",
                ..
            }
        ),
        "{err:?}"
    );
}

#[test]
fn guard_rails_reject_zero_ttl() {
    let (_dir, path) = write_config(
        r#"
[invites]
ttl = "0s"
"#,
    );
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::ZeroDuration {
            field: "invites.ttl"
        })
    ));
}

#[test]
fn guard_rails_reject_counted_guest_allowance_and_long_ttl() {
    let (_dir, path) = write_config(
        r#"
[plans.guest]
daily_allowance = 2
"#,
    );
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .unwrap_err();
    assert!(
        matches!(
            err,
            ConfigLoadError::GuardRail(
                ConfigGuardRailError::PartialGuestAllowance { allowance: 2 }
            )
        ),
        "{err:?}"
    );

    let (_dir, path) = write_config(
        r#"
[invites]
ttl = "1000000years"
"#,
    );
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .unwrap_err();
    assert!(
        matches!(
            err,
            ConfigLoadError::GuardRail(
                ConfigGuardRailError::InviteTtlTooLong { .. }
            )
        ),
        "{err:?}"
    );
}

#[test]
fn empty_file_warns_about_database() {
    let (_dir, path) = write_config("");
    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .expect("config loads");

    assert_eq!(load.config.plan_registry(), Default::default());
    let messages: Vec<_> = load
        .warnings
        .items
        .iter()
        .map(|warning| warning.message.as_str())
        .collect();
    assert_eq!(messages.len(), 1, "{messages:?}");
    assert!(messages[0].starts_with("DATABASE_URL"));
}

#[tokio::test]
async fn env_file_values_are_loaded() {
    let _guard = ENV_LOCK.lock().await;
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("cinegate.toml");
    fs::write(&config_path, "").expect("write config");
    let env_path = dir.path().join(".env");
    fs::write(
        &env_path,
        "CINEGATE_INVITE_CODE_LENGTH=12\nCINEGATE_STORE_TIMEOUT=3s\n",
    )
    .expect("write env");

    let load = ConfigLoader::new()
        .with_config_path(&config_path)
        .with_env_file(&env_path)
        .load();

    unsafe { std::env::remove_var("CINEGATE_INVITE_CODE_LENGTH") };
    unsafe { std::env::remove_var("CINEGATE_STORE_TIMEOUT") };

    let load = load.expect("config loads");
    assert!(load.config.metadata.env_file_loaded);
    assert_eq!(load.config.invites.code_length, 12);
    assert_eq!(load.config.store.timeout, Duration::from_secs(3));
}
