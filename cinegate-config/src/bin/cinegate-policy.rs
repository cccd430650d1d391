use std::path::PathBuf;

use anyhow::{Context, Result};
use cinegate_config::{Config, ConfigLoad, ConfigLoader, ConfigWarnings};
use cinegate_model::Plan;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "cinegate-policy",
    about = "Inspect and apply Cinegate entitlement configuration"
)]
struct Cli {
    /// Configuration file (defaults to cinegate.toml or $CINEGATE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load configuration and report guard-rail warnings
    Check {
        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },
    /// Print the effective plan table and engine settings
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Apply database migrations to DATABASE_URL
    #[cfg(feature = "database")]
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut loader = ConfigLoader::new().with_env_file(&cli.env_file);
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!(path = %cli.env_file.display(), "loaded .env file");
    }

    match cli.command {
        Command::Check { strict } => {
            report(&warnings);
            if strict && !warnings.is_empty() {
                anyhow::bail!(
                    "{} configuration warning(s)",
                    warnings.items.len()
                );
            }
            println!("configuration OK");
        }
        Command::Show { json } => {
            report(&warnings);
            if json {
                let rendered =
                    serde_json::to_string_pretty(&render_json(&config))?;
                println!("{rendered}");
            } else {
                print!("{}", render_table(&config));
            }
        }
        #[cfg(feature = "database")]
        Command::Migrate => {
            report(&warnings);
            let url = config
                .database
                .url
                .as_deref()
                .context(
                    "DATABASE_URL or database.url is required to migrate",
                )?;
            let pool = sqlx::PgPool::connect(url)
                .await
                .context("failed to connect to database")?;
            cinegate_core::MIGRATOR
                .run(&pool)
                .await
                .context("failed to apply migrations")?;
            info!("migrations applied");
        }
    }

    Ok(())
}

fn report(warnings: &ConfigWarnings) {
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => warn!(hint = %hint, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }
}

fn render_table(config: &Config) -> String {
    let mut out = String::from("plan     max_res  daily      adult\n");
    for (plan, caps) in config.plans.iter() {
        out.push_str(&format!(
            "{:<8} {:<8} {:<10} {}\n",
            plan.as_str(),
            caps.max_resolution,
            caps.daily_allowance,
            if caps.adult_access { "yes" } else { "no" }
        ));
    }

    let settings = config.engine_settings();
    let rows = [
        ("reset offset", settings.utc_offset.to_string()),
        (
            "invite ttl",
            humantime::format_duration(config.invites.ttl).to_string(),
        ),
        ("bonus per invite", settings.bonus_per_invite.to_string()),
        ("invite code len", settings.invite_code_length.to_string()),
        (
            "store timeout",
            humantime::format_duration(settings.store_timeout).to_string(),
        ),
        ("conflict retries", settings.conflict_retries.to_string()),
    ];
    out.push('\n');
    for (label, value) in rows {
        out.push_str(&format!("{label:<16} {value}\n"));
    }
    out
}

fn render_json(config: &Config) -> serde_json::Value {
    let plans: serde_json::Map<String, serde_json::Value> = Plan::ALL
        .into_iter()
        .map(|plan| {
            let caps = config.plans.capabilities_for(plan);
            (
                plan.as_str().to_string(),
                json!({
                    "max_resolution": caps.max_resolution,
                    "daily_allowance": caps.daily_allowance,
                    "adult_access": caps.adult_access,
                    "available_resolutions":
                        config.plans.available_resolutions(plan),
                }),
            )
        })
        .collect();

    json!({
        "plans": plans,
        "quota": { "utc_offset": config.quota.utc_offset.to_string() },
        "invites": {
            "ttl": humantime::format_duration(config.invites.ttl).to_string(),
            "bonus_per_invite": config.invites.bonus_per_invite,
            "code_length": config.invites.code_length,
        },
        "store": {
            "timeout":
                humantime::format_duration(config.store.timeout).to_string(),
            "conflict_retries": config.store.conflict_retries,
        },
        "database": { "configured": config.database.url.is_some() },
    })
}
