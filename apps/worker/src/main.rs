//! Elevate change-feed worker: attaches request ttls and sends notifications.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use elevate_application::{
    ChangeFeedProcessor, NotificationChannel, NotificationDispatcher, NotificationSettings,
    TtlAssignmentService,
};
use elevate_core::{AppError, AppResult};
use elevate_domain::DEFAULT_RETENTION_DAYS;
use elevate_infrastructure::{
    ConsoleNotificationChannel, PostgresAccessRequestStore, SmtpNotificationChannel,
    SmtpNotificationConfig,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
enum NotificationProviderConfig {
    Console,
    Smtp(SmtpNotificationConfig),
}

#[derive(Clone)]
struct WorkerConfig {
    database_url: String,
    retention_days: u32,
    notification_provider: NotificationProviderConfig,
    notification_settings: NotificationSettings,
    batch_size: usize,
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let processor = build_processor(pool, &config)?;

    info!(
        batch_size = config.batch_size,
        poll_interval_ms = config.poll_interval_ms,
        retention_days = config.retention_days,
        "elevate-worker started"
    );

    loop {
        match processor.run_once().await {
            Ok(counts) if counts.is_idle() => {
                tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
            }
            Ok(counts) => {
                info!(
                    ttl_changes = counts.ttl,
                    notification_changes = counts.notifications,
                    "processed change feed batch"
                );
            }
            Err(error) => {
                warn!(error = %error, "change feed pass failed");
                tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
            }
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_processor(pool: PgPool, config: &WorkerConfig) -> AppResult<ChangeFeedProcessor> {
    let store = Arc::new(PostgresAccessRequestStore::new(pool));
    let channel: Arc<dyn NotificationChannel> = match &config.notification_provider {
        NotificationProviderConfig::Console => Arc::new(ConsoleNotificationChannel::new()),
        NotificationProviderConfig::Smtp(smtp) => {
            Arc::new(SmtpNotificationChannel::new(smtp.clone()))
        }
    };

    Ok(ChangeFeedProcessor::new(
        store.clone(),
        TtlAssignmentService::with_retention_days(store, config.retention_days)?,
        NotificationDispatcher::new(channel, config.notification_settings.clone()),
        config.batch_size,
    ))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;

        let retention_days = parse_env_u32("TTL_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;

        let notification_provider = match env::var("NOTIFICATION_PROVIDER")
            .unwrap_or_else(|_| "console".to_owned())
            .as_str()
        {
            "console" => NotificationProviderConfig::Console,
            "smtp" => {
                let port = required_non_empty_env("SMTP_PORT")?
                    .parse::<u16>()
                    .map_err(|error| AppError::Validation(format!("invalid SMTP_PORT: {error}")))?;
                NotificationProviderConfig::Smtp(SmtpNotificationConfig {
                    host: required_non_empty_env("SMTP_HOST")?,
                    port,
                    username: required_non_empty_env("SMTP_USERNAME")?,
                    password: required_non_empty_env("SMTP_PASSWORD")?,
                    from_address: required_non_empty_env("SMTP_FROM_ADDRESS")?,
                })
            }
            other => {
                return Err(AppError::Validation(format!(
                    "NOTIFICATION_PROVIDER must be either 'console' or 'smtp', got '{other}'"
                )));
            }
        };

        let notification_settings = NotificationSettings {
            reviewer_recipient: required_non_empty_env("REVIEWER_NOTIFICATION_ADDRESS")?,
            dashboard_url: env::var("DASHBOARD_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_owned()),
        };

        let batch_size = parse_env_usize("WORKER_BATCH_SIZE", 100)?;
        let poll_interval_ms = parse_env_u64("WORKER_POLL_INTERVAL_MS", 1500)?;

        if batch_size == 0 {
            return Err(AppError::Validation(
                "WORKER_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        if poll_interval_ms == 0 {
            return Err(AppError::Validation(
                "WORKER_POLL_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            retention_days,
            notification_provider,
            notification_settings,
            batch_size,
            poll_interval_ms,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> AppResult<String> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
