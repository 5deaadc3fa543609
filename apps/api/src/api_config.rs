use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use elevate_application::{
    AccessPolicyConfig, DEFAULT_FEDERATION_GROUP_PREFIX, DEFAULT_FEDERATION_GROUP_SEPARATOR,
    NotificationSettings,
};
use elevate_core::AppError;
use elevate_domain::DEFAULT_RETENTION_DAYS;
use elevate_infrastructure::SmtpNotificationConfig;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone)]
pub enum StoreBackendConfig {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ClaimsIntrospectionConfig {
    pub introspection_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub enum CredentialIssuerConfig {
    Http { broker_url: String },
    Static,
}

#[derive(Debug, Clone)]
pub enum NotificationProviderConfig {
    Console,
    Smtp(SmtpNotificationConfig),
}

/// Change-feed processing inside the API, used only with the in-memory store.
#[derive(Debug, Clone)]
pub struct EmbeddedWorkerConfig {
    pub notification_provider: NotificationProviderConfig,
    pub notification_settings: NotificationSettings,
    pub batch_size: usize,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub store_backend: StoreBackendConfig,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub policy: AccessPolicyConfig,
    pub claims: ClaimsIntrospectionConfig,
    pub credential_issuer: CredentialIssuerConfig,
    pub federation_endpoint: Url,
    pub console_destination: Url,
    pub embedded_worker: EmbeddedWorkerConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "postgres" => StoreBackendConfig::Postgres {
                database_url: required_env("DATABASE_URL")?,
            },
            "memory" => StoreBackendConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "STORE_BACKEND must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let policy = load_policy()?;

        let claims = ClaimsIntrospectionConfig {
            introspection_url: required_non_empty_env("CLAIMS_INTROSPECTION_URL")?,
            client_id: required_non_empty_env("CLAIMS_CLIENT_ID")?,
            client_secret: required_non_empty_env("CLAIMS_CLIENT_SECRET")?,
        };

        let credential_issuer = match env::var("CREDENTIAL_ISSUER")
            .unwrap_or_else(|_| "http".to_owned())
            .as_str()
        {
            "http" => CredentialIssuerConfig::Http {
                broker_url: required_non_empty_env("CREDENTIAL_BROKER_URL")?,
            },
            "static" => CredentialIssuerConfig::Static,
            other => {
                return Err(AppError::Validation(format!(
                    "CREDENTIAL_ISSUER must be either 'http' or 'static', got '{other}'"
                )));
            }
        };

        let federation_endpoint = parse_url_env(
            "FEDERATION_ENDPOINT",
            "https://signin.aws.amazon.com/federation",
        )?;
        let console_destination =
            parse_url_env("CONSOLE_DESTINATION_URL", "https://console.aws.amazon.com/")?;

        let embedded_worker = EmbeddedWorkerConfig {
            notification_provider: load_notification_provider()?,
            notification_settings: NotificationSettings {
                reviewer_recipient: env::var("REVIEWER_NOTIFICATION_ADDRESS")
                    .unwrap_or_else(|_| "reviewers@localhost".to_owned()),
                dashboard_url: env::var("DASHBOARD_URL").unwrap_or_else(|_| frontend_url.clone()),
            },
            batch_size: parse_env_usize("WORKER_BATCH_SIZE", 100)?,
            poll_interval: Duration::from_millis(parse_env_u64("WORKER_POLL_INTERVAL_MS", 1500)?),
        };

        Ok(Self {
            migrate_only,
            store_backend,
            frontend_url,
            api_host,
            api_port,
            policy,
            claims,
            credential_issuer,
            federation_endpoint,
            console_destination,
            embedded_worker,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

fn load_policy() -> Result<AccessPolicyConfig, AppError> {
    let prefix = env::var("FEDERATION_GROUP_PREFIX")
        .unwrap_or_else(|_| DEFAULT_FEDERATION_GROUP_PREFIX.to_owned());
    let separator = env::var("FEDERATION_GROUP_SEPARATOR")
        .unwrap_or_else(|_| DEFAULT_FEDERATION_GROUP_SEPARATOR.to_owned());
    let retention_days = parse_env_u32("TTL_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;

    AccessPolicyConfig::new(
        required_non_empty_env("REVIEWER_GROUP")?,
        required_non_empty_env("AUDITOR_GROUP")?,
    )?
    .with_federation_groups(prefix, separator)?
    .with_retention_days(retention_days)
}

fn load_notification_provider() -> Result<NotificationProviderConfig, AppError> {
    match env::var("NOTIFICATION_PROVIDER")
        .unwrap_or_else(|_| "console".to_owned())
        .as_str()
    {
        "console" => Ok(NotificationProviderConfig::Console),
        "smtp" => {
            let port = required_non_empty_env("SMTP_PORT")?
                .parse::<u16>()
                .map_err(|error| AppError::Validation(format!("invalid SMTP_PORT: {error}")))?;
            Ok(NotificationProviderConfig::Smtp(SmtpNotificationConfig {
                host: required_non_empty_env("SMTP_HOST")?,
                port,
                username: required_non_empty_env("SMTP_USERNAME")?,
                password: required_non_empty_env("SMTP_PASSWORD")?,
                from_address: required_non_empty_env("SMTP_FROM_ADDRESS")?,
            }))
        }
        other => Err(AppError::Validation(format!(
            "NOTIFICATION_PROVIDER must be either 'console' or 'smtp', got '{other}'"
        ))),
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_url_env(name: &str, default: &str) -> Result<Url, AppError> {
    let value = env::var(name).unwrap_or_else(|_| default.to_owned());
    Url::parse(value.as_str())
        .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, AppError> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, AppError> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, AppError> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
