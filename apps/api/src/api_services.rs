use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use elevate_application::{
    AccessRequestService, AccessRequestStore, ChangeFeed, ChangeFeedProcessor, Clock,
    CredentialIssuer, FederationService, NotificationChannel, NotificationDispatcher,
    SystemClock, TtlAssignmentService,
};
use elevate_core::{AppError, AppResult};
use elevate_infrastructure::{
    ConsoleNotificationChannel, HttpCredentialIssuer, HttpIntrospectionClaimsVerifier,
    HttpSigninFederation, InMemoryAccessRequestStore, PostgresAccessRequestStore,
    SmtpNotificationChannel, StaticCredentialIssuer,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::api_config::{
    ApiConfig, CredentialIssuerConfig, EmbeddedWorkerConfig, NotificationProviderConfig,
    StoreBackendConfig,
};
use crate::state::AppState;

/// Record store handles selected by `STORE_BACKEND`.
pub struct StoreHandles {
    pub store: Arc<dyn AccessRequestStore>,
    pub feed: Arc<dyn ChangeFeed>,
    pub in_process_feed: bool,
}

pub async fn connect_store(config: &ApiConfig) -> AppResult<StoreHandles> {
    match &config.store_backend {
        StoreBackendConfig::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to connect to database: {error}"))
                })?;

            sqlx::migrate!("../../crates/infrastructure/migrations")
                .run(&pool)
                .await
                .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

            let store = Arc::new(PostgresAccessRequestStore::new(pool));
            Ok(StoreHandles {
                store: store.clone(),
                feed: store,
                in_process_feed: false,
            })
        }
        StoreBackendConfig::Memory => {
            warn!("using in-memory access request store; records are lost on restart");
            let store = Arc::new(InMemoryAccessRequestStore::new());
            Ok(StoreHandles {
                store: store.clone(),
                feed: store,
                in_process_feed: true,
            })
        }
    }
}

pub fn build_state(
    config: &ApiConfig,
    handles: &StoreHandles,
    http_client: reqwest::Client,
) -> AppState {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let credential_issuer: Arc<dyn CredentialIssuer> = match &config.credential_issuer {
        CredentialIssuerConfig::Http { broker_url } => Arc::new(HttpCredentialIssuer::new(
            http_client.clone(),
            broker_url.as_str(),
        )),
        CredentialIssuerConfig::Static => {
            warn!("using static development credential issuer");
            Arc::new(StaticCredentialIssuer::new(clock.clone(), Duration::hours(1)))
        }
    };
    let signin_federation = Arc::new(HttpSigninFederation::new(
        http_client.clone(),
        config.federation_endpoint.clone(),
        config.console_destination.clone(),
    ));
    let claims_verifier = Arc::new(HttpIntrospectionClaimsVerifier::new(
        http_client,
        config.claims.introspection_url.as_str(),
        config.claims.client_id.as_str(),
        config.claims.client_secret.as_str(),
    ));

    AppState {
        access_request_service: AccessRequestService::new(
            handles.store.clone(),
            clock.clone(),
            config.policy.clone(),
        ),
        federation_service: FederationService::new(
            handles.store.clone(),
            clock,
            credential_issuer,
            signin_federation,
            config.policy.clone(),
        ),
        claims_verifier,
        store: handles.store.clone(),
    }
}

/// Builds the change-feed processor the API runs itself when the feed lives in this process.
pub fn embedded_processor(
    config: &ApiConfig,
    handles: &StoreHandles,
) -> Option<ChangeFeedProcessor> {
    if !handles.in_process_feed {
        return None;
    }

    let EmbeddedWorkerConfig {
        notification_provider,
        notification_settings,
        batch_size,
        ..
    } = &config.embedded_worker;

    let channel: Arc<dyn NotificationChannel> = match notification_provider {
        NotificationProviderConfig::Console => Arc::new(ConsoleNotificationChannel::new()),
        NotificationProviderConfig::Smtp(smtp) => {
            Arc::new(SmtpNotificationChannel::new(smtp.clone()))
        }
    };

    info!(batch_size, "running change-feed processing inside the api");
    Some(ChangeFeedProcessor::new(
        handles.feed.clone(),
        TtlAssignmentService::new(handles.store.clone(), config.policy.clone()),
        NotificationDispatcher::new(channel, notification_settings.clone()),
        *batch_size,
    ))
}

pub async fn run_embedded_processor(processor: ChangeFeedProcessor, poll_interval: StdDuration) {
    loop {
        match processor.run_once().await {
            Ok(counts) if !counts.is_idle() => continue,
            Ok(_) => {}
            Err(error) => warn!(error = %error, "embedded change-feed pass failed"),
        }
        tokio::time::sleep(poll_interval).await;
    }
}
