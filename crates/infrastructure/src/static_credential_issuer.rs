//! Development credential issuer that fabricates inert credentials locally.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use elevate_application::{Clock, CredentialIssuer, TemporaryCredentials};
use elevate_core::AppResult;
use tracing::info;

/// Credential issuer for local development; nothing it returns is accepted anywhere.
#[derive(Clone)]
pub struct StaticCredentialIssuer {
    clock: Arc<dyn Clock>,
    lifetime: Duration,
}

impl StaticCredentialIssuer {
    /// Creates an issuer whose credentials expire `lifetime` after issue.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, lifetime: Duration) -> Self {
        Self { clock, lifetime }
    }
}

#[async_trait]
impl CredentialIssuer for StaticCredentialIssuer {
    async fn assume_role(
        &self,
        account: &str,
        role: &str,
        session_name: &str,
    ) -> AppResult<TemporaryCredentials> {
        info!(account, role, session_name, "issuing static development credentials");

        Ok(TemporaryCredentials {
            access_key_id: format!("STATIC{account}"),
            secret_access_key: format!("static-secret-{role}"),
            session_token: format!("static-session-{session_name}"),
            expiration: self.clock.now() + self.lifetime,
        })
    }
}
