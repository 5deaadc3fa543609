use async_trait::async_trait;
use chrono::{DateTime, Utc};
use elevate_core::AppResult;
use serde::{Deserialize, Serialize};

/// Temporary credential set scoped to one role.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryCredentials {
    /// Access key identifier.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token.
    pub session_token: String,
    /// Instant after which the credentials stop working.
    pub expiration: DateTime<Utc>,
}

impl std::fmt::Debug for TemporaryCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Issuer of temporary role credentials.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Assumes `role` in `account` under the given session name.
    async fn assume_role(
        &self,
        account: &str,
        role: &str,
        session_name: &str,
    ) -> AppResult<TemporaryCredentials>;
}
