use async_trait::async_trait;
use elevate_core::AppResult;

use super::TemporaryCredentials;

/// Exchanges temporary credentials for a single-use console sign-in URL.
#[async_trait]
pub trait SigninFederation: Send + Sync {
    /// Returns the sign-in URL for the given credentials.
    async fn signin_url(&self, credentials: &TemporaryCredentials) -> AppResult<String>;
}
