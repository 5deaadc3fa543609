use async_trait::async_trait;
use elevate_core::{AppResult, CallerClaims};

/// Verifies a bearer token and returns the caller's claims.
///
/// Services trust the returned claims; nothing downstream re-checks the token.
#[async_trait]
pub trait ClaimsVerifier: Send + Sync {
    /// Returns claims for an active token or `Unauthorized`.
    async fn verify(&self, bearer_token: &str) -> AppResult<CallerClaims>;
}
