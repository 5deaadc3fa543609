use async_trait::async_trait;
use elevate_application::ClaimsVerifier;
use elevate_core::{AppError, AppResult, CallerClaims};
use serde::Deserialize;
use tracing::warn;

/// OAuth 2.0 token introspection response (RFC 7662) with the claims the engine reads.
#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
}

impl IntrospectionResponse {
    fn into_claims(self) -> AppResult<CallerClaims> {
        if !self.active {
            return Err(AppError::Unauthorized("token is not active".to_owned()));
        }

        let subject = self
            .sub
            .filter(|subject| !subject.trim().is_empty())
            .ok_or_else(|| AppError::Unauthorized("token has no subject claim".to_owned()))?;
        let email = self.email.filter(|email| !email.trim().is_empty());

        Ok(CallerClaims::new(subject, email, self.groups))
    }
}

/// Claims verifier backed by an RFC 7662 introspection endpoint.
pub struct HttpIntrospectionClaimsVerifier {
    http_client: reqwest::Client,
    introspection_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpIntrospectionClaimsVerifier {
    /// Creates a verifier authenticating to the endpoint with client credentials.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        introspection_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            introspection_url: introspection_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl ClaimsVerifier for HttpIntrospectionClaimsVerifier {
    async fn verify(&self, bearer_token: &str) -> AppResult<CallerClaims> {
        if bearer_token.trim().is_empty() {
            return Err(AppError::Unauthorized("missing bearer token".to_owned()));
        }

        let response = self
            .http_client
            .post(self.introspection_url.as_str())
            .basic_auth(self.client_id.as_str(), Some(self.client_secret.as_str()))
            .form(&[("token", bearer_token), ("token_type_hint", "access_token")])
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("introspection endpoint transport error: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "introspection endpoint rejected request");
            return Err(AppError::Internal(format!(
                "introspection endpoint failed with status {status}"
            )));
        }

        response
            .json::<IntrospectionResponse>()
            .await
            .map_err(|error| {
                AppError::Unauthorized(format!("malformed introspection response: {error}"))
            })?
            .into_claims()
    }
}
