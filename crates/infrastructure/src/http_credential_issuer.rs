use async_trait::async_trait;
use elevate_application::{CredentialIssuer, TemporaryCredentials};
use elevate_core::{AppError, AppResult};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Serialize)]
struct AssumeRoleRequest<'a> {
    account: &'a str,
    role: &'a str,
    session_name: &'a str,
}

/// Credential issuer calling a credential broker over HTTP.
///
/// The broker receives `{account, role, session_name}` and answers with the
/// serialized [`TemporaryCredentials`].
pub struct HttpCredentialIssuer {
    http_client: reqwest::Client,
    broker_url: String,
}

impl HttpCredentialIssuer {
    /// Creates an issuer posting to `broker_url`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, broker_url: impl Into<String>) -> Self {
        Self {
            http_client,
            broker_url: broker_url.into(),
        }
    }
}

#[async_trait]
impl CredentialIssuer for HttpCredentialIssuer {
    async fn assume_role(
        &self,
        account: &str,
        role: &str,
        session_name: &str,
    ) -> AppResult<TemporaryCredentials> {
        let response = self
            .http_client
            .post(self.broker_url.as_str())
            .json(&AssumeRoleRequest {
                account,
                role,
                session_name,
            })
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("credential broker transport error: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_owned());
            warn!(%status, account, role, "credential broker refused role assumption");
            return Err(AppError::Internal(format!(
                "credential broker failed with status {status}: {body}"
            )));
        }

        let credentials = response
            .json::<TemporaryCredentials>()
            .await
            .map_err(|error| {
                AppError::Internal(format!("invalid credential broker response: {error}"))
            })?;

        info!(
            account,
            role,
            session_name,
            expiration = %credentials.expiration,
            "assumed role through credential broker"
        );

        Ok(credentials)
    }
}
