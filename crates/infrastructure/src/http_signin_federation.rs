use async_trait::async_trait;
use elevate_application::{SigninFederation, TemporaryCredentials};
use elevate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FederationSession<'a> {
    session_id: &'a str,
    session_key: &'a str,
    session_token: &'a str,
}

#[derive(Deserialize)]
struct SigninTokenResponse {
    #[serde(rename = "SigninToken")]
    signin_token: String,
}

/// Console sign-in federation using the `getSigninToken` and `login` actions.
pub struct HttpSigninFederation {
    http_client: reqwest::Client,
    federation_endpoint: Url,
    destination: Url,
}

impl HttpSigninFederation {
    /// Creates a federation client for `federation_endpoint` landing on `destination`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, federation_endpoint: Url, destination: Url) -> Self {
        Self {
            http_client,
            federation_endpoint,
            destination,
        }
    }

    fn login_url(&self, signin_token: &str) -> Url {
        let mut url = self.federation_endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("Action", "login")
            .append_pair("Issuer", "")
            .append_pair("Destination", self.destination.as_str())
            .append_pair("SigninToken", signin_token);
        url
    }
}

#[async_trait]
impl SigninFederation for HttpSigninFederation {
    async fn signin_url(&self, credentials: &TemporaryCredentials) -> AppResult<String> {
        let session = serde_json::to_string(&FederationSession {
            session_id: credentials.access_key_id.as_str(),
            session_key: credentials.secret_access_key.as_str(),
            session_token: credentials.session_token.as_str(),
        })
        .map_err(|error| {
            AppError::Internal(format!("failed to encode federation session: {error}"))
        })?;

        let response = self
            .http_client
            .get(self.federation_endpoint.clone())
            .query(&[("Action", "getSigninToken"), ("Session", session.as_str())])
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("federation endpoint transport error: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Internal(format!(
                "federation endpoint failed with status {status}"
            )));
        }

        let token = response
            .json::<SigninTokenResponse>()
            .await
            .map_err(|error| {
                AppError::Internal(format!("invalid getSigninToken response: {error}"))
            })?;

        Ok(self.login_url(token.signin_token.as_str()).into())
    }
}
