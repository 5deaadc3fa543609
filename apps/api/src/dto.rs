use chrono::{DateTime, Utc};
use elevate_application::TemporaryCredentials;
use elevate_core::AppResult;
use elevate_domain::{AccessRequest, AccessRequestInput, RecordKey, RequestTime};
use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
}

/// Incoming payload for request creation.
#[derive(Debug, Deserialize)]
pub struct CreateAccessRequestRequest {
    pub account: String,
    pub role: String,
    pub duration_minutes: u32,
    pub justification: String,
}

impl From<CreateAccessRequestRequest> for AccessRequestInput {
    fn from(value: CreateAccessRequestRequest) -> Self {
        Self {
            account: value.account,
            role: value.role,
            duration_minutes: value.duration_minutes,
            justification: value.justification,
        }
    }
}

/// Composite key of the request to review or delete.
#[derive(Debug, Deserialize)]
pub struct RecordKeyRequest {
    pub id: String,
    pub request_time: String,
}

impl RecordKeyRequest {
    pub fn into_key(self) -> AppResult<RecordKey> {
        Ok(RecordKey {
            request_time: RequestTime::parse(self.request_time.as_str())?,
            id: self.id,
        })
    }
}

/// API representation of an access request.
#[derive(Debug, Serialize)]
pub struct AccessRequestResponse {
    pub id: String,
    pub request_time: String,
    pub requester: String,
    pub account: String,
    pub role: String,
    pub duration_minutes: u32,
    pub justification: String,
    pub status: &'static str,
    pub expiration_time: Option<DateTime<Utc>>,
    pub review_time: Option<DateTime<Utc>>,
    pub reviewer: Option<String>,
    pub ttl: Option<i64>,
}

impl From<AccessRequest> for AccessRequestResponse {
    fn from(value: AccessRequest) -> Self {
        Self {
            id: value.id().to_owned(),
            request_time: value.request_time().to_key_string(),
            requester: value.requester().to_owned(),
            account: value.account().to_owned(),
            role: value.role().to_owned(),
            duration_minutes: value.duration_minutes(),
            justification: value.justification().to_owned(),
            status: value.status().as_str(),
            expiration_time: value.expiration_time(),
            review_time: value.review_time(),
            reviewer: value.reviewer().map(str::to_owned),
            ttl: value.ttl(),
        }
    }
}

/// Target of a federation call.
#[derive(Debug, Deserialize)]
pub struct FederationQuery {
    pub account: String,
    pub role: String,
}

/// Temporary credentials for command-line use.
#[derive(Serialize)]
pub struct CliCredentialsResponse {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl From<TemporaryCredentials> for CliCredentialsResponse {
    fn from(value: TemporaryCredentials) -> Self {
        Self {
            access_key_id: value.access_key_id,
            secret_access_key: value.secret_access_key,
            session_token: value.session_token,
            expiration: value.expiration,
        }
    }
}

/// Single-use console sign-in link.
#[derive(Debug, Serialize)]
pub struct ConsoleSigninResponse {
    pub signin_url: String,
}
