use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;

use elevate_core::CallerClaims;

use crate::dto::{
    AccessRequestResponse, CliCredentialsResponse, ConsoleSigninResponse,
    CreateAccessRequestRequest, FederationQuery, HealthResponse, RecordKeyRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod access_requests;
mod federation;
mod health;

pub use access_requests::{
    approve_access_request_handler, create_access_request_handler,
    delete_access_request_handler, list_all_requests_handler, list_my_requests_handler,
    list_pending_requests_handler, list_processed_requests_handler,
    reject_access_request_handler,
};
pub use federation::{federate_cli_handler, federate_console_handler};
pub use health::health_handler;

#[cfg(test)]
mod tests;
