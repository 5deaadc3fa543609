use std::sync::Arc;

use elevate_application::{
    AccessRequestService, AccessRequestStore, ClaimsVerifier, FederationService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub access_request_service: AccessRequestService,
    pub federation_service: FederationService,
    pub claims_verifier: Arc<dyn ClaimsVerifier>,
    pub store: Arc<dyn AccessRequestStore>,
}
