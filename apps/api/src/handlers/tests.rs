use std::sync::Arc;

use async_trait::async_trait;
use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{Duration, TimeZone, Utc};
use elevate_application::{
    AccessPolicyConfig, AccessRequestService, ChangeFeedProcessor, ClaimsVerifier,
    FederationService, ManualClock, NotificationDispatcher, NotificationSettings,
    SigninFederation, TemporaryCredentials, TtlAssignmentService,
};
use elevate_core::{AppError, AppResult, CallerClaims};
use elevate_infrastructure::{
    ConsoleNotificationChannel, InMemoryAccessRequestStore, StaticCredentialIssuer,
};

use crate::dto::{
    AccessRequestResponse, CreateAccessRequestRequest, FederationQuery, RecordKeyRequest,
};
use crate::state::AppState;

use super::{
    approve_access_request_handler, create_access_request_handler, delete_access_request_handler,
    federate_cli_handler, federate_console_handler, health_handler, list_pending_requests_handler,
};

struct RejectingVerifier;

#[async_trait]
impl ClaimsVerifier for RejectingVerifier {
    async fn verify(&self, _bearer_token: &str) -> AppResult<CallerClaims> {
        Err(AppError::Unauthorized("token is not active".to_owned()))
    }
}

struct FixedSignin;

#[async_trait]
impl SigninFederation for FixedSignin {
    async fn signin_url(&self, credentials: &TemporaryCredentials) -> AppResult<String> {
        Ok(format!(
            "https://signin.example.com/federation?Action=login&SigninToken={}",
            credentials.access_key_id
        ))
    }
}

struct Harness {
    state: AppState,
    clock: Arc<ManualClock>,
    processor: ChangeFeedProcessor,
}

fn harness() -> Harness {
    let now = Utc
        .timestamp_opt(1_700_000_000, 0)
        .single()
        .unwrap_or_else(|| unreachable!());
    let clock = Arc::new(ManualClock::new(now));
    let store = Arc::new(InMemoryAccessRequestStore::new());
    let policy =
        AccessPolicyConfig::new("reviewers", "auditors").unwrap_or_else(|_| unreachable!());

    let state = AppState {
        access_request_service: AccessRequestService::new(
            store.clone(),
            clock.clone(),
            policy.clone(),
        ),
        federation_service: FederationService::new(
            store.clone(),
            clock.clone(),
            Arc::new(StaticCredentialIssuer::new(clock.clone(), Duration::hours(1))),
            Arc::new(FixedSignin),
            policy.clone(),
        ),
        claims_verifier: Arc::new(RejectingVerifier),
        store: store.clone(),
    };
    let processor = ChangeFeedProcessor::new(
        store.clone(),
        TtlAssignmentService::new(store, policy),
        NotificationDispatcher::new(
            Arc::new(ConsoleNotificationChannel::new()),
            NotificationSettings {
                reviewer_recipient: "reviewers@example.com".to_owned(),
                dashboard_url: "https://elevate.example.com".to_owned(),
            },
        ),
        10,
    );

    Harness {
        state,
        clock,
        processor,
    }
}

fn alice() -> CallerClaims {
    CallerClaims::new(
        "alice",
        Some("alice@example.com".to_owned()),
        vec!["elevate-111-admin".to_owned()],
    )
}

fn alice_as_reviewer() -> CallerClaims {
    CallerClaims::new(
        "alice",
        None,
        vec!["elevate-111-admin".to_owned(), "reviewers".to_owned()],
    )
}

fn bob() -> CallerClaims {
    CallerClaims::new("bob", None, vec!["reviewers".to_owned()])
}

fn status_of<T: IntoResponse>(result: crate::error::ApiResult<T>) -> StatusCode {
    match result {
        Ok(response) => response.into_response().status(),
        Err(error) => error.into_response().status(),
    }
}

fn key_of(record: &AccessRequestResponse) -> RecordKeyRequest {
    RecordKeyRequest {
        id: record.id.clone(),
        request_time: record.request_time.clone(),
    }
}

fn federation_query() -> Query<FederationQuery> {
    Query(FederationQuery {
        account: "111".to_owned(),
        role: "admin".to_owned(),
    })
}

impl Harness {
    async fn create_reviewable(&self) -> AccessRequestResponse {
        let created = create_access_request_handler(
            State(self.state.clone()),
            Extension(alice()),
            Json(CreateAccessRequestRequest {
                account: "111".to_owned(),
                role: "admin".to_owned(),
                duration_minutes: 60,
                justification: "incident 42".to_owned(),
            }),
        )
        .await;
        let Ok((status, Json(created))) = created else {
            panic!("create should succeed");
        };
        assert_eq!(status, StatusCode::CREATED);
        assert!(self.processor.run_once().await.is_ok());
        created
    }
}

#[tokio::test]
async fn request_review_and_cli_federation_flow() {
    let harness = harness();
    let created = harness.create_reviewable().await;
    assert_eq!(created.status, "requested");

    let pending =
        list_pending_requests_handler(State(harness.state.clone()), Extension(bob())).await;
    assert!(matches!(&pending, Ok(Json(records)) if records.len() == 1));

    let self_review = approve_access_request_handler(
        State(harness.state.clone()),
        Extension(alice_as_reviewer()),
        Json(key_of(&created)),
    )
    .await;
    assert_eq!(status_of(self_review), StatusCode::CONFLICT);

    let approved = approve_access_request_handler(
        State(harness.state.clone()),
        Extension(bob()),
        Json(key_of(&created)),
    )
    .await;
    assert!(matches!(&approved, Ok(Json(record)) if record.status == "approved"));

    harness.clock.advance(Duration::minutes(30));
    let credentials =
        federate_cli_handler(State(harness.state.clone()), Extension(alice()), federation_query())
            .await;
    assert!(matches!(&credentials, Ok(Json(body)) if body.access_key_id == "STATIC111"));

    harness.clock.advance(Duration::minutes(31));
    let expired =
        federate_cli_handler(State(harness.state.clone()), Extension(alice()), federation_query())
            .await;
    assert_eq!(status_of(expired), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn console_federation_returns_signin_url() {
    let harness = harness();
    let created = harness.create_reviewable().await;
    let approved = approve_access_request_handler(
        State(harness.state.clone()),
        Extension(bob()),
        Json(key_of(&created)),
    )
    .await;
    assert!(approved.is_ok());

    let signin = federate_console_handler(
        State(harness.state.clone()),
        Extension(alice()),
        federation_query(),
    )
    .await;

    assert!(matches!(&signin, Ok(Json(body))
        if body.signin_url.ends_with("SigninToken=STATIC111")));
}

#[tokio::test]
async fn federation_without_group_is_unauthorized() {
    let harness = harness();

    let denied =
        federate_cli_handler(State(harness.state.clone()), Extension(bob()), federation_query())
            .await;

    assert_eq!(status_of(denied), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn delete_requires_owner_and_pending_status() {
    let harness = harness();
    let created = harness.create_reviewable().await;

    let foreign = delete_access_request_handler(
        State(harness.state.clone()),
        Extension(bob()),
        Query(key_of(&created)),
    )
    .await;
    let own = delete_access_request_handler(
        State(harness.state.clone()),
        Extension(alice()),
        Query(key_of(&created)),
    )
    .await;

    assert_eq!(status_of(foreign), StatusCode::CONFLICT);
    assert!(matches!(own, Ok(StatusCode::NO_CONTENT)));
}

#[tokio::test]
async fn malformed_key_is_a_bad_request() {
    let harness = harness();

    let result = approve_access_request_handler(
        State(harness.state.clone()),
        Extension(bob()),
        Json(RecordKeyRequest {
            id: "alice#111#admin#whenever".to_owned(),
            request_time: "yesterday".to_owned(),
        }),
    )
    .await;

    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_rejects_out_of_range_duration() {
    let harness = harness();

    let result = create_access_request_handler(
        State(harness.state.clone()),
        Extension(alice()),
        Json(CreateAccessRequestRequest {
            account: "111".to_owned(),
            role: "admin".to_owned(),
            duration_minutes: 721,
            justification: "too long".to_owned(),
        }),
    )
    .await;

    assert_eq!(status_of(result), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_reachable_store() {
    let harness = harness();

    let (status, Json(body)) = health_handler(State(harness.state.clone())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.store, "ok");
}

#[tokio::test]
async fn claims_verifier_rejection_surfaces_as_unauthorized() {
    let harness = harness();

    let result = harness.state.claims_verifier.verify("opaque").await;

    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}
