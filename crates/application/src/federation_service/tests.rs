use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use elevate_core::{AppError, AppResult, CallerClaims};
use elevate_domain::{AccessRequest, AccessRequestInput};
use tokio::sync::Mutex;

use crate::access_policy_config::AccessPolicyConfig;
use crate::access_request_ports::AccessRequestStore;
use crate::clock::ManualClock;
use crate::federation_ports::{CredentialIssuer, SigninFederation, TemporaryCredentials};
use crate::test_support::{FakeStore, T0, alice, at};

use super::FederationService;

#[derive(Default)]
struct FakeIssuer {
    calls: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl CredentialIssuer for FakeIssuer {
    async fn assume_role(
        &self,
        account: &str,
        role: &str,
        session_name: &str,
    ) -> AppResult<TemporaryCredentials> {
        self.calls.lock().await.push((
            account.to_owned(),
            role.to_owned(),
            session_name.to_owned(),
        ));
        Ok(TemporaryCredentials {
            access_key_id: "ASIAEXAMPLE".to_owned(),
            secret_access_key: "secret".to_owned(),
            session_token: "token".to_owned(),
            expiration: at(T0 + 3_600),
        })
    }
}

struct FakeSignin;

#[async_trait]
impl SigninFederation for FakeSignin {
    async fn signin_url(&self, credentials: &TemporaryCredentials) -> AppResult<String> {
        Ok(format!(
            "https://signin.example.com/federation?Action=login&SigninToken={}",
            credentials.access_key_id
        ))
    }
}

struct Harness {
    service: FederationService,
    store: Arc<FakeStore>,
    clock: Arc<ManualClock>,
    issuer: Arc<FakeIssuer>,
}

fn harness() -> Harness {
    let store = Arc::new(FakeStore::default());
    let clock = Arc::new(ManualClock::new(at(T0)));
    let issuer = Arc::new(FakeIssuer::default());
    let config =
        AccessPolicyConfig::new("reviewers", "auditors").unwrap_or_else(|_| unreachable!());

    Harness {
        service: FederationService::new(
            store.clone(),
            clock.clone(),
            issuer.clone(),
            Arc::new(FakeSignin),
            config,
        ),
        store,
        clock,
        issuer,
    }
}

/// Stores alice's request for 111/admin approved by bob at `T0 + 300`.
async fn approved_grant(store: &FakeStore) -> AccessRequest {
    let approved = AccessRequest::new_request(
        "alice",
        None,
        AccessRequestInput {
            account: "111".to_owned(),
            role: "admin".to_owned(),
            duration_minutes: 60,
            justification: "incident 42".to_owned(),
        },
        at(T0),
    )
    .and_then(|record| record.with_ttl(T0 + 86_400))
    .and_then(|record| record.approve("bob", at(T0 + 300)))
    .unwrap_or_else(|_| unreachable!());
    store
        .put(approved.clone())
        .await
        .unwrap_or_else(|_| unreachable!());
    approved
}

#[tokio::test]
async fn active_grant_yields_credentials_until_expiration() {
    let harness = harness();
    approved_grant(&harness.store).await;
    let t1 = at(T0 + 300);

    harness.clock.set(t1 + TimeDelta::minutes(30));
    let credentials = harness.service.federate_cli(&alice(), "111", "admin").await;
    assert!(matches!(credentials, Ok(credentials) if credentials.session_token == "token"));
    assert_eq!(
        harness.issuer.calls.lock().await.clone(),
        vec![(
            "111".to_owned(),
            "admin".to_owned(),
            "alice-admin".to_owned()
        )]
    );

    harness.clock.set(t1 + TimeDelta::minutes(61));
    let expired = harness.service.federate_cli(&alice(), "111", "admin").await;
    assert!(matches!(expired, Err(AppError::NoActiveGrant(_))));
}

#[tokio::test]
async fn grant_is_inactive_at_exact_expiration() {
    let harness = harness();
    let grant = approved_grant(&harness.store).await;
    let expiration = grant.expiration_time().unwrap_or_else(|| unreachable!());

    harness.clock.set(expiration);
    let result = harness.service.federate_cli(&alice(), "111", "admin").await;

    assert!(matches!(result, Err(AppError::NoActiveGrant(_))));
    assert!(harness.issuer.calls.lock().await.is_empty());
}

#[tokio::test]
async fn federation_group_must_match_account_and_role_exactly() {
    let harness = harness();
    approved_grant(&harness.store).await;
    harness.clock.set(at(T0 + 600));
    let lookalike = CallerClaims::new(
        "alice",
        None,
        vec!["elevate-1111-admin".to_owned(), "elevate-111-administrator".to_owned()],
    );

    let result = harness
        .service
        .federate_cli(&lookalike, "111", "admin")
        .await;

    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn other_callers_grants_do_not_count() {
    let harness = harness();
    approved_grant(&harness.store).await;
    harness.clock.set(at(T0 + 600));
    let dave = CallerClaims::new("dave", None, vec!["elevate-111-admin".to_owned()]);

    let result = harness.service.federate_cli(&dave, "111", "admin").await;

    assert!(matches!(result, Err(AppError::NoActiveGrant(_))));
}

#[tokio::test]
async fn console_federation_returns_signin_url_without_writing() {
    let harness = harness();
    approved_grant(&harness.store).await;
    let changes_before = harness.store.changes().await.len();
    harness.clock.set(at(T0 + 600));

    let url = harness
        .service
        .federate_console(&alice(), "111", "admin")
        .await;

    assert!(matches!(url, Ok(url) if url.ends_with("SigninToken=ASIAEXAMPLE")));
    assert_eq!(harness.store.changes().await.len(), changes_before);
}

#[tokio::test]
async fn blank_account_is_a_validation_error() {
    let harness = harness();

    let result = harness.service.federate_cli(&alice(), " ", "admin").await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}
