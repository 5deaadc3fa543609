use std::sync::Arc;

use elevate_core::{AppError, AppResult, CallerClaims, NonEmptyString};
use elevate_domain::{AccessRequest, Attribute, RequestStatus, promote};
use tracing::{info, warn};

use crate::access_policy_config::AccessPolicyConfig;
use crate::access_request_ports::AccessRequestStore;
use crate::clock::Clock;
use crate::federation_ports::{CredentialIssuer, SigninFederation, TemporaryCredentials};
use crate::paging::{Listing, drain_listing};

mod session_name;

pub use session_name::session_name;

/// Credential federation gate: mints temporary credentials for an active approved grant.
///
/// The gate never writes to the store.
#[derive(Clone)]
pub struct FederationService {
    store: Arc<dyn AccessRequestStore>,
    clock: Arc<dyn Clock>,
    credential_issuer: Arc<dyn CredentialIssuer>,
    signin_federation: Arc<dyn SigninFederation>,
    config: AccessPolicyConfig,
}

impl FederationService {
    /// Creates a federation service.
    #[must_use]
    pub fn new(
        store: Arc<dyn AccessRequestStore>,
        clock: Arc<dyn Clock>,
        credential_issuer: Arc<dyn CredentialIssuer>,
        signin_federation: Arc<dyn SigninFederation>,
        config: AccessPolicyConfig,
    ) -> Self {
        Self {
            store,
            clock,
            credential_issuer,
            signin_federation,
            config,
        }
    }

    /// Returns temporary credentials for command-line use.
    pub async fn federate_cli(
        &self,
        actor: &CallerClaims,
        account: &str,
        role: &str,
    ) -> AppResult<TemporaryCredentials> {
        self.mint(actor, account, role).await
    }

    /// Returns a single-use console sign-in URL.
    pub async fn federate_console(
        &self,
        actor: &CallerClaims,
        account: &str,
        role: &str,
    ) -> AppResult<String> {
        let credentials = self.mint(actor, account, role).await?;
        self.signin_federation.signin_url(&credentials).await
    }

    async fn mint(
        &self,
        actor: &CallerClaims,
        account: &str,
        role: &str,
    ) -> AppResult<TemporaryCredentials> {
        let account = NonEmptyString::for_field("account", account.trim())?;
        let role = NonEmptyString::for_field("role", role.trim())?;

        let group = self
            .config
            .federation_group(account.as_str(), role.as_str());
        if !actor.is_member_of(group.as_str()) {
            warn!(
                subject = %actor.subject(),
                group = %group,
                "caller lacks federation group"
            );
            return Err(AppError::Unauthorized(format!(
                "caller is not entitled to role '{role}' in account '{account}'"
            )));
        }

        let grant = self
            .find_active_grant(actor.subject(), account.as_str(), role.as_str())
            .await?;
        let Some(grant) = grant else {
            info!(
                subject = %actor.subject(),
                account = %account,
                role = %role,
                "no active grant for federation"
            );
            return Err(AppError::NoActiveGrant(format!(
                "no active approved request for role '{role}' in account '{account}'"
            )));
        };

        let session_name = session_name(actor.subject(), role.as_str());
        let credentials = self
            .credential_issuer
            .assume_role(account.as_str(), role.as_str(), session_name.as_str())
            .await?;

        info!(
            request_id = %grant.id(),
            subject = %actor.subject(),
            session_name = %session_name,
            credential_expiration = %credentials.expiration,
            "temporary credentials issued"
        );

        Ok(credentials)
    }

    async fn find_active_grant(
        &self,
        requester: &str,
        account: &str,
        role: &str,
    ) -> AppResult<Option<AccessRequest>> {
        let now = self.clock.now();
        let filter = Attribute::Account
            .is()
            .eq(account)
            .and(Attribute::Role.is().eq(role))
            .and(Attribute::Requester.is().eq(requester))
            .and(Attribute::ExpirationTime.is().ge(now));

        let candidates = drain_listing(
            self.store.as_ref(),
            Listing::Status(RequestStatus::Approved),
            Some(&filter),
            self.config.page_size(),
        )
        .await?;

        Ok(candidates
            .into_iter()
            .map(|record| promote(record, now))
            .find(|record| record.is_active_grant(now)))
    }
}

#[cfg(test)]
mod tests;
