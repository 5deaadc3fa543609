use std::sync::Arc;

use elevate_core::{AppError, AppResult, CallerClaims};
use elevate_domain::{
    AccessRequest, AccessRequestInput, Attribute, RecordKey, RecordUpdate, RequestStatus,
    ReviewRejection, delete_guard, review_guard,
};
use tracing::{info, warn};

use crate::access_policy_config::AccessPolicyConfig;
use crate::access_request_ports::{AccessRequestStore, ConditionalWrite};
use crate::clock::Clock;
use crate::paging::{Listing, drain_listing};

mod create;
mod delete;
mod listing;
mod review;

/// Lifecycle engine for access requests: create, list, review, and delete.
#[derive(Clone)]
pub struct AccessRequestService {
    store: Arc<dyn AccessRequestStore>,
    clock: Arc<dyn Clock>,
    config: AccessPolicyConfig,
}

impl AccessRequestService {
    /// Creates an access request service.
    #[must_use]
    pub fn new(
        store: Arc<dyn AccessRequestStore>,
        clock: Arc<dyn Clock>,
        config: AccessPolicyConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Returns the policy this service enforces.
    #[must_use]
    pub fn config(&self) -> &AccessPolicyConfig {
        &self.config
    }

    fn require_group(&self, actor: &CallerClaims, group: &str, action: &str) -> AppResult<()> {
        if actor.is_member_of(group) {
            return Ok(());
        }

        warn!(
            subject = %actor.subject(),
            group,
            action,
            "caller lacks required group"
        );
        Err(AppError::Unauthorized(format!(
            "caller is not allowed to {action}"
        )))
    }
}
