use std::sync::Arc;

use elevate_core::{AppError, AppResult};
use elevate_domain::{
    ChangeEventType, ChangeRecord, RecordKey, RecordUpdate, base_epoch_seconds, compute_ttl,
    ttl_attach_guard,
};
use tracing::{debug, info, warn};

use crate::access_policy_config::AccessPolicyConfig;
use crate::access_request_ports::{AccessRequestStore, ConditionalWrite};

/// What the ttl trigger did with one change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TtlOutcome {
    /// A ttl was attached.
    Attached {
        /// Key of the updated record.
        key: RecordKey,
        /// Attached ttl in epoch seconds.
        ttl: i64,
    },
    /// The record already carries a ttl.
    AlreadyPresent,
    /// The record was reviewed, promoted, or deleted before the trigger reached it.
    Superseded,
    /// Not an insert.
    Ignored,
    /// The image could not yield a ttl; the event is dropped.
    Dropped {
        /// Log reason.
        reason: String,
    },
}

/// Attaches the unreviewed-request ttl to newly inserted records.
#[derive(Clone)]
pub struct TtlAssignmentService {
    store: Arc<dyn AccessRequestStore>,
    retention_days: u32,
}

impl TtlAssignmentService {
    /// Creates a ttl assignment service using the policy's retention.
    #[must_use]
    pub fn new(store: Arc<dyn AccessRequestStore>, config: AccessPolicyConfig) -> Self {
        Self {
            store,
            retention_days: config.retention_days(),
        }
    }

    /// Creates a ttl assignment service from a retention window alone.
    pub fn with_retention_days(
        store: Arc<dyn AccessRequestStore>,
        retention_days: u32,
    ) -> AppResult<Self> {
        if retention_days == 0 {
            return Err(AppError::Validation(
                "retention days must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            store,
            retention_days,
        })
    }

    /// Processes one change record.
    ///
    /// Malformed images are logged and dropped. Store failures are returned so the feed
    /// redelivers the record.
    pub async fn process(&self, change: &ChangeRecord) -> AppResult<TtlOutcome> {
        if change.event_type != ChangeEventType::Insert {
            return Ok(TtlOutcome::Ignored);
        }

        let Some(image) = change.after.as_ref() else {
            return Ok(dropped(change.sequence, "insert without a new image".to_owned()));
        };
        if image.has_ttl() {
            debug!(sequence = change.sequence, "ttl already present");
            return Ok(TtlOutcome::AlreadyPresent);
        }

        let base = match base_epoch_seconds(image.attributes()) {
            Ok(base) => base,
            Err(error @ (AppError::MissingBaseAttribute(_) | AppError::UnparsableTimestamp(_))) => {
                return Ok(dropped(change.sequence, error.to_string()));
            }
            Err(error) => return Err(error),
        };
        let key = match image.key() {
            Ok(key) => key,
            Err(error) => return Ok(dropped(change.sequence, error.to_string())),
        };
        let ttl = compute_ttl(base, self.retention_days);

        match self
            .store
            .update_if(&key, &RecordUpdate::AttachTtl { ttl }, &ttl_attach_guard())
            .await?
        {
            ConditionalWrite::Applied(_) => {
                info!(request_id = %key.id, ttl, "ttl attached");
                Ok(TtlOutcome::Attached { key, ttl })
            }
            ConditionalWrite::ConditionFailed { current } => {
                match current.as_ref().and_then(|record| record.ttl()) {
                    Some(existing) => {
                        debug!(request_id = %key.id, ttl = existing, "ttl already present");
                        Ok(TtlOutcome::AlreadyPresent)
                    }
                    None => {
                        info!(
                            request_id = %key.id,
                            exists = current.is_some(),
                            "record changed before ttl could be attached"
                        );
                        Ok(TtlOutcome::Superseded)
                    }
                }
            }
        }
    }
}

fn dropped(sequence: i64, reason: String) -> TtlOutcome {
    warn!(sequence, reason = %reason, "dropping change record without ttl");
    TtlOutcome::Dropped { reason }
}
