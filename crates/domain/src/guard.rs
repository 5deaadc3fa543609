//! Conditions guarding review, delete, and ttl-attach writes.

use chrono::{DateTime, Utc};

use crate::access_request::{AccessRequest, RequestStatus};
use crate::condition::{Attribute, Condition};

/// Statuses a requester may delete.
pub const DELETABLE_STATUSES: [RequestStatus; 2] =
    [RequestStatus::Requested, RequestStatus::Expired];

/// Condition a review write must satisfy.
///
/// The reviewer must not be the requester and the ttl must not have elapsed. A missing
/// ttl fails the comparison, so a request the ttl trigger never reached cannot be reviewed.
#[must_use]
pub fn review_guard(reviewer: &str, now: DateTime<Utc>) -> Condition {
    Attribute::Requester
        .is()
        .ne(reviewer)
        .and(Attribute::Ttl.is().gt(now.timestamp()))
}

/// Condition a delete must satisfy: the caller owns the request and it is still deletable.
#[must_use]
pub fn delete_guard(caller: &str) -> Condition {
    Attribute::Requester
        .is()
        .eq(caller)
        .and(Attribute::Status.is().one_of(DELETABLE_STATUSES))
}

/// Condition the ttl trigger's write must satisfy.
///
/// Redelivered insert events must not resurrect a ttl on a request that was reviewed or
/// promoted in the meantime.
#[must_use]
pub fn ttl_attach_guard() -> Condition {
    Attribute::Status
        .is()
        .eq(RequestStatus::Requested)
        .and(Attribute::Ttl.is().absent())
        .and(Attribute::Reviewer.is().absent())
}

/// Reason a guarded review write was refused. Logged, never returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewRejection {
    /// No record under the key.
    Missing,
    /// Reviewer is the requester.
    SelfReview,
    /// Request is no longer awaiting review.
    NotPending,
    /// Ttl has elapsed.
    Expired,
    /// Ttl was never attached.
    MissingTtl,
}

impl ReviewRejection {
    /// Classifies why [`review_guard`] failed against the current record.
    #[must_use]
    pub fn diagnose(current: Option<&AccessRequest>, reviewer: &str, now: DateTime<Utc>) -> Self {
        let Some(current) = current else {
            return Self::Missing;
        };

        if current.requester() == reviewer {
            return Self::SelfReview;
        }
        if current.status() != RequestStatus::Requested {
            return Self::NotPending;
        }

        match current.ttl() {
            None => Self::MissingTtl,
            Some(ttl) if ttl <= now.timestamp() => Self::Expired,
            // Record changed between the refused write and this read.
            Some(_) => Self::NotPending,
        }
    }

    /// Returns a stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::SelfReview => "self_review",
            Self::NotPending => "not_pending",
            Self::Expired => "expired",
            Self::MissingTtl => "missing_ttl",
        }
    }
}
