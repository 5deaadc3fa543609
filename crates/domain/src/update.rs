//! Field changes applied by conditional updates.

use chrono::{DateTime, Utc};
use elevate_core::AppResult;
use serde::{Deserialize, Serialize};

use crate::access_request::AccessRequest;

/// Field changes a conditional update applies to a stored request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordUpdate {
    /// Approve: sets reviewer, review time, and expiration, and drops the ttl.
    Approve {
        /// Reviewer subject.
        reviewer: String,
        /// Decision time.
        review_time: DateTime<Utc>,
    },
    /// Reject: sets reviewer and review time, and drops the ttl.
    Reject {
        /// Reviewer subject.
        reviewer: String,
        /// Decision time.
        review_time: DateTime<Utc>,
    },
    /// Stamps the unreviewed-request expiry marker.
    AttachTtl {
        /// Epoch seconds.
        ttl: i64,
    },
}

impl RecordUpdate {
    /// Returns the record after this update.
    ///
    /// Expiration is derived from the stored `duration_minutes`, never from caller input.
    pub fn apply(&self, current: &AccessRequest) -> AppResult<AccessRequest> {
        match self {
            Self::Approve {
                reviewer,
                review_time,
            } => current.approve(reviewer, *review_time),
            Self::Reject {
                reviewer,
                review_time,
            } => current.reject(reviewer, *review_time),
            Self::AttachTtl { ttl } => current.with_ttl(*ttl),
        }
    }

    /// Returns a short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::AttachTtl { .. } => "attach_ttl",
        }
    }
}
