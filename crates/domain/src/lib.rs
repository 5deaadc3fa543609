//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access_request;
mod change;
mod condition;
mod guard;
mod ttl;
mod update;

pub use access_request::{
    AccessRequest, AccessRequestInput, AccessRequestParts, MAX_DURATION_MINUTES, RecordKey,
    RequestStatus, RequestTime, promote, storage_precision,
};
pub use change::{ChangeEventType, ChangeRecord, RecordImage};
pub use condition::{Attribute, AttributeCondition, AttributeValue, Comparison, Condition};
pub use guard::{DELETABLE_STATUSES, ReviewRejection, delete_guard, review_guard, ttl_attach_guard};
pub use ttl::{
    BASE_ATTRIBUTE, DEFAULT_RETENTION_DAYS, SECONDS_PER_DAY, TTL_ATTRIBUTE, base_epoch_seconds,
    compute_ttl, parse_timestamp_epoch,
};
pub use update::RecordUpdate;
