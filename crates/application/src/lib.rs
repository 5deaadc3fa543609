//! Application services and ports.

#![forbid(unsafe_code)]

mod access_policy_config;
mod access_request_ports;
mod access_request_service;
mod change_feed_processor;
mod claims_ports;
mod clock;
mod federation_ports;
mod federation_service;
mod notification_dispatcher;
mod notification_ports;
mod paging;
mod ttl_assignment_service;

#[cfg(test)]
mod test_support;

pub use access_policy_config::{
    AccessPolicyConfig, DEFAULT_FEDERATION_GROUP_PREFIX, DEFAULT_FEDERATION_GROUP_SEPARATOR,
    DEFAULT_PAGE_SIZE,
};
pub use access_request_ports::{
    AccessRequestStore, ChangeFeed, ConditionalWrite, PageRequest, RecordPage,
};
pub use access_request_service::AccessRequestService;
pub use change_feed_processor::{
    ChangeFeedProcessor, FEED_CONSUMERS, NOTIFICATION_CONSUMER, ProcessedCounts, TTL_CONSUMER,
};
pub use claims_ports::ClaimsVerifier;
pub use clock::{Clock, SystemClock};

#[cfg(any(test, feature = "test-support"))]
pub use clock::ManualClock;
pub use federation_ports::{CredentialIssuer, SigninFederation, TemporaryCredentials};
pub use federation_service::{FederationService, session_name};
pub use notification_dispatcher::{
    NotificationDispatcher, NotificationOutcome, NotificationSettings,
};
pub use notification_ports::{NotificationChannel, NotificationMessage};
pub use ttl_assignment_service::{TtlAssignmentService, TtlOutcome};
