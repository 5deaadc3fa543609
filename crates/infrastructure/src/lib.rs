//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_notification_channel;
mod http_credential_issuer;
mod http_introspection_claims_verifier;
mod http_signin_federation;
mod in_memory_access_request_store;
mod postgres_access_request_store;
mod smtp_notification_channel;
mod static_credential_issuer;

pub use console_notification_channel::ConsoleNotificationChannel;
pub use http_credential_issuer::HttpCredentialIssuer;
pub use http_introspection_claims_verifier::HttpIntrospectionClaimsVerifier;
pub use http_signin_federation::HttpSigninFederation;
pub use in_memory_access_request_store::InMemoryAccessRequestStore;
pub use postgres_access_request_store::PostgresAccessRequestStore;
pub use smtp_notification_channel::{SmtpNotificationChannel, SmtpNotificationConfig};
pub use static_credential_issuer::StaticCredentialIssuer;
