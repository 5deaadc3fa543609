mod credential_issuer;
mod signin_federation;

pub use credential_issuer::{CredentialIssuer, TemporaryCredentials};
pub use signin_federation::SigninFederation;
