use serde::{Deserialize, Serialize};

/// Verified claims of the caller, produced by the claims verifier before any service runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerClaims {
    subject: String,
    email: Option<String>,
    groups: Vec<String>,
}

impl CallerClaims {
    /// Creates caller claims from identity provider data.
    #[must_use]
    pub fn new(subject: impl Into<String>, email: Option<String>, groups: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            email,
            groups,
        }
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the email, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns all group memberships.
    #[must_use]
    pub fn groups(&self) -> &[String] {
        self.groups.as_slice()
    }

    /// Returns whether the caller belongs to the named group.
    #[must_use]
    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.iter().any(|candidate| candidate == group)
    }
}
