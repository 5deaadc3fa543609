//! Shared primitives for all Rust crates in Elevate.

#![forbid(unsafe_code)]

/// Caller identity primitives shared across services.
pub mod auth;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::CallerClaims;

/// Result type used across Elevate crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Creates a validated non-empty string, naming the field in the error.
    pub fn for_field(field: &str, value: impl Into<String>) -> AppResult<Self> {
        Self::new(value)
            .map_err(|_| AppError::Validation(format!("{field} must not be empty or whitespace")))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller is not authenticated or lacks a required claim or group.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Review transition rejected by the store guard.
    ///
    /// The message never says which part of the guard failed.
    #[error("review conflict: {0}")]
    ReviewConflict(String),

    /// Create rejected because a request already exists under the same key.
    #[error("duplicate request: {0}")]
    DuplicateRequest(String),

    /// Delete rejected because the caller does not own the request or its status forbids it.
    #[error("delete conflict: {0}")]
    DeleteConflict(String),

    /// Federation requested without an active approved request.
    #[error("no active grant: {0}")]
    NoActiveGrant(String),

    /// Change record is missing the attribute a TTL is derived from.
    #[error("missing base attribute: {0}")]
    MissingBaseAttribute(String),

    /// Base attribute could not be parsed as a timestamp.
    #[error("unparsable timestamp: {0}")]
    UnparsableTimestamp(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backing store failed; callers may retry.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true when the caller can safely retry the same operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
