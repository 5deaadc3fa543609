use chrono::{DateTime, Utc};
use elevate_domain::storage_precision;

#[cfg(any(test, feature = "test-support"))]
mod manual;

#[cfg(any(test, feature = "test-support"))]
pub use manual::ManualClock;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock, truncated to stored precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        storage_precision(Utc::now())
    }
}
