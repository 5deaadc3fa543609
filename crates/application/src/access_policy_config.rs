use elevate_core::{AppError, AppResult};
use elevate_domain::DEFAULT_RETENTION_DAYS;

/// Default prefix of federation group names.
pub const DEFAULT_FEDERATION_GROUP_PREFIX: &str = "elevate-";

/// Default separator between account and role in federation group names.
pub const DEFAULT_FEDERATION_GROUP_SEPARATOR: &str = "-";

/// Default number of records fetched per store page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Access policy shared by all services, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicyConfig {
    reviewer_group: String,
    auditor_group: String,
    federation_group_prefix: String,
    federation_group_separator: String,
    retention_days: u32,
    page_size: usize,
}

impl AccessPolicyConfig {
    /// Creates a policy with default federation naming, retention, and paging.
    pub fn new(
        reviewer_group: impl Into<String>,
        auditor_group: impl Into<String>,
    ) -> AppResult<Self> {
        let reviewer_group = reviewer_group.into();
        let auditor_group = auditor_group.into();
        if reviewer_group.trim().is_empty() {
            return Err(AppError::Validation(
                "reviewer group must not be empty".to_owned(),
            ));
        }
        if auditor_group.trim().is_empty() {
            return Err(AppError::Validation(
                "auditor group must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            reviewer_group,
            auditor_group,
            federation_group_prefix: DEFAULT_FEDERATION_GROUP_PREFIX.to_owned(),
            federation_group_separator: DEFAULT_FEDERATION_GROUP_SEPARATOR.to_owned(),
            retention_days: DEFAULT_RETENTION_DAYS,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Overrides the federation group naming.
    pub fn with_federation_groups(
        mut self,
        prefix: impl Into<String>,
        separator: impl Into<String>,
    ) -> AppResult<Self> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(AppError::Validation(
                "federation group separator must not be empty".to_owned(),
            ));
        }

        self.federation_group_prefix = prefix.into();
        self.federation_group_separator = separator;
        Ok(self)
    }

    /// Overrides how long an unreviewed request stays reviewable.
    pub fn with_retention_days(mut self, retention_days: u32) -> AppResult<Self> {
        if retention_days == 0 {
            return Err(AppError::Validation(
                "retention days must be greater than zero".to_owned(),
            ));
        }

        self.retention_days = retention_days;
        Ok(self)
    }

    /// Overrides the store page size used when draining listings.
    pub fn with_page_size(mut self, page_size: usize) -> AppResult<Self> {
        if page_size == 0 {
            return Err(AppError::Validation(
                "page size must be greater than zero".to_owned(),
            ));
        }

        self.page_size = page_size;
        Ok(self)
    }

    /// Group whose members may approve and reject.
    #[must_use]
    pub fn reviewer_group(&self) -> &str {
        self.reviewer_group.as_str()
    }

    /// Group whose members may list every request.
    #[must_use]
    pub fn auditor_group(&self) -> &str {
        self.auditor_group.as_str()
    }

    /// Retention window for unreviewed requests, in days.
    #[must_use]
    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Store page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the group a caller must hold to federate into `role` in `account`.
    #[must_use]
    pub fn federation_group(&self, account: &str, role: &str) -> String {
        format!(
            "{}{account}{}{role}",
            self.federation_group_prefix, self.federation_group_separator
        )
    }
}
