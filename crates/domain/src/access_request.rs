//! Access request entity, lifecycle states, and read-time promotion.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeDelta, Utc};
use elevate_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Largest duration a requester may ask for, matching the maximum role session length.
pub const MAX_DURATION_MINUTES: u32 = 720;

const REQUEST_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const REQUEST_TIME_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Lifecycle status of an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting for a reviewer decision.
    Requested,
    /// Approved by a reviewer; credentials may be redeemed until expiration.
    Approved,
    /// Rejected by a reviewer.
    Rejected,
    /// Never reviewed before its ttl elapsed.
    Expired,
    /// Approved access whose expiration time has passed.
    Ended,
}

impl RequestStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Ended => "ended",
        }
    }

    /// Returns whether a reviewer has acted on a request in this status.
    #[must_use]
    pub fn is_reviewed(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Ended)
    }

    /// Returns whether the owning requester may delete a request in this status.
    #[must_use]
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Requested | Self::Expired)
    }
}

impl FromStr for RequestStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "requested" => Ok(Self::Requested),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            "ended" => Ok(Self::Ended),
            _ => Err(AppError::Validation(format!(
                "unknown request status '{value}'"
            ))),
        }
    }
}

impl Display for RequestStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Truncates a timestamp to the microsecond precision kept by the record store.
#[must_use]
pub fn storage_precision(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(6)
}

/// Creation timestamp of a request, also used as the record sort key.
///
/// Rendered as an ISO-8601 local timestamp in UTC with microsecond precision, so the
/// lexical order of the key equals chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RequestTime(DateTime<Utc>);

impl RequestTime {
    /// Creates a request time from a wall-clock instant.
    #[must_use]
    pub fn new(value: DateTime<Utc>) -> Self {
        Self(storage_precision(value))
    }

    /// Parses the sort key representation.
    pub fn parse(value: &str) -> AppResult<Self> {
        NaiveDateTime::parse_from_str(value, REQUEST_TIME_PARSE_FORMAT)
            .map(|parsed| Self::new(parsed.and_utc()))
            .map_err(|error| {
                AppError::Validation(format!("invalid request_time '{value}': {error}"))
            })
    }

    /// Returns the instant.
    #[must_use]
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Returns the sort key representation.
    #[must_use]
    pub fn to_key_string(&self) -> String {
        self.0.format(REQUEST_TIME_FORMAT).to_string()
    }
}

impl Display for RequestTime {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.to_key_string().as_str())
    }
}

impl From<RequestTime> for String {
    fn from(value: RequestTime) -> Self {
        value.to_key_string()
    }
}

impl TryFrom<String> for RequestTime {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

/// Composite primary key of an access request record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Deterministic request identifier.
    pub id: String,
    /// Creation timestamp sort key.
    pub request_time: RequestTime,
}

impl RecordKey {
    /// Derives the key of a request from its identifying payload.
    #[must_use]
    pub fn derive(requester: &str, account: &str, role: &str, request_time: RequestTime) -> Self {
        Self {
            id: format!("{requester}#{account}#{role}#{request_time}"),
            request_time,
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}@{}", self.id, self.request_time)
    }
}

/// Requester-supplied payload for a new access request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequestInput {
    /// Target cloud account identifier.
    pub account: String,
    /// Target role name inside the account.
    pub role: String,
    /// Requested access duration in minutes.
    pub duration_minutes: u32,
    /// Business justification shown to reviewers.
    pub justification: String,
}

/// Flat record shape used for storage rows and change-feed images.
///
/// Every conversion into [`AccessRequest`] goes through [`AccessRequest::from_parts`],
/// which enforces the status-dependent field presence rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequestParts {
    /// Deterministic request identifier.
    pub id: String,
    /// Creation timestamp sort key.
    pub request_time: String,
    /// Requester subject.
    pub requester: String,
    /// Requester email captured at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_email: Option<String>,
    /// Target account.
    pub account: String,
    /// Target role.
    pub role: String,
    /// Requested duration in minutes.
    pub duration_minutes: u32,
    /// Business justification.
    pub justification: String,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Approved access deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
    /// Reviewer decision time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_time: Option<DateTime<Utc>>,
    /// Reviewer subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    /// Unreviewed-request expiry marker in epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

/// A request for time-bounded elevated access to a role in an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "AccessRequestParts", try_from = "AccessRequestParts")]
pub struct AccessRequest {
    key: RecordKey,
    requester: NonEmptyString,
    requester_email: Option<String>,
    account: NonEmptyString,
    role: NonEmptyString,
    duration_minutes: u32,
    justification: NonEmptyString,
    status: RequestStatus,
    expiration_time: Option<DateTime<Utc>>,
    review_time: Option<DateTime<Utc>>,
    reviewer: Option<String>,
    ttl: Option<i64>,
}

impl AccessRequest {
    /// Creates a new request in the `Requested` state without a ttl.
    pub fn new_request(
        requester: &str,
        requester_email: Option<String>,
        input: AccessRequestInput,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let AccessRequestInput {
            account,
            role,
            duration_minutes,
            justification,
        } = input;

        let requester = NonEmptyString::for_field("requester", requester)?;
        let account = NonEmptyString::for_field("account", account.trim())?;
        let role = NonEmptyString::for_field("role", role.trim())?;
        let justification = NonEmptyString::for_field("justification", justification)?;
        validate_duration(duration_minutes)?;

        let key = RecordKey::derive(
            requester.as_str(),
            account.as_str(),
            role.as_str(),
            RequestTime::new(now),
        );

        Ok(Self {
            key,
            requester,
            requester_email: requester_email.filter(|email| !email.trim().is_empty()),
            account,
            role,
            duration_minutes,
            justification,
            status: RequestStatus::Requested,
            expiration_time: None,
            review_time: None,
            reviewer: None,
            ttl: None,
        })
    }

    /// Rebuilds a request from stored parts, enforcing every field-presence invariant.
    pub fn from_parts(parts: AccessRequestParts) -> AppResult<Self> {
        let AccessRequestParts {
            id,
            request_time,
            requester,
            requester_email,
            account,
            role,
            duration_minutes,
            justification,
            status,
            expiration_time,
            review_time,
            reviewer,
            ttl,
        } = parts;

        let request_time = RequestTime::parse(request_time.as_str())?;
        let requester = NonEmptyString::for_field("requester", requester)?;
        let account = NonEmptyString::for_field("account", account)?;
        let role = NonEmptyString::for_field("role", role)?;
        let justification = NonEmptyString::for_field("justification", justification)?;
        validate_duration(duration_minutes)?;

        let key = RecordKey::derive(
            requester.as_str(),
            account.as_str(),
            role.as_str(),
            request_time,
        );
        if key.id != id {
            return Err(AppError::Validation(format!(
                "request id '{id}' does not match its requester, account, role, and request_time"
            )));
        }

        let record = Self {
            key,
            requester,
            requester_email,
            account,
            role,
            duration_minutes,
            justification,
            status,
            expiration_time,
            review_time,
            reviewer,
            ttl,
        };
        record.check_lifecycle_fields()?;

        Ok(record)
    }

    /// Returns the flat record shape.
    #[must_use]
    pub fn to_parts(&self) -> AccessRequestParts {
        AccessRequestParts {
            id: self.key.id.clone(),
            request_time: self.key.request_time.to_key_string(),
            requester: self.requester.as_str().to_owned(),
            requester_email: self.requester_email.clone(),
            account: self.account.as_str().to_owned(),
            role: self.role.as_str().to_owned(),
            duration_minutes: self.duration_minutes,
            justification: self.justification.as_str().to_owned(),
            status: self.status,
            expiration_time: self.expiration_time,
            review_time: self.review_time,
            reviewer: self.reviewer.clone(),
            ttl: self.ttl,
        }
    }

    /// Returns the composite record key.
    #[must_use]
    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    /// Returns the deterministic request identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.key.id.as_str()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn request_time(&self) -> RequestTime {
        self.key.request_time
    }

    /// Returns the requester subject.
    #[must_use]
    pub fn requester(&self) -> &str {
        self.requester.as_str()
    }

    /// Returns the requester email captured at creation.
    #[must_use]
    pub fn requester_email(&self) -> Option<&str> {
        self.requester_email.as_deref()
    }

    /// Returns the target account.
    #[must_use]
    pub fn account(&self) -> &str {
        self.account.as_str()
    }

    /// Returns the target role.
    #[must_use]
    pub fn role(&self) -> &str {
        self.role.as_str()
    }

    /// Returns the requested duration in minutes.
    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Returns the business justification.
    #[must_use]
    pub fn justification(&self) -> &str {
        self.justification.as_str()
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Returns the approved access deadline.
    #[must_use]
    pub fn expiration_time(&self) -> Option<DateTime<Utc>> {
        self.expiration_time
    }

    /// Returns the reviewer decision time.
    #[must_use]
    pub fn review_time(&self) -> Option<DateTime<Utc>> {
        self.review_time
    }

    /// Returns the reviewer subject.
    #[must_use]
    pub fn reviewer(&self) -> Option<&str> {
        self.reviewer.as_deref()
    }

    /// Returns the ttl marker in epoch seconds.
    #[must_use]
    pub fn ttl(&self) -> Option<i64> {
        self.ttl
    }

    /// Returns the access deadline an approval at `review_time` produces.
    #[must_use]
    pub fn expiration_for(&self, review_time: DateTime<Utc>) -> DateTime<Utc> {
        storage_precision(review_time) + TimeDelta::minutes(i64::from(self.duration_minutes))
    }

    /// Returns the approved version of this request.
    pub fn approve(&self, reviewer: &str, review_time: DateTime<Utc>) -> AppResult<Self> {
        self.require_pending()?;
        let review_time = storage_precision(review_time);

        let mut parts = self.to_parts();
        parts.status = RequestStatus::Approved;
        parts.reviewer = Some(reviewer.to_owned());
        parts.review_time = Some(review_time);
        parts.expiration_time = Some(self.expiration_for(review_time));
        parts.ttl = None;

        Self::from_parts(parts)
    }

    /// Returns the rejected version of this request.
    pub fn reject(&self, reviewer: &str, review_time: DateTime<Utc>) -> AppResult<Self> {
        self.require_pending()?;

        let mut parts = self.to_parts();
        parts.status = RequestStatus::Rejected;
        parts.reviewer = Some(reviewer.to_owned());
        parts.review_time = Some(storage_precision(review_time));
        parts.ttl = None;

        Self::from_parts(parts)
    }

    /// Returns this request with a ttl marker attached.
    pub fn with_ttl(&self, ttl: i64) -> AppResult<Self> {
        let mut parts = self.to_parts();
        parts.ttl = Some(ttl);

        Self::from_parts(parts)
    }

    /// Returns the rewritten record when elapsed wall-clock time changes its status.
    ///
    /// `Requested` with an elapsed ttl becomes `Expired` and `Approved` past its
    /// expiration becomes `Ended`. Returns `None` when no rewrite is needed, which makes
    /// repeated application a no-op.
    #[must_use]
    pub fn promoted(&self, now: DateTime<Utc>) -> Option<Self> {
        match self.status {
            RequestStatus::Requested => {
                let ttl = self.ttl?;
                (ttl <= now.timestamp()).then(|| Self {
                    status: RequestStatus::Expired,
                    ttl: None,
                    ..self.clone()
                })
            }
            RequestStatus::Approved => {
                let expiration_time = self.expiration_time?;
                (expiration_time <= now).then(|| Self {
                    status: RequestStatus::Ended,
                    ..self.clone()
                })
            }
            RequestStatus::Rejected | RequestStatus::Expired | RequestStatus::Ended => None,
        }
    }

    /// Returns whether this request currently grants access.
    #[must_use]
    pub fn is_active_grant(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Approved
            && self
                .expiration_time
                .is_some_and(|expiration_time| expiration_time > now)
    }

    fn require_pending(&self) -> AppResult<()> {
        if self.status != RequestStatus::Requested {
            return Err(AppError::Validation(format!(
                "request '{}' is '{}' and cannot be reviewed",
                self.key.id, self.status
            )));
        }

        Ok(())
    }

    fn check_lifecycle_fields(&self) -> AppResult<()> {
        let status = self.status;
        let violation = |detail: &str| {
            Err(AppError::Validation(format!(
                "request '{}' in status '{status}' {detail}",
                self.key.id
            )))
        };

        if self.ttl.is_some() && status != RequestStatus::Requested {
            return violation("must not carry a ttl");
        }

        if status.is_reviewed() {
            let Some(reviewer) = self.reviewer.as_deref() else {
                return violation("requires a reviewer");
            };
            if reviewer.trim().is_empty() {
                return violation("requires a non-empty reviewer");
            }
            if reviewer == self.requester.as_str() {
                return violation("must not be reviewed by its requester");
            }
            if self.review_time.is_none() {
                return violation("requires a review_time");
            }
        } else if self.reviewer.is_some() || self.review_time.is_some() {
            return violation("must not carry review fields");
        }

        match (status, self.expiration_time, self.review_time) {
            (
                RequestStatus::Approved | RequestStatus::Ended,
                Some(expiration_time),
                Some(review_time),
            ) => {
                if expiration_time != self.expiration_for(review_time) {
                    return violation("must expire exactly duration_minutes after review_time");
                }
            }
            (RequestStatus::Approved | RequestStatus::Ended, _, _) => {
                return violation("requires an expiration_time");
            }
            (_, Some(_), _) => return violation("must not carry an expiration_time"),
            _ => {}
        }

        Ok(())
    }
}

impl From<AccessRequest> for AccessRequestParts {
    fn from(value: AccessRequest) -> Self {
        value.to_parts()
    }
}

impl TryFrom<AccessRequestParts> for AccessRequest {
    type Error = AppError;

    fn try_from(value: AccessRequestParts) -> Result<Self, Self::Error> {
        Self::from_parts(value)
    }
}

/// Applies read-time promotion, returning the record every read path must hand out.
#[must_use]
pub fn promote(record: AccessRequest, now: DateTime<Utc>) -> AccessRequest {
    match record.promoted(now) {
        Some(promoted) => promoted,
        None => record,
    }
}

fn validate_duration(duration_minutes: u32) -> AppResult<()> {
    if duration_minutes == 0 {
        return Err(AppError::Validation(
            "duration_minutes must be greater than zero".to_owned(),
        ));
    }

    if duration_minutes > MAX_DURATION_MINUTES {
        return Err(AppError::Validation(format!(
            "duration_minutes must not exceed {MAX_DURATION_MINUTES}"
        )));
    }

    Ok(())
}
