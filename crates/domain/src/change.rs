//! Change-feed records emitted by the record store.

use elevate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::access_request::{AccessRequest, RecordKey, RequestTime};
use crate::ttl::TTL_ATTRIBUTE;

/// Kind of write a change record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEventType {
    /// Record created.
    Insert,
    /// Record rewritten.
    Modify,
    /// Record deleted.
    Remove,
}

impl ChangeEventType {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Modify => "modify",
            Self::Remove => "remove",
        }
    }

    /// Parses a storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "insert" => Ok(Self::Insert),
            "modify" => Ok(Self::Modify),
            "remove" => Ok(Self::Remove),
            _ => Err(AppError::Validation(format!(
                "unknown change event type '{value}'"
            ))),
        }
    }
}

/// Untyped attribute map of a record as it appears on the change feed.
///
/// Consumers read it loosely so that malformed images can be logged and dropped instead of
/// failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordImage(Map<String, Value>);

impl RecordImage {
    /// Wraps a raw attribute map.
    #[must_use]
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    /// Captures the image of a typed record.
    pub fn from_request(record: &AccessRequest) -> AppResult<Self> {
        match serde_json::to_value(record) {
            Ok(Value::Object(attributes)) => Ok(Self(attributes)),
            Ok(other) => Err(AppError::Internal(format!(
                "access request serialized to non-object value {other}"
            ))),
            Err(error) => Err(AppError::Internal(format!(
                "failed to serialize access request image: {error}"
            ))),
        }
    }

    /// Decodes the image into a typed record.
    pub fn to_request(&self) -> AppResult<AccessRequest> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|error| {
            AppError::Validation(format!("change image is not an access request: {error}"))
        })
    }

    /// Returns the record key carried by the image.
    pub fn key(&self) -> AppResult<RecordKey> {
        let id = self.text("id")?;
        let request_time = RequestTime::parse(self.text("request_time")?)?;

        Ok(RecordKey {
            id: id.to_owned(),
            request_time,
        })
    }

    /// Returns one attribute.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute).filter(|value| !value.is_null())
    }

    /// Returns whether the ttl attribute is already present.
    #[must_use]
    pub fn has_ttl(&self) -> bool {
        self.get(TTL_ATTRIBUTE).is_some()
    }

    /// Returns the underlying attribute map.
    #[must_use]
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }

    fn text(&self, attribute: &str) -> AppResult<&str> {
        self.get(attribute)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Validation(format!("change image has no '{attribute}'")))
    }
}

/// One entry on the record store's ordered change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Monotonic position on the feed, also used as the delivery idempotency key.
    pub sequence: i64,
    /// Kind of write.
    pub event_type: ChangeEventType,
    /// Record before the write; absent for inserts.
    pub before: Option<RecordImage>,
    /// Record after the write; absent for removals.
    pub after: Option<RecordImage>,
}

impl ChangeRecord {
    /// Returns the key of the changed record from whichever image is present.
    pub fn key(&self) -> AppResult<RecordKey> {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .ok_or_else(|| {
                AppError::Validation(format!("change record {} carries no image", self.sequence))
            })?
            .key()
    }
}
