//! Typed predicates over access request attributes.
//!
//! A [`Condition`] is evaluated by the record store atomically with the write it guards.
//! The in-memory store evaluates it with [`Condition::evaluate`]; SQL stores render it into a
//! `WHERE` clause. Comparisons against an absent attribute are false, as in SQL.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access_request::{AccessRequest, RequestStatus};

/// Attribute of an access request that conditions can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Deterministic request identifier.
    Id,
    /// Creation timestamp sort key.
    RequestTime,
    /// Requester subject.
    Requester,
    /// Target account.
    Account,
    /// Target role.
    Role,
    /// Lifecycle status.
    Status,
    /// Approved access deadline.
    ExpirationTime,
    /// Reviewer decision time.
    ReviewTime,
    /// Reviewer subject.
    Reviewer,
    /// Unreviewed-request expiry marker.
    Ttl,
}

impl Attribute {
    /// Returns the storage name of the attribute.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::RequestTime => "request_time",
            Self::Requester => "requester",
            Self::Account => "account",
            Self::Role => "role",
            Self::Status => "status",
            Self::ExpirationTime => "expiration_time",
            Self::ReviewTime => "review_time",
            Self::Reviewer => "reviewer",
            Self::Ttl => "ttl",
        }
    }

    /// Reads the attribute from a record.
    #[must_use]
    pub fn read(&self, record: &AccessRequest) -> Option<AttributeValue> {
        match self {
            Self::Id => Some(AttributeValue::Text(record.id().to_owned())),
            Self::RequestTime => Some(AttributeValue::Text(
                record.request_time().to_key_string(),
            )),
            Self::Requester => Some(AttributeValue::Text(record.requester().to_owned())),
            Self::Account => Some(AttributeValue::Text(record.account().to_owned())),
            Self::Role => Some(AttributeValue::Text(record.role().to_owned())),
            Self::Status => Some(AttributeValue::Status(record.status())),
            Self::ExpirationTime => record.expiration_time().map(AttributeValue::Timestamp),
            Self::ReviewTime => record.review_time().map(AttributeValue::Timestamp),
            Self::Reviewer => record
                .reviewer()
                .map(|reviewer| AttributeValue::Text(reviewer.to_owned())),
            Self::Ttl => record.ttl().map(AttributeValue::Integer),
        }
    }

    /// Starts a condition on this attribute.
    #[must_use]
    pub fn is(self) -> AttributeCondition {
        AttributeCondition(self)
    }
}

/// Typed attribute value. Statuses order by their storage value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// String attribute.
    Text(String),
    /// Integer attribute.
    Integer(i64),
    /// Timestamp attribute.
    Timestamp(DateTime<Utc>),
    /// Lifecycle status attribute.
    Status(RequestStatus),
}

impl AttributeValue {
    fn partial_cmp_value(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(left), Self::Text(right)) => Some(left.cmp(right)),
            (Self::Integer(left), Self::Integer(right)) => Some(left.cmp(right)),
            (Self::Timestamp(left), Self::Timestamp(right)) => Some(left.cmp(right)),
            (Self::Status(left), Self::Status(right)) => Some(left.as_str().cmp(right.as_str())),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<RequestStatus> for AttributeValue {
    fn from(value: RequestStatus) -> Self {
        Self::Status(value)
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl Comparison {
    /// Returns the SQL operator.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// Composable predicate over a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Compares one attribute with a value.
    Compare {
        /// Attribute on the left-hand side.
        attribute: Attribute,
        /// Operator.
        comparison: Comparison,
        /// Right-hand side value.
        value: AttributeValue,
    },
    /// Attribute equals one of the values.
    In {
        /// Attribute to test.
        attribute: Attribute,
        /// Accepted values.
        values: Vec<AttributeValue>,
    },
    /// Attribute is present.
    Exists {
        /// Attribute to test.
        attribute: Attribute,
    },
    /// Attribute is absent.
    NotExists {
        /// Attribute to test.
        attribute: Attribute,
    },
    /// Every nested condition holds. An empty conjunction holds.
    And {
        /// Nested conditions.
        conditions: Vec<Condition>,
    },
    /// At least one nested condition holds. An empty disjunction does not hold.
    Or {
        /// Nested conditions.
        conditions: Vec<Condition>,
    },
    /// Nested condition does not hold.
    Not {
        /// Negated condition.
        condition: Box<Condition>,
    },
}

impl Condition {
    /// Returns a condition that always holds.
    #[must_use]
    pub fn always() -> Self {
        Self::And {
            conditions: Vec::new(),
        }
    }

    /// Conjoins two conditions, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Condition) -> Self {
        let mut conditions = match self {
            Self::And { conditions } => conditions,
            single => vec![single],
        };
        match other {
            Self::And {
                conditions: other_conditions,
            } => conditions.extend(other_conditions),
            single => conditions.push(single),
        }

        Self::And { conditions }
    }

    /// Disjoins two conditions.
    #[must_use]
    pub fn or(self, other: Condition) -> Self {
        Self::Or {
            conditions: vec![self, other],
        }
    }

    /// Negates this condition.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not {
            condition: Box::new(self),
        }
    }

    /// Evaluates the condition against a record.
    #[must_use]
    pub fn evaluate(&self, record: &AccessRequest) -> bool {
        match self {
            Self::Compare {
                attribute,
                comparison,
                value,
            } => attribute
                .read(record)
                .and_then(|current| current.partial_cmp_value(value))
                .is_some_and(|ordering| comparison.holds(ordering)),
            Self::In { attribute, values } => attribute
                .read(record)
                .is_some_and(|current| values.contains(&current)),
            Self::Exists { attribute } => attribute.read(record).is_some(),
            Self::NotExists { attribute } => attribute.read(record).is_none(),
            Self::And { conditions } => conditions
                .iter()
                .all(|condition| condition.evaluate(record)),
            Self::Or { conditions } => conditions
                .iter()
                .any(|condition| condition.evaluate(record)),
            Self::Not { condition } => !condition.evaluate(record),
        }
    }
}

/// Builder returned by [`Attribute::is`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeCondition(Attribute);

impl AttributeCondition {
    fn compare(self, comparison: Comparison, value: impl Into<AttributeValue>) -> Condition {
        Condition::Compare {
            attribute: self.0,
            comparison,
            value: value.into(),
        }
    }

    /// Attribute equals the value.
    #[must_use]
    pub fn eq(self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparison::Eq, value)
    }

    /// Attribute does not equal the value.
    #[must_use]
    pub fn ne(self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparison::Ne, value)
    }

    /// Attribute is less than the value.
    #[must_use]
    pub fn lt(self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparison::Lt, value)
    }

    /// Attribute is less than or equal to the value.
    #[must_use]
    pub fn le(self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparison::Le, value)
    }

    /// Attribute is greater than the value.
    #[must_use]
    pub fn gt(self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparison::Gt, value)
    }

    /// Attribute is greater than or equal to the value.
    #[must_use]
    pub fn ge(self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(Comparison::Ge, value)
    }

    /// Attribute equals one of the values.
    #[must_use]
    pub fn one_of<V: Into<AttributeValue>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        Condition::In {
            attribute: self.0,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Attribute equals none of the values.
    #[must_use]
    pub fn none_of<V: Into<AttributeValue>>(
        self,
        values: impl IntoIterator<Item = V>,
    ) -> Condition {
        self.one_of(values).negate()
    }

    /// Attribute is present.
    #[must_use]
    pub fn present(self) -> Condition {
        Condition::Exists { attribute: self.0 }
    }

    /// Attribute is absent.
    #[must_use]
    pub fn absent(self) -> Condition {
        Condition::NotExists { attribute: self.0 }
    }
}
