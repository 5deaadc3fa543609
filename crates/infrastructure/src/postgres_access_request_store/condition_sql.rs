use elevate_domain::{Attribute, AttributeValue, Condition};
use sqlx::{Postgres, QueryBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Text,
    BigInt,
    Timestamp,
    Status,
}

fn column(attribute: Attribute) -> (&'static str, ColumnType) {
    let column_type = match attribute {
        Attribute::Id
        | Attribute::RequestTime
        | Attribute::Requester
        | Attribute::Account
        | Attribute::Role
        | Attribute::Reviewer => ColumnType::Text,
        Attribute::Status => ColumnType::Status,
        Attribute::ExpirationTime | Attribute::ReviewTime => ColumnType::Timestamp,
        Attribute::Ttl => ColumnType::BigInt,
    };

    (attribute.as_str(), column_type)
}

fn value_matches(column_type: ColumnType, value: &AttributeValue) -> bool {
    matches!(
        (column_type, value),
        (ColumnType::Text, AttributeValue::Text(_))
            | (ColumnType::BigInt, AttributeValue::Integer(_))
            | (ColumnType::Timestamp, AttributeValue::Timestamp(_))
            | (ColumnType::Status, AttributeValue::Status(_))
    )
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: &AttributeValue) {
    match value {
        AttributeValue::Text(text) => builder.push_bind(text.clone()),
        AttributeValue::Integer(integer) => builder.push_bind(*integer),
        AttributeValue::Timestamp(timestamp) => builder.push_bind(*timestamp),
        AttributeValue::Status(status) => builder.push_bind(status.as_str()),
    };
}

/// Appends a condition as a boolean SQL expression that is never NULL.
///
/// Absent columns and mismatched value types evaluate to `FALSE`, matching
/// [`Condition::evaluate`].
pub(super) fn push_condition(builder: &mut QueryBuilder<'_, Postgres>, condition: &Condition) {
    match condition {
        Condition::Compare {
            attribute,
            comparison,
            value,
        } => {
            let (name, column_type) = column(*attribute);
            if !value_matches(column_type, value) {
                builder.push("FALSE");
                return;
            }

            builder.push("COALESCE(");
            builder.push(name);
            builder.push(" ");
            builder.push(comparison.as_sql());
            builder.push(" ");
            push_value(builder, value);
            builder.push(", FALSE)");
        }
        Condition::In { attribute, values } => {
            let (name, column_type) = column(*attribute);
            let values = values
                .iter()
                .filter(|value| value_matches(column_type, value))
                .collect::<Vec<_>>();
            if values.is_empty() {
                builder.push("FALSE");
                return;
            }

            builder.push("COALESCE(");
            builder.push(name);
            builder.push(" IN (");
            for (index, value) in values.into_iter().enumerate() {
                if index > 0 {
                    builder.push(", ");
                }
                push_value(builder, value);
            }
            builder.push("), FALSE)");
        }
        Condition::Exists { attribute } => {
            builder.push(attribute.as_str());
            builder.push(" IS NOT NULL");
        }
        Condition::NotExists { attribute } => {
            builder.push(attribute.as_str());
            builder.push(" IS NULL");
        }
        Condition::And { conditions } => push_junction(builder, conditions, " AND ", "TRUE"),
        Condition::Or { conditions } => push_junction(builder, conditions, " OR ", "FALSE"),
        Condition::Not { condition } => {
            builder.push("NOT (");
            push_condition(builder, condition);
            builder.push(")");
        }
    }
}

fn push_junction(
    builder: &mut QueryBuilder<'_, Postgres>,
    conditions: &[Condition],
    separator: &str,
    empty: &str,
) {
    if conditions.is_empty() {
        builder.push(empty);
        return;
    }

    builder.push("(");
    for (index, condition) in conditions.iter().enumerate() {
        if index > 0 {
            builder.push(separator);
        }
        push_condition(builder, condition);
    }
    builder.push(")");
}
