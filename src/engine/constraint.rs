use std::borrow::Cow;
use std::cmp::Ordering;

use crate::models::{Constraint, Record, Relation};
use crate::utils::error::{AppError, Result};

/// Fold text to lower-case ASCII so that "Čapek" and "capek" compare equal.
pub fn normalize(text: &str) -> String {
    deunicode::deunicode(text).to_lowercase()
}

/// Decide whether `record` satisfies `constraint`.
///
/// Fails only when the constraint targets a field records do not have.
pub fn evaluate(record: &Record, constraint: &Constraint) -> Result<bool> {
    let record_value = record
        .attribute(&constraint.attribute_key)
        .ok_or_else(|| AppError::UnknownAttribute {
            key: constraint.attribute_key.clone(),
        })?;

    let (record_value, constraint_value): (Cow<str>, Cow<str>) = if constraint.normalize {
        (
            Cow::Owned(normalize(record_value)),
            Cow::Owned(normalize(&constraint.comparison_value)),
        )
    } else {
        (
            Cow::Borrowed(record_value),
            Cow::Borrowed(constraint.comparison_value.as_str()),
        )
    };

    Ok(apply(constraint.relation, &record_value, &constraint_value))
}

fn apply(relation: Relation, record_value: &str, constraint_value: &str) -> bool {
    match relation {
        Relation::Equal => record_value == constraint_value,
        Relation::NotEqual => record_value != constraint_value,
        Relation::Greater => compare(record_value, constraint_value).is_gt(),
        Relation::GreaterOrEqual => compare(record_value, constraint_value).is_ge(),
        Relation::Less => compare(record_value, constraint_value).is_lt(),
        Relation::LessOrEqual => compare(record_value, constraint_value).is_le(),
        Relation::Contains => record_value.contains(constraint_value),
        Relation::NotContains => !record_value.contains(constraint_value),
    }
}

/// Numeric ordering when both sides are integers, string ordering otherwise.
fn compare(left: &str, right: &str) -> Ordering {
    match (left.trim().parse::<i64>(), right.trim().parse::<i64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        _ => left.cmp(right),
    }
}
