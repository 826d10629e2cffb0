//! In-memory evaluation of a filter against JSON documents
//!
//! Used by stores that take the pass-through output and filter records
//! themselves. A missing field reads as `null`, so `= null` matches it and an
//! explicit `null` alike, as `$eq: null` and `IS NULL` do. Values of different
//! kinds never compare, so every ordering test on them is false.

use crate::ast::{Comparison, ComparisonOperator, FilterNode, FilterValue, LogicalOperator};
use crate::convert::document::like_to_regex;
use crate::resolver::parse_date;
use regex::RegexBuilder;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::cmp::Ordering;

impl FilterNode {
    /// Evaluate this filter against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            FilterNode::Comparison(c) => c.matches(doc),
            FilterNode::Logical {
                operator: LogicalOperator::And,
                left,
                right,
            } => left.matches(doc) && right.matches(doc),
            FilterNode::Logical {
                operator: LogicalOperator::Or,
                left,
                right,
            } => left.matches(doc) || right.matches(doc),
            FilterNode::Unary { expr, .. } => !expr.matches(doc),
            FilterNode::Parenthesis { expr } => expr.matches(doc),
        }
    }
}

impl Comparison {
    pub fn matches(&self, doc: &Value) -> bool {
        let actual = doc.get(&self.key).unwrap_or(&Value::Null);

        let expected = match &self.value {
            FilterValue::Property(other) => doc.get(other).cloned().unwrap_or(Value::Null),
            FilterValue::StringRange { from, to } => {
                return in_range(actual, &Value::String(from.clone()), &Value::String(to.clone()))
            }
            FilterValue::NumberRange { from, to } => {
                return in_range(actual, &decimal_value(from), &decimal_value(to))
            }
            FilterValue::BooleanRange { .. } => return false,
            FilterValue::String(s) => Value::String(s.clone()),
            FilterValue::Number(n) => decimal_value(n),
            FilterValue::Boolean(b) => Value::Bool(*b),
            FilterValue::Null => Value::Null,
        };

        let ordering = compare_values(actual, &expected);
        match self.operator {
            ComparisonOperator::Eq => ordering == Some(Ordering::Equal),
            ComparisonOperator::Ne => ordering != Some(Ordering::Equal),
            ComparisonOperator::Gt => ordering == Some(Ordering::Greater),
            ComparisonOperator::Gte => {
                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
            }
            ComparisonOperator::Lt => ordering == Some(Ordering::Less),
            ComparisonOperator::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            ComparisonOperator::Range => false,
            op => match (actual, &expected) {
                (Value::String(text), Value::String(pattern)) => text_matches(op, text, pattern),
                _ => false,
            },
        }
    }
}

fn in_range(value: &Value, low: &Value, high: &Value) -> bool {
    matches!(
        compare_values(value, low),
        Some(Ordering::Greater | Ordering::Equal)
    ) && matches!(
        compare_values(value, high),
        Some(Ordering::Less | Ordering::Equal)
    )
}

/// Case-insensitive pattern test
fn text_matches(operator: ComparisonOperator, text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let needle = pattern.to_lowercase();
    match operator {
        ComparisonOperator::StartsWith => text.starts_with(&needle),
        ComparisonOperator::EndsWith => text.ends_with(&needle),
        ComparisonOperator::Contains => text.contains(&needle),
        ComparisonOperator::Like => RegexBuilder::new(&like_to_regex(pattern))
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(&text))
            .unwrap_or(false),
        _ => false,
    }
}

fn decimal_value(n: &Decimal) -> Value {
    n.normalize()
        .to_string()
        .parse::<serde_json::Number>()
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn to_decimal(n: &serde_json::Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Decimal::from(u));
    }
    n.as_f64().and_then(Decimal::from_f64)
}

/// Compare two JSON values, returning an ordering if the types are comparable.
///
/// Strings that both parse as ISO dates compare as instants.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => to_decimal(a)?.partial_cmp(&to_decimal(b)?),
        (Value::String(a), Value::String(b)) => match (parse_date(a), parse_date(b)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.cmp(b)),
        },
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mismatched_kinds_do_not_compare() {
        assert_eq!(compare_values(&json!(1), &json!("1")), None);
        assert_eq!(compare_values(&json!(null), &json!(0)), None);
    }

    #[test]
    fn numbers_compare_across_representations() {
        assert_eq!(compare_values(&json!(2), &json!(2.0)), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!(2.5), &json!(3)), Some(Ordering::Less));
    }

    #[test]
    fn dates_compare_as_instants() {
        assert_eq!(
            compare_values(&json!("2024-01-01T12:00:00+02:00"), &json!("2024-01-01T10:00:00Z")),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn like_is_case_insensitive() {
        assert!(text_matches(ComparisonOperator::Like, "John", "jo%"));
        assert!(!text_matches(ComparisonOperator::Like, "Johnny", "jo_n"));
    }
}
