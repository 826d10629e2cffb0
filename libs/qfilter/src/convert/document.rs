//! Document-store (Mongo-style) backend
//!
//! Comparisons become `{ field: { $op: value } }` documents, property
//! comparisons become `$expr` aggregation expressions and logical nodes
//! become `$and` / `$or` arrays. `= null` is `{ $eq: null }`, which matches
//! both a missing field and an explicit `null`, the same as in-memory
//! evaluation and SQL `IS NULL`. Dates go out as `{ $date: <RFC 3339 UTC> }`.

use super::{convert, Backend, FoldNode};
use crate::ast::{Comparison, ComparisonOperator, FilterValue, LogicalOperator};
use crate::error::ConversionError;
use crate::order::{SortDirection, SortKey};
use crate::resolver::{normalize_date, ResolvedFilter};
use crate::schema::FieldType;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

const BACKEND: &str = "document";

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentBackend;

/// A converted sub-filter, kept structured until the root so negation and
/// flattening can look at its shape
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentExpr {
    /// `{ key: condition }`
    Field { key: String, condition: Value },
    /// Aggregation expression, wrapped in `$expr` at the top
    Expr(Value),
    Logical {
        operator: LogicalOperator,
        clauses: Vec<DocumentExpr>,
    },
}

impl DocumentExpr {
    pub fn into_value(self) -> Value {
        match self {
            DocumentExpr::Field { key, condition } => {
                let mut doc = Map::new();
                doc.insert(key, condition);
                Value::Object(doc)
            }
            DocumentExpr::Expr(expr) => json!({ "$expr": expr }),
            DocumentExpr::Logical { operator, clauses } => {
                let clauses: Vec<Value> =
                    clauses.into_iter().map(DocumentExpr::into_value).collect();
                json!({ logical_key(operator): clauses })
            }
        }
    }
}

/// Convert straight to a JSON filter document
pub fn convert_document(filter: &ResolvedFilter) -> Result<Value, ConversionError> {
    convert(filter, &DocumentBackend).map(DocumentExpr::into_value)
}

/// `{ field: 1 | -1 }` in key order
pub fn sort_document(keys: &[SortKey]) -> Value {
    let mut doc = Map::new();
    for key in keys {
        let direction = match key.direction {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        };
        doc.insert(key.field.clone(), json!(direction));
    }
    Value::Object(doc)
}

/// `{ field: 1 }` for every selected field
pub fn projection(fields: &[String]) -> Value {
    Value::Object(fields.iter().map(|f| (f.clone(), json!(1))).collect())
}

impl Backend for DocumentBackend {
    type Output = DocumentExpr;

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn transform(
        &self,
        node: FoldNode<'_, DocumentExpr>,
        filter: &ResolvedFilter,
    ) -> Result<DocumentExpr, ConversionError> {
        match node {
            FoldNode::Comparison(c) => comparison(c, filter),
            FoldNode::Logical {
                operator,
                left,
                right,
            } => {
                let mut clauses = Vec::with_capacity(2);
                for side in [left, right] {
                    match side {
                        DocumentExpr::Logical {
                            operator: inner,
                            clauses: nested,
                        } if inner == operator => clauses.extend(nested),
                        other => clauses.push(other),
                    }
                }
                Ok(DocumentExpr::Logical { operator, clauses })
            }
            FoldNode::Not { expr, .. } => negate(expr),
            FoldNode::Parenthesis { expr } => Ok(expr),
        }
    }
}

fn negate(expr: DocumentExpr) -> Result<DocumentExpr, ConversionError> {
    match expr {
        DocumentExpr::Field { key, condition } => {
            let condition = match condition {
                Value::Object(mut map) if map.len() == 1 && map.contains_key("$not") => {
                    map.remove("$not").unwrap_or(Value::Null)
                }
                other => json!({ "$not": other }),
            };
            Ok(DocumentExpr::Field { key, condition })
        }
        DocumentExpr::Expr(e) => Ok(DocumentExpr::Expr(json!({ "$not": [e] }))),
        DocumentExpr::Logical { operator, .. } => Err(ConversionError::UnsupportedNegation {
            backend: BACKEND,
            combinator: operator,
        }),
    }
}

fn comparison(c: &Comparison, filter: &ResolvedFilter) -> Result<DocumentExpr, ConversionError> {
    let field_type = filter.field_type(&c.key);

    if let FilterValue::Property(other) = &c.value {
        let op = match c.operator {
            ComparisonOperator::Eq => "$eq",
            ComparisonOperator::Ne => "$ne",
            ComparisonOperator::Gt => "$gt",
            ComparisonOperator::Gte => "$gte",
            ComparisonOperator::Lt => "$lt",
            ComparisonOperator::Lte => "$lte",
            other_op => {
                return Err(unsupported(
                    &c.key,
                    format!("'{}' cannot compare two fields", other_op),
                ))
            }
        };
        return Ok(DocumentExpr::Expr(json!({
            op: [format!("${}", c.key), format!("${}", other)]
        })));
    }

    let scalar = |value: &FilterValue| literal(&c.key, value, field_type);
    let condition = match c.operator {
        ComparisonOperator::Eq => json!({ "$eq": scalar(&c.value)? }),
        ComparisonOperator::Ne => json!({ "$ne": scalar(&c.value)? }),
        ComparisonOperator::Gt => json!({ "$gt": scalar(&c.value)? }),
        ComparisonOperator::Gte => json!({ "$gte": scalar(&c.value)? }),
        ComparisonOperator::Lt => json!({ "$lt": scalar(&c.value)? }),
        ComparisonOperator::Lte => json!({ "$lte": scalar(&c.value)? }),
        ComparisonOperator::Range => {
            let (from, to) = match &c.value {
                FilterValue::StringRange { from, to } => (
                    literal(&c.key, &FilterValue::String(from.clone()), field_type)?,
                    literal(&c.key, &FilterValue::String(to.clone()), field_type)?,
                ),
                FilterValue::NumberRange { from, to } => {
                    (number(&c.key, from)?, number(&c.key, to)?)
                }
                other => {
                    return Err(unsupported(
                        &c.key,
                        format!("{} is not a range", other.describe()),
                    ))
                }
            };
            json!({ "$gte": from, "$lte": to })
        }
        op => {
            let FilterValue::String(text) = &c.value else {
                return Err(unsupported(&c.key, format!("'{}' needs a string", op)));
            };
            let pattern = match op {
                ComparisonOperator::Like => like_to_regex(text),
                ComparisonOperator::StartsWith => format!("^{}", regex::escape(text)),
                ComparisonOperator::EndsWith => format!("{}$", regex::escape(text)),
                _ => regex::escape(text),
            };
            json!({ "$regex": pattern, "$options": "i" })
        }
    };

    Ok(DocumentExpr::Field {
        key: c.key.clone(),
        condition,
    })
}

fn literal(
    key: &str,
    value: &FilterValue,
    field_type: Option<FieldType>,
) -> Result<Value, ConversionError> {
    match value {
        FilterValue::String(s) if field_type == Some(FieldType::Date) => normalize_date(s)
            .map(|date| json!({ "$date": date }))
            .ok_or_else(|| unsupported(key, format!("'{}' is not a date", s))),
        FilterValue::String(s) => Ok(json!(s)),
        FilterValue::Number(n) => number(key, n),
        FilterValue::Boolean(b) => Ok(json!(b)),
        FilterValue::Null => Ok(Value::Null),
        other => Err(unsupported(key, format!("{} is not a scalar", other.describe()))),
    }
}

fn number(key: &str, n: &Decimal) -> Result<Value, ConversionError> {
    if n.fract().is_zero() {
        if let Some(i) = n.to_i64() {
            return Ok(json!(i));
        }
    }
    n.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| unsupported(key, format!("{} is out of range", n)))
}

/// `%` matches any run, `_` any single character; everything else is literal
pub(crate) fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

fn logical_key(operator: LogicalOperator) -> &'static str {
    match operator {
        LogicalOperator::And => "$and",
        LogicalOperator::Or => "$or",
    }
}

fn unsupported(key: &str, reason: String) -> ConversionError {
    ConversionError::UnsupportedValue {
        backend: BACKEND,
        key: key.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_become_regex() {
        assert_eq!(like_to_regex("jo%n_"), "^jo.*n.$");
        assert_eq!(like_to_regex("a.b%"), "^a\\.b.*$");
    }

    #[test]
    fn integral_decimals_stay_integers() {
        assert_eq!(number("age", &Decimal::new(180, 1)).unwrap(), json!(18));
        assert_eq!(number("score", &Decimal::new(25, 1)).unwrap(), json!(2.5));
    }

    #[test]
    fn double_negation_unwraps() {
        let field = DocumentExpr::Field {
            key: "age".into(),
            condition: json!({ "$gt": 1 }),
        };
        let twice = negate(negate(field.clone()).unwrap()).unwrap();
        assert_eq!(twice, field);
    }
}
