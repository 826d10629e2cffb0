//! Semantic resolution against an entity's field table
//!
//! Walks every comparison, checks the referenced fields exist and that each
//! literal fits the declared field type. All problems are collected before
//! returning. The tree shape is left untouched; the resolved field types are
//! attached alongside it for the converters.

use crate::ast::{Comparison, ComparisonOperator, FilterNode, FilterValue};
use crate::error::{SemanticError, SemanticErrors};
use crate::schema::{EntitySchema, FieldType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A filter that passed resolution, with the type of every field it touches
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFilter {
    entity: String,
    root: FilterNode,
    field_types: BTreeMap<String, FieldType>,
}

impl ResolvedFilter {
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn root(&self) -> &FilterNode {
        &self.root
    }

    pub fn into_root(self) -> FilterNode {
        self.root
    }

    pub fn field_type(&self, key: &str) -> Option<FieldType> {
        self.field_types.get(key).copied()
    }

    pub fn field_types(&self) -> &BTreeMap<String, FieldType> {
        &self.field_types
    }
}

/// Resolve `filter` against `schema`, reporting every problem found.
pub fn resolve(
    filter: FilterNode,
    schema: &EntitySchema,
) -> Result<ResolvedFilter, SemanticErrors> {
    let mut resolver = Resolver {
        schema,
        errors: Vec::new(),
        field_types: BTreeMap::new(),
    };
    for comparison in filter.comparisons() {
        resolver.check_comparison(comparison);
    }

    if resolver.errors.is_empty() {
        tracing::debug!(
            entity = %schema.name,
            fields = resolver.field_types.len(),
            "Filter resolved"
        );
        Ok(ResolvedFilter {
            entity: schema.name.clone(),
            root: filter,
            field_types: resolver.field_types,
        })
    } else {
        tracing::debug!(
            entity = %schema.name,
            errors = resolver.errors.len(),
            "Filter rejected"
        );
        Err(SemanticErrors(resolver.errors))
    }
}

struct Resolver<'s> {
    schema: &'s EntitySchema,
    errors: Vec<SemanticError>,
    field_types: BTreeMap<String, FieldType>,
}

impl Resolver<'_> {
    fn lookup(&mut self, name: &str) -> Option<FieldType> {
        match self.schema.field_type(name) {
            Some(ty) => {
                self.field_types.insert(name.to_string(), ty);
                Some(ty)
            }
            None => {
                let unknown = SemanticError::UnknownField {
                    name: name.to_string(),
                };
                if !self.errors.contains(&unknown) {
                    self.errors.push(unknown);
                }
                None
            }
        }
    }

    fn check_comparison(&mut self, comparison: &Comparison) {
        let key_type = self.lookup(&comparison.key);

        if let FilterValue::Property(other) = &comparison.value {
            // Both sides resolve independently
            let other_type = self.lookup(other);
            if let (Some(key_type), Some(other_type)) = (key_type, other_type) {
                if let Err(e) = check_operator(comparison, key_type) {
                    self.errors.push(e);
                } else if !key_type.compatible_with(other_type) {
                    self.errors.push(SemanticError::PropertyTypeMismatch {
                        key: comparison.key.clone(),
                        other: other.clone(),
                        key_type,
                        other_type,
                    });
                }
            }
            return;
        }

        let Some(field_type) = key_type else {
            return;
        };
        if let Err(e) = check_shape(comparison)
            .and_then(|_| check_operator(comparison, field_type))
            .and_then(|_| check_value(comparison, field_type))
        {
            self.errors.push(e);
        }
    }
}

/// Range operator and range value come together
fn check_shape(comparison: &Comparison) -> Result<(), SemanticError> {
    let key = &comparison.key;
    let invalid = |reason: &str| SemanticError::InvalidRange {
        key: key.clone(),
        reason: reason.to_string(),
    };
    match (&comparison.operator, &comparison.value) {
        (_, FilterValue::BooleanRange { .. }) => {
            Err(invalid("boolean values cannot form a range"))
        }
        (
            ComparisonOperator::Range,
            FilterValue::StringRange { .. } | FilterValue::NumberRange { .. },
        ) => Ok(()),
        (ComparisonOperator::Range, _) => Err(invalid("expected a pair of bounds")),
        (_, FilterValue::StringRange { .. } | FilterValue::NumberRange { .. }) => {
            Err(invalid("a range needs the range operator"))
        }
        _ => Ok(()),
    }
}

fn check_operator(comparison: &Comparison, field_type: FieldType) -> Result<(), SemanticError> {
    let operator = comparison.operator;
    let supported = if operator.is_pattern() {
        field_type == FieldType::String
    } else if operator.is_ordering() {
        field_type != FieldType::Boolean
    } else {
        true
    };
    if supported {
        Ok(())
    } else {
        Err(SemanticError::UnsupportedOperator {
            key: comparison.key.clone(),
            operator,
            field_type,
        })
    }
}

fn check_value(comparison: &Comparison, field_type: FieldType) -> Result<(), SemanticError> {
    let key = &comparison.key;
    let mismatch = || SemanticError::TypeMismatch {
        key: key.clone(),
        expected: field_type,
        value: comparison.value.describe(),
    };
    let reversed = || SemanticError::InvalidRange {
        key: key.clone(),
        reason: "lower bound exceeds upper bound".to_string(),
    };

    match (&comparison.value, field_type) {
        (FilterValue::Null, _) => match comparison.operator {
            ComparisonOperator::Eq | ComparisonOperator::Ne => Ok(()),
            _ => Err(mismatch()),
        },

        (FilterValue::String(_), FieldType::String) => Ok(()),
        (FilterValue::String(s), FieldType::Date) => parse_date(s).map(|_| ()).ok_or_else(mismatch),
        (FilterValue::String(s), FieldType::Uuid) => {
            uuid::Uuid::parse_str(s).map(|_| ()).map_err(|_| mismatch())
        }

        (FilterValue::Number(_), FieldType::Number) => Ok(()),
        (FilterValue::Number(n), FieldType::Integer) if is_integral(n) => Ok(()),

        (FilterValue::Boolean(_), FieldType::Boolean) => Ok(()),

        (FilterValue::StringRange { from, to }, FieldType::String) => {
            if from > to {
                Err(reversed())
            } else {
                Ok(())
            }
        }
        (FilterValue::StringRange { from, to }, FieldType::Date) => {
            match (parse_date(from), parse_date(to)) {
                (Some(from), Some(to)) if from > to => Err(reversed()),
                (Some(_), Some(_)) => Ok(()),
                _ => Err(mismatch()),
            }
        }

        (FilterValue::NumberRange { from, to }, FieldType::Number | FieldType::Integer) => {
            if field_type == FieldType::Integer && !(is_integral(from) && is_integral(to)) {
                Err(mismatch())
            } else if from > to {
                Err(reversed())
            } else {
                Ok(())
            }
        }

        _ => Err(mismatch()),
    }
}

fn is_integral(n: &Decimal) -> bool {
    n.fract().is_zero()
}

/// Parse an ISO-8601 date (`2024-01-31`), RFC 3339 timestamp or naive
/// date-time. Timestamps with an offset are normalized to UTC.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Render a date literal as an RFC 3339 UTC timestamp, the form every
/// backend emits. Naive dates and times are taken as UTC.
pub(crate) fn normalize_date(s: &str) -> Option<String> {
    parse_date(s).map(|dt| dt.and_utc().to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
