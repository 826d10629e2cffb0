//! Relational (ORM find-options) backend
//!
//! A filter is converted to disjunctive normal form: a list of alternatives,
//! each a map from column to a column operator. `and` merges maps, `or`
//! concatenates lists and negation is pushed down to single columns. The
//! result serializes as ORM-style `where` options and renders to a
//! parameterized SQL fragment.

use super::{Backend, FoldNode};
use crate::ast::{Comparison, ComparisonOperator, FilterValue, LogicalOperator};
use crate::error::ConversionError;
use crate::order::{SortDirection, SortKey};
use crate::resolver::{normalize_date, ResolvedFilter};
use crate::schema::FieldType;
use rust_decimal::Decimal;
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;

const BACKEND: &str = "relational";

/// Upper bound on alternatives produced by distributing `and` over `or`
pub const MAX_ALTERNATIVES: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct RelationalBackend;

/// Literal as bound into a query
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Text(String),
    Number(Decimal),
    Boolean(bool),
    Date(String),
    Uuid(String),
}

/// Operator applied to one column
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "operator", content = "value", rename_all = "camelCase")]
pub enum ColumnOp {
    Equal(SqlValue),
    IsNull,
    Not(Box<ColumnOp>),
    MoreThan(SqlValue),
    MoreThanOrEqual(SqlValue),
    LessThan(SqlValue),
    LessThanOrEqual(SqlValue),
    /// Case-insensitive LIKE; `\` escapes `%` and `_`
    ILike(String),
    Between(SqlValue, SqlValue),
    /// Comparison against another column of the same row
    Column {
        operator: ComparisonOperator,
        column: String,
    },
    And(Vec<ColumnOp>),
}

impl ColumnOp {
    fn negated(self) -> ColumnOp {
        match self {
            ColumnOp::Not(inner) => *inner,
            other => ColumnOp::Not(Box::new(other)),
        }
    }

    fn merged(self, other: ColumnOp) -> ColumnOp {
        let mut ops = match self {
            ColumnOp::And(ops) => ops,
            op => vec![op],
        };
        match other {
            ColumnOp::And(more) => ops.extend(more),
            op => ops.push(op),
        }
        ColumnOp::And(ops)
    }
}

/// Columns that must all match
pub type Conjunction = BTreeMap<String, ColumnOp>;

/// Alternatives of which at least one must match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    alternatives: Vec<Conjunction>,
}

impl Predicate {
    fn column(key: &str, op: ColumnOp) -> Self {
        let mut conjunction = Conjunction::new();
        conjunction.insert(key.to_string(), op);
        Self {
            alternatives: vec![conjunction],
        }
    }

    pub fn alternatives(&self) -> &[Conjunction] {
        &self.alternatives
    }

    /// Single-conjunction predicates can be used as one merged `where` object
    pub fn is_conjunction(&self) -> bool {
        self.alternatives.len() == 1
    }

    fn and(self, other: Predicate) -> Result<Predicate, ConversionError> {
        let count = self.alternatives.len() * other.alternatives.len();
        if count > MAX_ALTERNATIVES {
            return Err(too_complex());
        }
        let mut alternatives = Vec::with_capacity(count);
        for left in &self.alternatives {
            for right in &other.alternatives {
                let mut merged = left.clone();
                for (column, op) in right {
                    let op = match merged.remove(column) {
                        Some(existing) => existing.merged(op.clone()),
                        None => op.clone(),
                    };
                    merged.insert(column.clone(), op);
                }
                alternatives.push(merged);
            }
        }
        Ok(Predicate { alternatives })
    }

    /// Alternatives add up linearly here, so only `and` is capped
    fn or(mut self, other: Predicate) -> Predicate {
        self.alternatives.extend(other.alternatives);
        self
    }

    /// De Morgan: each alternative turns into a disjunction of negated
    /// columns, and the alternatives are joined with `and`.
    fn negate(self) -> Result<Predicate, ConversionError> {
        let mut result: Option<Predicate> = None;
        for conjunction in self.alternatives {
            let negated = Predicate {
                alternatives: conjunction
                    .into_iter()
                    .map(|(column, op)| {
                        let mut single = Conjunction::new();
                        single.insert(column, op.negated());
                        single
                    })
                    .collect(),
            };
            result = Some(match result {
                Some(acc) => acc.and(negated)?,
                None => negated,
            });
        }
        result.ok_or_else(too_complex)
    }

    /// Render as a SQL boolean expression with `$n` placeholders.
    pub fn to_sql(&self) -> SqlQuery {
        let mut binds = Vec::new();
        let alternatives: Vec<String> = self
            .alternatives
            .iter()
            .map(|conjunction| {
                let parts: Vec<String> = conjunction
                    .iter()
                    .map(|(column, op)| render_op(&quote_ident(column), op, &mut binds))
                    .collect();
                parts.join(" AND ")
            })
            .collect();

        let clause = if alternatives.len() == 1 {
            alternatives.into_iter().next().unwrap_or_default()
        } else {
            alternatives
                .into_iter()
                .map(|a| format!("({})", a))
                .collect::<Vec<_>>()
                .join(" OR ")
        };
        SqlQuery { clause, binds }
    }
}

impl Serialize for Predicate {
    /// One alternative serializes as an object, several as an array.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.alternatives.as_slice() {
            [single] => single.serialize(serializer),
            all => all.serialize(serializer),
        }
    }
}

/// Bind values for a parameterized query
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Text(String),
    Number(Decimal),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SqlQuery {
    pub clause: String,
    pub binds: Vec<BindValue>,
}

/// `ORDER BY` body, e.g. `"age" DESC, "name" ASC`
pub fn order_by(keys: &[SortKey]) -> String {
    keys.iter()
        .map(|key| {
            let direction = match key.direction {
                SortDirection::Ascending => "ASC",
                SortDirection::Descending => "DESC",
            };
            format!("{} {}", quote_ident(&key.field), direction)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn select_columns(fields: &[String]) -> String {
    if fields.is_empty() {
        return "*".to_string();
    }
    fields
        .iter()
        .map(|f| quote_ident(f))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Backend for RelationalBackend {
    type Output = Predicate;

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn transform(
        &self,
        node: FoldNode<'_, Predicate>,
        filter: &ResolvedFilter,
    ) -> Result<Predicate, ConversionError> {
        match node {
            FoldNode::Comparison(c) => comparison(c, filter),
            FoldNode::Logical {
                operator: LogicalOperator::And,
                left,
                right,
            } => left.and(right),
            FoldNode::Logical {
                operator: LogicalOperator::Or,
                left,
                right,
            } => Ok(left.or(right)),
            FoldNode::Not { expr, .. } => expr.negate(),
            FoldNode::Parenthesis { expr } => Ok(expr),
        }
    }
}

fn comparison(c: &Comparison, filter: &ResolvedFilter) -> Result<Predicate, ConversionError> {
    let field_type = filter.field_type(&c.key);

    if let FilterValue::Property(other) = &c.value {
        if c.operator.is_pattern() || c.operator == ComparisonOperator::Range {
            return Err(unsupported(&c.key, format!("'{}' cannot compare two columns", c.operator)));
        }
        return Ok(Predicate::column(
            &c.key,
            ColumnOp::Column {
                operator: c.operator,
                column: other.clone(),
            },
        ));
    }

    let value = |v: &FilterValue| sql_value(&c.key, v, field_type);
    let op = match c.operator {
        ComparisonOperator::Eq if c.value == FilterValue::Null => ColumnOp::IsNull,
        ComparisonOperator::Ne if c.value == FilterValue::Null => ColumnOp::IsNull.negated(),
        ComparisonOperator::Eq => ColumnOp::Equal(value(&c.value)?),
        ComparisonOperator::Ne => ColumnOp::Equal(value(&c.value)?).negated(),
        ComparisonOperator::Gt => ColumnOp::MoreThan(value(&c.value)?),
        ComparisonOperator::Gte => ColumnOp::MoreThanOrEqual(value(&c.value)?),
        ComparisonOperator::Lt => ColumnOp::LessThan(value(&c.value)?),
        ComparisonOperator::Lte => ColumnOp::LessThanOrEqual(value(&c.value)?),
        ComparisonOperator::Range => match &c.value {
            FilterValue::StringRange { from, to } => ColumnOp::Between(
                value(&FilterValue::String(from.clone()))?,
                value(&FilterValue::String(to.clone()))?,
            ),
            FilterValue::NumberRange { from, to } => {
                ColumnOp::Between(SqlValue::Number(*from), SqlValue::Number(*to))
            }
            other => {
                return Err(unsupported(
                    &c.key,
                    format!("{} is not a range", other.describe()),
                ))
            }
        },
        op => {
            let FilterValue::String(text) = &c.value else {
                return Err(unsupported(&c.key, format!("'{}' needs a string", op)));
            };
            let pattern = match op {
                ComparisonOperator::Like => text.clone(),
                ComparisonOperator::StartsWith => format!("{}%", escape_like_pattern(text)),
                ComparisonOperator::EndsWith => format!("%{}", escape_like_pattern(text)),
                _ => format!("%{}%", escape_like_pattern(text)),
            };
            ColumnOp::ILike(pattern)
        }
    };
    Ok(Predicate::column(&c.key, op))
}

fn sql_value(
    key: &str,
    value: &FilterValue,
    field_type: Option<FieldType>,
) -> Result<SqlValue, ConversionError> {
    match (value, field_type) {
        // Bound as UTC so the session time zone never shifts naive literals
        (FilterValue::String(s), Some(FieldType::Date)) => normalize_date(s)
            .map(SqlValue::Date)
            .ok_or_else(|| unsupported(key, format!("'{}' is not a date", s))),
        (FilterValue::String(s), Some(FieldType::Uuid)) => Ok(SqlValue::Uuid(s.clone())),
        (FilterValue::String(s), _) => Ok(SqlValue::Text(s.clone())),
        (FilterValue::Number(n), _) => Ok(SqlValue::Number(*n)),
        (FilterValue::Boolean(b), _) => Ok(SqlValue::Boolean(*b)),
        (other, _) => Err(unsupported(key, format!("{} cannot be bound", other.describe()))),
    }
}

fn render_op(column: &str, op: &ColumnOp, binds: &mut Vec<BindValue>) -> String {
    match op {
        ColumnOp::Equal(v) => format!("{} = {}", column, push_value(binds, v)),
        ColumnOp::IsNull => format!("{} IS NULL", column),
        ColumnOp::Not(inner) => match inner.as_ref() {
            ColumnOp::IsNull => format!("{} IS NOT NULL", column),
            ColumnOp::Equal(v) => format!("{} <> {}", column, push_value(binds, v)),
            other => format!("NOT ({})", render_op(column, other, binds)),
        },
        ColumnOp::MoreThan(v) => format!("{} > {}", column, push_value(binds, v)),
        ColumnOp::MoreThanOrEqual(v) => format!("{} >= {}", column, push_value(binds, v)),
        ColumnOp::LessThan(v) => format!("{} < {}", column, push_value(binds, v)),
        ColumnOp::LessThanOrEqual(v) => format!("{} <= {}", column, push_value(binds, v)),
        ColumnOp::ILike(pattern) => {
            binds.push(BindValue::Text(pattern.clone()));
            format!("{} ILIKE ${} ESCAPE E'\\\\'", column, binds.len())
        }
        ColumnOp::Between(from, to) => {
            let from = push_value(binds, from);
            let to = push_value(binds, to);
            format!("{} BETWEEN {} AND {}", column, from, to)
        }
        ColumnOp::Column { operator, column: other } => {
            let symbol = match operator {
                ComparisonOperator::Ne => "<>",
                ComparisonOperator::Gt => ">",
                ComparisonOperator::Gte => ">=",
                ComparisonOperator::Lt => "<",
                ComparisonOperator::Lte => "<=",
                _ => "=",
            };
            format!("{} {} {}", column, symbol, quote_ident(other))
        }
        ColumnOp::And(ops) => {
            let parts: Vec<String> = ops.iter().map(|op| render_op(column, op, binds)).collect();
            format!("({})", parts.join(" AND "))
        }
    }
}

/// Bind a value and return its placeholder, with a cast where the column
/// type is not text.
fn push_value(binds: &mut Vec<BindValue>, value: &SqlValue) -> String {
    let (bind, cast) = match value {
        SqlValue::Text(s) => (BindValue::Text(s.clone()), ""),
        SqlValue::Number(n) => (BindValue::Number(*n), ""),
        SqlValue::Boolean(b) => (BindValue::Boolean(*b), ""),
        SqlValue::Date(s) => (BindValue::Text(s.clone()), "::timestamptz"),
        SqlValue::Uuid(s) => (BindValue::Text(s.clone()), "::uuid"),
    };
    binds.push(bind);
    format!("${}{}", binds.len(), cast)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn escape_like_pattern(s: &str) -> String {
    // Escape SQL LIKE meta-characters so user input is treated literally.
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn too_complex() -> ConversionError {
    ConversionError::TooComplex {
        backend: BACKEND,
        max: MAX_ALTERNATIVES,
    }
}

fn unsupported(key: &str, reason: String) -> ConversionError {
    ConversionError::UnsupportedValue {
        backend: BACKEND,
        key: key.to_string(),
        reason,
    }
}
