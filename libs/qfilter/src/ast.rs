//! Published filter AST
//!
//! `FilterNode` is the closed, backend-agnostic tree every later stage works
//! on. After building, every comparison has its property on the `key` side;
//! source positions are not retained, so the tree is freely serializable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// AST node representing a filter expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FilterNode {
    /// `key op value`
    Comparison(Comparison),

    /// `left and right`, `left or right`
    Logical {
        operator: LogicalOperator,
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },

    /// `not expr`
    Unary {
        operator: UnaryOperator,
        expr: Box<FilterNode>,
    },

    /// `( expr )`, kept so the original grouping can be reproduced
    Parenthesis { expr: Box<FilterNode> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub operator: ComparisonOperator,
    pub key: String,
    pub value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Range,
    StartsWith,
    EndsWith,
    Contains,
}

impl ComparisonOperator {
    /// Operator to use when the operands are swapped (`18 < age` is `age > 18`)
    pub fn mirrored(self) -> Self {
        match self {
            Self::Gt => Self::Lt,
            Self::Gte => Self::Lte,
            Self::Lt => Self::Gt,
            Self::Lte => Self::Gte,
            other => other,
        }
    }

    /// String pattern operators
    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            Self::Like | Self::StartsWith | Self::EndsWith | Self::Contains
        )
    }

    /// Operators that need an ordered field type
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte | Self::Range)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Range => "range",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Contains => "contains",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOperator {
    Not,
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FilterValue {
    String(String),
    Number(Decimal),
    Boolean(bool),
    Null,
    StringRange { from: String, to: String },
    NumberRange { from: Decimal, to: Decimal },
    /// Parsed so the resolver can reject it with a field-specific error
    BooleanRange { from: bool, to: bool },
    /// Another property of the same entity
    Property(String),
}

impl FilterValue {
    pub fn as_property(&self) -> Option<&str> {
        match self {
            Self::Property(name) => Some(name),
            _ => None,
        }
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Self::String(s) => format!("'{}'", s),
            Self::Number(n) => n.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Null => "null".to_string(),
            Self::StringRange { from, to } => format!("'{}' to '{}'", from, to),
            Self::NumberRange { from, to } => format!("{} to {}", from, to),
            Self::BooleanRange { from, to } => format!("{} to {}", from, to),
            Self::Property(name) => format!("property '{}'", name),
        }
    }
}

impl FilterNode {
    pub fn comparison(
        operator: ComparisonOperator,
        key: impl Into<String>,
        value: FilterValue,
    ) -> Self {
        Self::Comparison(Comparison {
            operator,
            key: key.into(),
            value,
        })
    }

    pub fn and(left: FilterNode, right: FilterNode) -> Self {
        Self::Logical {
            operator: LogicalOperator::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: FilterNode, right: FilterNode) -> Self {
        Self::Logical {
            operator: LogicalOperator::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(expr: FilterNode) -> Self {
        Self::Unary {
            operator: UnaryOperator::Not,
            expr: Box::new(expr),
        }
    }

    pub fn group(expr: FilterNode) -> Self {
        Self::Parenthesis {
            expr: Box::new(expr),
        }
    }

    /// Skip any number of enclosing parentheses
    pub fn unwrap_parens(&self) -> &FilterNode {
        let mut node = self;
        while let FilterNode::Parenthesis { expr } = node {
            node = expr;
        }
        node
    }

    /// All comparisons in depth-first, left-to-right order
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                FilterNode::Comparison(c) => out.push(c),
                FilterNode::Logical { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
                FilterNode::Unary { expr, .. } | FilterNode::Parenthesis { expr } => {
                    stack.push(expr)
                }
            }
        }
        out
    }
}

impl fmt::Display for FilterNode {
    /// Canonical filter text; parsing it yields the same tree
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Comparison(c) => write!(f, "{}", c),
            FilterNode::Logical {
                operator,
                left,
                right,
            } => write!(f, "{} {} {}", left, operator, right),
            FilterNode::Unary { expr, .. } => write!(f, "not {}", expr),
            FilterNode::Parenthesis { expr } => write!(f, "({})", expr),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = &self.key;
        match (&self.operator, &self.value) {
            (ComparisonOperator::StartsWith, FilterValue::String(s)) => {
                write!(f, "{} = {}*", key, quote(s))
            }
            (ComparisonOperator::EndsWith, FilterValue::String(s)) => {
                write!(f, "{} = *{}", key, quote(s))
            }
            (ComparisonOperator::Contains, FilterValue::String(s)) => {
                write!(f, "{} = *{}*", key, quote(s))
            }
            (ComparisonOperator::Like, value) => write!(f, "{} like {}", key, render(value)),
            (ComparisonOperator::Range, value) => write!(f, "{} = {}", key, render(value)),
            (op, value) => {
                let symbol = match op {
                    ComparisonOperator::Eq => "=",
                    ComparisonOperator::Ne => "!=",
                    ComparisonOperator::Gt => ">",
                    ComparisonOperator::Gte => ">=",
                    ComparisonOperator::Lt => "<",
                    ComparisonOperator::Lte => "<=",
                    // Pattern operators with a non-string value fall back to equality text
                    _ => "=",
                };
                write!(f, "{} {} {}", key, symbol, render(value))
            }
        }
    }
}

fn quote(s: &str) -> String {
    if s.contains('\'') {
        format!("\"{}\"", s)
    } else {
        format!("'{}'", s)
    }
}

fn render(value: &FilterValue) -> String {
    match value {
        FilterValue::String(s) => quote(s),
        FilterValue::Number(n) => n.to_string(),
        FilterValue::Boolean(b) => b.to_string(),
        FilterValue::Null => "null".to_string(),
        FilterValue::StringRange { from, to } => format!("{} to {}", quote(from), quote(to)),
        FilterValue::NumberRange { from, to } => format!("{} to {}", from, to),
        FilterValue::BooleanRange { from, to } => format!("{} to {}", from, to),
        FilterValue::Property(name) => name.clone(),
    }
}
