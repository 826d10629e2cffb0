//! Grammar-shaped parse tree
//!
//! Produced by the parser and consumed by the builder. Every comparison form
//! the grammar accepts has its own variant, so the tree cannot describe a
//! comparison without a property or a wildcard on the wrong side.

use crate::ast::LogicalOperator;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParseNode {
    Logical {
        operator: LogicalOperator,
        left: Box<ParseNode>,
        right: Box<ParseNode>,
    },
    Not(Box<ParseNode>),
    Group(Box<ParseNode>),
    /// `prop op operand` or, with `reversed`, `operand op prop`
    Compare {
        property: String,
        operator: CompareOperator,
        operand: Operand,
        reversed: bool,
    },
    /// `prop = 'abc'*`, `prop = *'abc'`, `prop = *'abc'*`
    Wildcard {
        property: String,
        text: String,
        leading: bool,
        trailing: bool,
    },
    /// `prop like 'pattern'`
    Like { property: String, pattern: String },
    /// `prop = a to b`, `prop = (a ... b)`, `prop between a and b`
    Range { property: String, bounds: RangeBounds },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOperator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Property(String),
    Scalar(Scalar),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scalar {
    String(String),
    Number(Decimal),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RangeBounds {
    String(String, String),
    Number(Decimal, Decimal),
    Boolean(bool, bool),
}
