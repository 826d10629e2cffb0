//! Backend conversion
//!
//! The fold over the filter tree lives here; each backend only supplies a
//! `transform` for one node whose children have already been converted.

pub mod document;
pub mod passthrough;
pub mod relational;

pub use document::{convert_document, DocumentBackend, DocumentExpr};
pub use passthrough::PassThrough;
pub use relational::{
    BindValue, ColumnOp, Conjunction, Predicate, RelationalBackend, SqlQuery, SqlValue,
};

use crate::ast::{Comparison, FilterNode, LogicalOperator};
use crate::error::ConversionError;
use crate::resolver::ResolvedFilter;

/// Hard cap on fold recursion; the parser refuses taller trees up front
pub const MAX_FOLD_DEPTH: usize = 256;

/// One filter node with its children already converted
#[derive(Debug)]
pub enum FoldNode<'a, T> {
    Comparison(&'a Comparison),
    Logical {
        operator: LogicalOperator,
        left: T,
        right: T,
    },
    Not {
        expr: T,
        /// The unconverted operand, for backends that need its shape
        inner: &'a FilterNode,
    },
    Parenthesis {
        expr: T,
    },
}

/// A storage backend's conversion of a single node
pub trait Backend {
    type Output;

    /// Short name used in error messages
    fn name(&self) -> &'static str;

    fn transform(
        &self,
        node: FoldNode<'_, Self::Output>,
        filter: &ResolvedFilter,
    ) -> Result<Self::Output, ConversionError>;
}

/// Convert a resolved filter bottom-up with `backend`.
pub fn convert<B: Backend>(
    filter: &ResolvedFilter,
    backend: &B,
) -> Result<B::Output, ConversionError> {
    let output = fold(filter.root(), filter, backend, 0)?;
    tracing::debug!(backend = backend.name(), entity = filter.entity(), "Filter converted");
    Ok(output)
}

fn fold<B: Backend>(
    node: &FilterNode,
    filter: &ResolvedFilter,
    backend: &B,
    depth: usize,
) -> Result<B::Output, ConversionError> {
    if depth > MAX_FOLD_DEPTH {
        return Err(ConversionError::TooDeep {
            max: MAX_FOLD_DEPTH,
        });
    }

    let folded = match node {
        FilterNode::Comparison(c) => FoldNode::Comparison(c),
        FilterNode::Logical {
            operator,
            left,
            right,
        } => FoldNode::Logical {
            operator: *operator,
            left: fold(left, filter, backend, depth + 1)?,
            right: fold(right, filter, backend, depth + 1)?,
        },
        FilterNode::Unary { expr, .. } => FoldNode::Not {
            expr: fold(expr, filter, backend, depth + 1)?,
            inner: expr,
        },
        FilterNode::Parenthesis { expr } => FoldNode::Parenthesis {
            expr: fold(expr, filter, backend, depth + 1)?,
        },
    };
    backend.transform(folded, filter)
}
