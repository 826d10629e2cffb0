use super::{Backend, FoldNode};
use crate::ast::FilterNode;
use crate::error::ConversionError;
use crate::resolver::ResolvedFilter;

/// Hands the filter tree back unchanged, for stores that interpret it
/// themselves (see [`FilterNode::matches`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Backend for PassThrough {
    type Output = FilterNode;

    fn name(&self) -> &'static str {
        "pass-through"
    }

    fn transform(
        &self,
        node: FoldNode<'_, FilterNode>,
        _filter: &ResolvedFilter,
    ) -> Result<FilterNode, ConversionError> {
        Ok(match node {
            FoldNode::Comparison(c) => FilterNode::Comparison(c.clone()),
            FoldNode::Logical {
                operator,
                left,
                right,
            } => FilterNode::Logical {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
            FoldNode::Not { expr, .. } => FilterNode::not(expr),
            FoldNode::Parenthesis { expr } => FilterNode::group(expr),
        })
    }
}
