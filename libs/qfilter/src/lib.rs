//! Query filter language
//!
//! Filters arrive as single query-string values such as
//! `age >= 18 and name = 'jo'*`. This crate turns them into backend-native
//! queries:
//!
//! ```text
//! filter string
//!      |
//!   Lexer + Parser -> parse tree
//!      |
//!   Builder -> FilterNode (published AST)
//!      |
//!   Resolver (entity field table) -> ResolvedFilter
//!      |
//!   Authorization (caller identity, field read policies)
//!      |
//!   Backend conversion -> pass-through / document / relational output
//! ```
//!
//! [`FilterPipeline`] runs all stages for one request; the individual stages
//! are public as well.

pub mod ast;
pub mod authorize;
mod builder;
pub mod config;
pub mod convert;
pub mod error;
pub mod eval;
mod lexer;
pub mod order;
mod parse_tree;
mod parser;
pub mod pipeline;
pub mod resolver;
mod scanner;
pub mod schema;
pub mod select;
mod token;

pub use ast::{
    Comparison, ComparisonOperator, FilterNode, FilterValue, LogicalOperator, UnaryOperator,
};
pub use authorize::{authorize, authorize_fields, Identity};
pub use config::FilterConfig;
pub use convert::{convert, Backend, DocumentBackend, FoldNode, PassThrough, RelationalBackend};
pub use error::{
    AuthorizationError, ConversionError, Denial, Error, ErrorResponse, Result, SemanticError,
    SemanticErrors, SyntaxError, ValidationIssue,
};
pub use order::{parse_order, resolve_order, SortDirection, SortKey};
pub use pipeline::{FilterPipeline, RequestContext};
pub use resolver::{resolve, ResolvedFilter};
pub use schema::{EntityRegistry, EntitySchema, FieldAccess, FieldPolicy, FieldType, RoleSet};
pub use select::{parse_select, resolve_select};

/// Parse a filter string into its AST with the default nesting limit.
pub fn parse_filter(input: &str) -> std::result::Result<FilterNode, SyntaxError> {
    let tree = parser::Parser::new(input).parse()?;
    Ok(builder::build(tree))
}

/// Parse a filter string, enforcing the length and nesting limits of `config`.
pub fn parse_filter_with(input: &str, config: &FilterConfig) -> Result<FilterNode> {
    let length = input.chars().count();
    if length > config.max_input_length {
        return Err(Error::InputTooLong {
            length,
            max: config.max_input_length,
        });
    }
    let tree = parser::Parser::new(input)
        .with_max_depth(config.max_depth)
        .parse()?;
    let node = builder::build(tree);
    tracing::debug!(comparisons = node.comparisons().len(), "Filter parsed");
    Ok(node)
}
