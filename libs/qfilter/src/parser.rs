//! Filter parser - converts filter strings to a parse tree
//!
//! Recursive descent parser with one token of lookahead.
//! Precedence (lowest to highest):
//! 1. or
//! 2. and
//! 3. not / !
//! 4. comparison (=, != / <>, >, >=, <, <=, like, between .. and ..)
//! 5. term (parenthesized expression, property, literal)
//!
//! `and` and `or` are both left-associative. Chains are parsed in a loop,
//! so every `and` / `or` link counts towards the tree height limit along
//! with `not` and parentheses. On the right-hand side of `=`
//! a quoted string with an adjacent `*` becomes a wildcard match and
//! `a to b` / `a ... b` / `(a to b)` becomes a range.

use crate::ast::LogicalOperator;
use crate::convert::MAX_FOLD_DEPTH;
use crate::error::SyntaxError;
use crate::lexer::Lexer;
use crate::parse_tree::{CompareOperator, Operand, ParseNode, RangeBounds, Scalar};
use crate::token::{Token, TokenType};
use rust_decimal::Decimal;
use std::str::FromStr;

type Result<T> = std::result::Result<T, SyntaxError>;

/// A parsed subtree and its height; a lone comparison has height 0
type Parsed = (ParseNode, usize);

/// Default nesting limit for groups and negations
pub(crate) const DEFAULT_MAX_DEPTH: usize = 64;

/// Parser for filter expressions
pub(crate) struct Parser {
    lexer: Lexer,
    current_token: Token,
    /// End offset of the last consumed token, for wildcard adjacency
    previous_end: usize,
    recursion_depth: usize,
    max_depth: usize,
}

impl Parser {
    /// Create a new parser for the given input string
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Self {
            lexer,
            current_token,
            previous_end: 0,
            recursion_depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Advance to the next token, returning the consumed one
    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        let previous = std::mem::replace(&mut self.current_token, next);
        self.previous_end = previous.end;
        previous
    }

    /// Check if current token matches the given type
    fn check(&self, token_type: TokenType) -> bool {
        self.current_token.is(token_type)
    }

    /// True when the current token starts right where the previous one ended
    fn is_adjacent(&self) -> bool {
        self.current_token.position == self.previous_end
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> SyntaxError {
        self.lexer.error_at(position, message)
    }

    /// Error at the current token; lexical errors report their own message
    fn unexpected(&self, expected: &str) -> SyntaxError {
        let token = &self.current_token;
        match token.token_type {
            TokenType::Error => self.error_at(token.position, token.value.clone()),
            TokenType::Eof => self.error_at(
                token.position,
                format!("Expected {}, but reached end of input", expected),
            ),
            other => self.error_at(
                token.position,
                format!("Expected {}, got {}", expected, other.describe()),
            ),
        }
    }

    /// Expect a specific token type and advance
    fn expect(&mut self, token_type: TokenType, expected: &str) -> Result<Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Parse the entire expression (top-level entry point)
    pub fn parse(&mut self) -> Result<ParseNode> {
        if self.check(TokenType::Eof) {
            return Err(self.error_at(0, "Empty filter expression"));
        }

        let (expr, _) = self.parse_or_expression()?;

        // Ensure we've consumed all input
        if !self.check(TokenType::Eof) {
            return Err(self.unexpected("'and', 'or' or end of input"));
        }

        Ok(expr)
    }

    /// Check recursion depth and increment
    fn check_recursion_depth(&mut self) -> Result<()> {
        self.recursion_depth += 1;
        if self.recursion_depth > self.max_depth {
            return Err(self.error_at(
                self.current_token.position,
                format!(
                    "Expression too deeply nested (max depth: {})",
                    self.max_depth
                ),
            ));
        }
        Ok(())
    }

    /// Decrement recursion depth
    fn decrement_recursion_depth(&mut self) {
        self.recursion_depth -= 1;
    }

    /// Height of a node one level above `child`, rejected past the fold limit
    fn raise(&self, child: usize, position: usize) -> Result<usize> {
        let height = child + 1;
        if height > MAX_FOLD_DEPTH {
            return Err(self.error_at(
                position,
                format!("Filter too deeply nested (max depth: {})", MAX_FOLD_DEPTH),
            ));
        }
        Ok(height)
    }

    /// Parse or expression: expression 'or' expression
    fn parse_or_expression(&mut self) -> Result<Parsed> {
        let (mut left, mut height) = self.parse_and_expression()?;

        while self.check(TokenType::Or) {
            let position = self.advance().position; // Skip 'or'
            let (right, right_height) = self.parse_and_expression()?;
            height = self.raise(height.max(right_height), position)?;
            left = ParseNode::Logical {
                operator: LogicalOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok((left, height))
    }

    /// Parse and expression: expression 'and' expression
    fn parse_and_expression(&mut self) -> Result<Parsed> {
        let (mut left, mut height) = self.parse_unary_expression()?;

        while self.check(TokenType::And) {
            let position = self.advance().position; // Skip 'and'
            let (right, right_height) = self.parse_unary_expression()?;
            height = self.raise(height.max(right_height), position)?;
            left = ParseNode::Logical {
                operator: LogicalOperator::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok((left, height))
    }

    /// Parse unary expression: ('not' | '!') expression
    fn parse_unary_expression(&mut self) -> Result<Parsed> {
        self.check_recursion_depth()?;
        let parsed = if self.check(TokenType::Not) || self.check(TokenType::Bang) {
            let position = self.advance().position;
            let (inner, height) = self.parse_unary_expression()?;
            (ParseNode::Not(Box::new(inner)), self.raise(height, position)?)
        } else {
            self.parse_term()?
        };
        self.decrement_recursion_depth();
        Ok(parsed)
    }

    /// Parse term: '(' expression ')' | comparison
    fn parse_term(&mut self) -> Result<Parsed> {
        match self.current_token.token_type {
            TokenType::OpenParen => {
                let position = self.advance().position; // Skip '('
                let (inner, height) = self.parse_or_expression()?;
                self.expect(TokenType::CloseParen, "')'")?;
                Ok((ParseNode::Group(Box::new(inner)), self.raise(height, position)?))
            }
            TokenType::Star => Err(self.error_at(
                self.current_token.position,
                "Wildcard patterns are only allowed on the right-hand side of '='",
            )),
            _ => Ok((self.parse_comparison()?, 0)),
        }
    }

    /// Parse comparison: operand operator right-hand-side
    fn parse_comparison(&mut self) -> Result<ParseNode> {
        let start = self.current_token.position;
        let left = self.parse_operand("a property or value")?;

        if self.check(TokenType::Star) {
            return Err(self.error_at(
                self.current_token.position,
                "Wildcard patterns are only allowed on the right-hand side of '='",
            ));
        }
        if self.check(TokenType::To) || self.check(TokenType::Ellipsis) {
            return Err(self.error_at(
                self.current_token.position,
                "A range is only allowed on the right-hand side of '='",
            ));
        }

        let operator = match self.current_token.token_type {
            TokenType::Equal => {
                self.advance();
                return self.parse_equal_rhs(left, start);
            }
            TokenType::Like => {
                self.advance();
                let property = self.require_property(left, start, "'like'")?;
                let pattern =
                    self.expect(TokenType::StringLiteral, "a quoted pattern after 'like'")?;
                return Ok(ParseNode::Like {
                    property,
                    pattern: pattern.value,
                });
            }
            TokenType::Between => {
                self.advance();
                let property = self.require_property(left, start, "'between'")?;
                let from_pos = self.current_token.position;
                let from = self.parse_operand("a lower bound after 'between'")?;
                self.expect(TokenType::And, "'and' between the range bounds")?;
                let to = self.parse_operand("an upper bound")?;
                let bounds = self.range_bounds(from, to, from_pos)?;
                return Ok(ParseNode::Range { property, bounds });
            }
            TokenType::NotEqual => CompareOperator::NotEqual,
            TokenType::GreaterThan => CompareOperator::Greater,
            TokenType::GreaterThanOrEqual => CompareOperator::GreaterOrEqual,
            TokenType::LessThan => CompareOperator::Less,
            TokenType::LessThanOrEqual => CompareOperator::LessOrEqual,
            _ => return Err(self.unexpected("a comparison operator")),
        };

        let op_token = self.advance();
        if self.check(TokenType::Star) {
            return Err(self.error_at(
                self.current_token.position,
                "Wildcard patterns are only allowed with '='",
            ));
        }
        let right = self.parse_operand(&format!("a value after '{}'", op_token.value))?;
        if self.check(TokenType::Star) && self.is_adjacent() {
            return Err(self.error_at(
                self.current_token.position,
                "Wildcard patterns are only allowed with '='",
            ));
        }
        self.compare(left, operator, right, start)
    }

    /// Parse what follows '=': a wildcard pattern, a range or a plain operand
    fn parse_equal_rhs(&mut self, left: Operand, start: usize) -> Result<ParseNode> {
        match self.current_token.token_type {
            TokenType::Star => {
                self.advance(); // Skip leading '*'
                if !self.check(TokenType::StringLiteral) || !self.is_adjacent() {
                    return Err(self.unexpected("a quoted string immediately after '*'"));
                }
                let text = self.advance().value;
                let trailing = self.eat_adjacent_star();
                let property = self.require_property(left, start, "A wildcard pattern")?;
                Ok(ParseNode::Wildcard {
                    property,
                    text,
                    leading: true,
                    trailing,
                })
            }
            TokenType::OpenParen => {
                self.advance(); // Skip '('
                let from_pos = self.current_token.position;
                let from = self.parse_operand("a lower bound")?;
                if !(self.check(TokenType::To) || self.check(TokenType::Ellipsis)) {
                    return Err(self.unexpected("'to' or '...' inside a parenthesized range"));
                }
                self.advance();
                let to = self.parse_operand("an upper bound")?;
                self.expect(TokenType::CloseParen, "')' to close the range")?;
                let property = self.require_property(left, start, "A range")?;
                let bounds = self.range_bounds(from, to, from_pos)?;
                Ok(ParseNode::Range { property, bounds })
            }
            _ => {
                let right_pos = self.current_token.position;
                let right = self.parse_operand("a value after '='")?;

                if self.check(TokenType::Star) && self.is_adjacent() {
                    let Operand::Scalar(Scalar::String(text)) = right else {
                        return Err(self.error_at(
                            self.current_token.position,
                            "Wildcards can only be attached to quoted strings",
                        ));
                    };
                    self.advance(); // Skip trailing '*'
                    let property = self.require_property(left, start, "A wildcard pattern")?;
                    return Ok(ParseNode::Wildcard {
                        property,
                        text,
                        leading: false,
                        trailing: true,
                    });
                }

                if self.check(TokenType::To) || self.check(TokenType::Ellipsis) {
                    self.advance();
                    let to = self.parse_operand("an upper bound")?;
                    let property = self.require_property(left, start, "A range")?;
                    let bounds = self.range_bounds(right, to, right_pos)?;
                    return Ok(ParseNode::Range { property, bounds });
                }

                self.compare(left, CompareOperator::Equal, right, start)
            }
        }
    }

    fn eat_adjacent_star(&mut self) -> bool {
        if self.check(TokenType::Star) && self.is_adjacent() {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Parse a single operand: property name or literal
    fn parse_operand(&mut self, expected: &str) -> Result<Operand> {
        let operand = match self.current_token.token_type {
            TokenType::Identifier => Operand::Property(self.current_token.value.clone()),
            TokenType::StringLiteral => {
                Operand::Scalar(Scalar::String(self.current_token.value.clone()))
            }
            TokenType::NumberLiteral => {
                let number = Decimal::from_str(&self.current_token.value).map_err(|_| {
                    self.error_at(
                        self.current_token.position,
                        format!("Invalid number literal '{}'", self.current_token.value),
                    )
                })?;
                Operand::Scalar(Scalar::Number(number))
            }
            TokenType::True => Operand::Scalar(Scalar::Boolean(true)),
            TokenType::False => Operand::Scalar(Scalar::Boolean(false)),
            TokenType::Null => Operand::Scalar(Scalar::Null),
            _ => return Err(self.unexpected(expected)),
        };
        self.advance();
        Ok(operand)
    }

    fn require_property(&self, left: Operand, start: usize, what: &str) -> Result<String> {
        match left {
            Operand::Property(name) => Ok(name),
            Operand::Scalar(_) => Err(self.error_at(
                start,
                format!("{} requires a property on the left-hand side", what),
            )),
        }
    }

    /// Put the property on one side; a comparison of two literals is rejected
    fn compare(
        &self,
        left: Operand,
        operator: CompareOperator,
        right: Operand,
        start: usize,
    ) -> Result<ParseNode> {
        match (left, right) {
            (Operand::Property(property), operand) => Ok(ParseNode::Compare {
                property,
                operator,
                operand,
                reversed: false,
            }),
            (Operand::Scalar(scalar), Operand::Property(property)) => Ok(ParseNode::Compare {
                property,
                operator,
                operand: Operand::Scalar(scalar),
                reversed: true,
            }),
            (Operand::Scalar(_), Operand::Scalar(_)) => Err(self.error_at(
                start,
                "A comparison needs at least one property reference",
            )),
        }
    }

    fn range_bounds(&self, from: Operand, to: Operand, position: usize) -> Result<RangeBounds> {
        let (Operand::Scalar(from), Operand::Scalar(to)) = (from, to) else {
            return Err(self.error_at(position, "Range bounds must be literal values"));
        };
        match (from, to) {
            (Scalar::String(a), Scalar::String(b)) => Ok(RangeBounds::String(a, b)),
            (Scalar::Number(a), Scalar::Number(b)) => Ok(RangeBounds::Number(a, b)),
            (Scalar::Boolean(a), Scalar::Boolean(b)) => Ok(RangeBounds::Boolean(a, b)),
            (Scalar::Null, _) | (_, Scalar::Null) => {
                Err(self.error_at(position, "Range bounds cannot be null"))
            }
            _ => Err(self.error_at(position, "Range bounds must be of the same kind")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<ParseNode> {
        Parser::new(input).parse()
    }

    #[test]
    fn literal_on_the_left_is_marked_reversed() {
        match parse("18 < age").unwrap() {
            ParseNode::Compare {
                property,
                operator,
                reversed,
                ..
            } => {
                assert_eq!(property, "age");
                assert_eq!(operator, CompareOperator::Less);
                assert!(reversed);
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn detached_star_is_not_a_wildcard() {
        let err = parse("name = 'abc' *").unwrap_err();
        assert_eq!(err.column, 14);
    }

    #[test]
    fn parenthesized_range() {
        match parse("age = (1 to 10)").unwrap() {
            ParseNode::Range { property, bounds } => {
                assert_eq!(property, "age");
                assert_eq!(
                    bounds,
                    RangeBounds::Number(Decimal::from(1), Decimal::from(10))
                );
            }
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[test]
    fn depth_limit_is_enforced() {
        let input = format!("{}a = 1{}", "(".repeat(5), ")".repeat(5));
        assert!(Parser::new(&input).with_max_depth(10).parse().is_ok());
        assert!(Parser::new(&input).with_max_depth(3).parse().is_err());
    }

    fn chain(terms: usize, operator: &str) -> String {
        (0..terms)
            .map(|i| format!("a = {}", i))
            .collect::<Vec<_>>()
            .join(operator)
    }

    #[test]
    fn long_chains_count_towards_height() {
        assert!(parse(&chain(MAX_FOLD_DEPTH + 1, " or ")).is_ok());

        let err = parse(&chain(MAX_FOLD_DEPTH + 2, " and ")).unwrap_err();
        assert!(err.message.contains("too deeply nested"), "{}", err.message);
        // Reported at the first link past the limit
        let offset = chain(MAX_FOLD_DEPTH + 1, " and ").chars().count() + 1;
        assert_eq!(err.column, offset + 1);

        // Thousands of links fail fast instead of building the tree
        assert!(parse(&chain(5000, " or ")).is_err());
    }

    #[test]
    fn groups_and_negations_add_to_chain_height() {
        let inner = chain(MAX_FOLD_DEPTH, " or ");
        assert!(parse(&format!("({})", inner)).is_ok());
        assert!(parse(&format!("not ({})", inner)).is_err());
    }
}
