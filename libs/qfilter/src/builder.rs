//! Parse tree → AST
//!
//! A total transform: the parse tree only describes valid comparisons, so
//! building never fails. Operands written as `literal op property` are
//! swapped and the operator mirrored so `key` always names the property.

use crate::ast::{ComparisonOperator, FilterNode, FilterValue};
use crate::parse_tree::{CompareOperator, Operand, ParseNode, RangeBounds, Scalar};

pub(crate) fn build(node: ParseNode) -> FilterNode {
    match node {
        ParseNode::Logical {
            operator,
            left,
            right,
        } => FilterNode::Logical {
            operator,
            left: Box::new(build(*left)),
            right: Box::new(build(*right)),
        },
        ParseNode::Not(inner) => FilterNode::not(build(*inner)),
        ParseNode::Group(inner) => FilterNode::group(build(*inner)),
        ParseNode::Compare {
            property,
            operator,
            operand,
            reversed,
        } => {
            let operator = comparison_operator(operator);
            let operator = if reversed {
                operator.mirrored()
            } else {
                operator
            };
            let value = match operand {
                Operand::Property(name) => FilterValue::Property(name),
                Operand::Scalar(scalar) => scalar_value(scalar),
            };
            FilterNode::comparison(operator, property, value)
        }
        ParseNode::Wildcard {
            property,
            text,
            leading,
            trailing,
        } => {
            let operator = match (leading, trailing) {
                (true, true) => ComparisonOperator::Contains,
                (true, false) => ComparisonOperator::EndsWith,
                _ => ComparisonOperator::StartsWith,
            };
            FilterNode::comparison(operator, property, FilterValue::String(text))
        }
        ParseNode::Like { property, pattern } => {
            FilterNode::comparison(ComparisonOperator::Like, property, FilterValue::String(pattern))
        }
        ParseNode::Range { property, bounds } => {
            let value = match bounds {
                RangeBounds::String(from, to) => FilterValue::StringRange { from, to },
                RangeBounds::Number(from, to) => FilterValue::NumberRange { from, to },
                RangeBounds::Boolean(from, to) => FilterValue::BooleanRange { from, to },
            };
            FilterNode::comparison(ComparisonOperator::Range, property, value)
        }
    }
}

fn comparison_operator(operator: CompareOperator) -> ComparisonOperator {
    match operator {
        CompareOperator::Equal => ComparisonOperator::Eq,
        CompareOperator::NotEqual => ComparisonOperator::Ne,
        CompareOperator::Greater => ComparisonOperator::Gt,
        CompareOperator::GreaterOrEqual => ComparisonOperator::Gte,
        CompareOperator::Less => ComparisonOperator::Lt,
        CompareOperator::LessOrEqual => ComparisonOperator::Lte,
    }
}

fn scalar_value(scalar: Scalar) -> FilterValue {
    match scalar {
        Scalar::String(s) => FilterValue::String(s),
        Scalar::Number(n) => FilterValue::Number(n),
        Scalar::Boolean(b) => FilterValue::Boolean(b),
        Scalar::Null => FilterValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn reversed_comparison_is_mirrored() {
        let node = build(ParseNode::Compare {
            property: "age".into(),
            operator: CompareOperator::Less,
            operand: Operand::Scalar(Scalar::Number(Decimal::from(18))),
            reversed: true,
        });
        assert_eq!(
            node,
            FilterNode::comparison(
                ComparisonOperator::Gt,
                "age",
                FilterValue::Number(Decimal::from(18))
            )
        );
    }

    #[test]
    fn wildcard_sides_pick_the_operator() {
        let wildcard = |leading, trailing| {
            build(ParseNode::Wildcard {
                property: "name".into(),
                text: "abc".into(),
                leading,
                trailing,
            })
        };
        let op = |node: FilterNode| match node {
            FilterNode::Comparison(c) => c.operator,
            other => panic!("expected comparison, got {:?}", other),
        };
        assert_eq!(op(wildcard(false, true)), ComparisonOperator::StartsWith);
        assert_eq!(op(wildcard(true, false)), ComparisonOperator::EndsWith);
        assert_eq!(op(wildcard(true, true)), ComparisonOperator::Contains);
    }
}
