//! Sort parameter: `-age, name asc, +email`
//!
//! A leading `-` or a trailing `desc` sorts descending; `+`, `asc` or nothing
//! sorts ascending. Each field may appear once.

use crate::error::{SemanticError, SemanticErrors, SyntaxError};
use crate::scanner::Scanner;
use crate::schema::EntitySchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

pub fn parse_order(input: &str) -> Result<Vec<SortKey>, SyntaxError> {
    let mut seen = HashSet::new();
    Scanner::new(input).comma_list(|s| {
        s.skip_ws();
        let prefix = match s.peek_char() {
            Some('-') => {
                s.consume_char();
                Some(SortDirection::Descending)
            }
            Some('+') => {
                s.consume_char();
                Some(SortDirection::Ascending)
            }
            _ => None,
        };

        s.skip_ws();
        let start = s.position();
        let field = s
            .try_parse_name()
            .ok_or_else(|| s.error("Expected a field name"))?;

        let suffix = if s.eat_keyword("desc") {
            Some(SortDirection::Descending)
        } else if s.eat_keyword("asc") {
            Some(SortDirection::Ascending)
        } else {
            None
        };

        let direction = match (prefix, suffix) {
            (Some(a), Some(b)) if a != b => {
                return Err(s.error_at(start, format!("Conflicting sort direction for '{}'", field)))
            }
            (a, b) => a.or(b).unwrap_or_default(),
        };
        if !seen.insert(field.clone()) {
            return Err(s.error_at(start, format!("Field '{}' listed twice", field)));
        }
        Ok(SortKey { field, direction })
    })
}

/// Every sort field must exist on the entity
pub fn resolve_order(keys: &[SortKey], schema: &EntitySchema) -> Result<(), SemanticErrors> {
    let errors: Vec<SemanticError> = keys
        .iter()
        .filter(|k| schema.get(&k.field).is_none())
        .map(|k| SemanticError::UnknownField {
            name: k.field.clone(),
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SemanticErrors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefix_and_suffix_directions() {
        let keys = parse_order("-age, name ASC, +email,created_at desc").unwrap();
        assert_eq!(
            keys,
            vec![
                SortKey::desc("age"),
                SortKey::asc("name"),
                SortKey::asc("email"),
                SortKey::desc("created_at"),
            ]
        );
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(parse_order("  ").unwrap().is_empty());
    }

    #[test]
    fn rejects_duplicates_and_conflicts() {
        let err = parse_order("age, -age").unwrap_err();
        assert_eq!(err.column, 7);
        assert!(parse_order("-age asc").is_err());
        assert!(parse_order("age,").is_err());
        assert!(parse_order("age name").is_err());
    }
}
