//! Projection parameter: `id, email, name`

use crate::error::{SemanticError, SemanticErrors, SyntaxError};
use crate::scanner::Scanner;
use crate::schema::{EntitySchema, FieldAccess};
use std::collections::HashSet;

pub fn parse_select(input: &str) -> Result<Vec<String>, SyntaxError> {
    let mut seen = HashSet::new();
    Scanner::new(input).comma_list(|s| {
        s.skip_ws();
        let start = s.position();
        let field = s
            .try_parse_name()
            .ok_or_else(|| s.error("Expected a field name"))?;
        if !seen.insert(field.clone()) {
            return Err(s.error_at(start, format!("Field '{}' listed twice", field)));
        }
        Ok(field)
    })
}

/// Every selected field must exist; write-only fields cannot be projected
pub fn resolve_select(fields: &[String], schema: &EntitySchema) -> Result<(), SemanticErrors> {
    let errors: Vec<SemanticError> = fields
        .iter()
        .filter(|name| {
            schema
                .get(name)
                .map_or(true, |f| f.access == FieldAccess::WriteOnly)
        })
        .map(|name| SemanticError::UnknownField { name: name.clone() })
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
    fn parses_field_list() {
        assert_eq!(
            parse_select(" id ,email,name ").unwrap(),
            vec!["id".to_string(), "email".to_string(), "name".to_string()]
        );
        assert!(parse_select("").unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_names() {
        assert!(parse_select("1id").is_err());
        assert!(parse_select("id,,email").is_err());
        assert!(parse_select("id, id").is_err());
    }
}
