//! Semantic resolution against the `User` entity

use qfilter::{resolve, FieldType, SemanticError};

mod test_support;
use test_support::{parse, resolved, user_schema};

fn errors(input: &str) -> Vec<SemanticError> {
    resolve(parse(input), user_schema())
        .expect_err("expected semantic errors")
        .0
}

#[test]
fn test_valid_filters_resolve_with_field_types() {
    let filter = resolved("age >= 18 and name = 'jo'* and created_at > '2024-01-01'");
    assert_eq!(filter.entity(), "User");
    assert_eq!(filter.field_type("age"), Some(FieldType::Integer));
    assert_eq!(filter.field_type("name"), Some(FieldType::String));
    assert_eq!(filter.field_type("created_at"), Some(FieldType::Date));
    assert_eq!(filter.field_type("email"), None);
}

#[test]
fn test_resolution_keeps_the_tree() {
    let ast = parse("not (age = 1 or email = 'x')");
    let filter = resolve(ast.clone(), user_schema()).unwrap();
    assert_eq!(filter.root(), &ast);
}

#[test]
fn test_unknown_field_is_reported_once() {
    let errs = errors("phone = 1");
    assert_eq!(
        errs,
        vec![SemanticError::UnknownField {
            name: "phone".into()
        }]
    );

    let errs = errors("phone = 1 or phone = 2");
    assert_eq!(errs.len(), 1);
}

#[test]
fn test_all_errors_are_collected() {
    let errs = errors("phone = 1 and age = 'x' and flag = true to false and fax > age");
    assert_eq!(errs.len(), 4);
    assert!(matches!(errs[0], SemanticError::UnknownField { ref name } if name == "phone"));
    assert!(matches!(errs[1], SemanticError::TypeMismatch { ref key, .. } if key == "age"));
    assert!(matches!(errs[2], SemanticError::InvalidRange { ref key, .. } if key == "flag"));
    assert!(matches!(errs[3], SemanticError::UnknownField { ref name } if name == "fax"));
}

#[test]
fn test_boolean_range_is_a_semantic_error() {
    let errs = errors("flag = true to false");
    assert_eq!(errs.len(), 1);
    assert!(matches!(errs[0], SemanticError::InvalidRange { .. }));
}

#[test]
fn test_range_checks() {
    assert!(resolve(parse("age = 1 to 10"), user_schema()).is_ok());
    let dates = parse("created_at = '2024-01-01' to '2024-06-30T12:00:00Z'");
    assert!(resolve(dates, user_schema()).is_ok());

    let errs = errors("age = 10 to 1");
    assert!(matches!(errs[0], SemanticError::InvalidRange { .. }));

    let errs = errors("created_at = '2024-12-31' to '2024-01-01'");
    assert!(matches!(errs[0], SemanticError::InvalidRange { .. }));

    let errs = errors("age = 1.5 to 3");
    assert!(matches!(errs[0], SemanticError::TypeMismatch { .. }));

    let errs = errors("email = 1 to 5");
    assert!(matches!(errs[0], SemanticError::TypeMismatch { .. }));
}

#[test]
fn test_literal_types() {
    assert!(resolve(parse("score = 2.5 and age = 18.0"), user_schema()).is_ok());
    assert!(resolve(parse("id = '7c9e6679-7425-40de-944b-e07fc1f90ae7'"), user_schema()).is_ok());

    for input in [
        "age = 1.5",
        "age = 'eighteen'",
        "active = 1",
        "email = true",
        "created_at > 'yesterday'",
        "id = 'not-a-uuid'",
        "score > null",
    ] {
        let errs = errors(input);
        assert_eq!(errs.len(), 1, "{}", input);
        assert!(
            matches!(errs[0], SemanticError::TypeMismatch { .. }),
            "{}: {:?}",
            input,
            errs
        );
    }
}

#[test]
fn test_type_mismatch_message() {
    let errs = errors("age = 'x'");
    assert_eq!(errs[0].to_string(), "Field 'age' cannot be compared with 'x' (expected integer)");
}

#[test]
fn test_null_is_allowed_for_equality() {
    assert!(resolve(parse("email = null or age != null"), user_schema()).is_ok());
}

#[test]
fn test_operator_support_by_type() {
    let errs = errors("age like '1%'");
    assert!(matches!(
        errs[0],
        SemanticError::UnsupportedOperator {
            field_type: FieldType::Integer,
            ..
        }
    ));

    let errs = errors("active > false");
    assert!(matches!(errs[0], SemanticError::UnsupportedOperator { .. }));

    assert!(resolve(parse("email = *'@example.com'"), user_schema()).is_ok());
}

#[test]
fn test_property_comparisons() {
    assert!(resolve(parse("age > min_age"), user_schema()).is_ok());
    // Integer and number are both numeric
    assert!(resolve(parse("score >= age"), user_schema()).is_ok());

    let errs = errors("age = email");
    assert_eq!(
        errs,
        vec![SemanticError::PropertyTypeMismatch {
            key: "age".into(),
            other: "email".into(),
            key_type: FieldType::Integer,
            other_type: FieldType::String,
        }]
    );

    let errs = errors("active > flag");
    assert!(matches!(errs[0], SemanticError::UnsupportedOperator { .. }));

    // Each side resolves on its own
    let errs = errors("fax = phone");
    assert_eq!(errs.len(), 2);
}

#[test]
fn test_issues_are_grouped_by_field() {
    let err = resolve(parse("age = 'a' or age = 'b' or phone = 1"), user_schema()).unwrap_err();
    let issues = err.issues();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].path, "age");
    assert_eq!(issues[0].messages.len(), 2);
    assert_eq!(issues[1].path, "phone");
}
