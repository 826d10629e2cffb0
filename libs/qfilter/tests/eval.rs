//! In-memory evaluation over JSON documents

use serde_json::{json, Value};

mod test_support;
use test_support::parse;

fn users() -> Vec<Value> {
    vec![
        json!({ "id": 1, "name": "Joan", "email": "joan@example.com", "age": 34, "score": 7.5,
                "active": true, "created_at": "2024-03-01T10:00:00Z" }),
        json!({ "id": 2, "name": "John", "email": "john@example.org", "age": 17, "score": 9,
                "active": false, "created_at": "2023-11-20" }),
        json!({ "id": 3, "name": "Ada", "age": 36, "min_age": 40, "active": true,
                "created_at": "2024-07-15T08:30:00+02:00" }),
    ]
}

fn matching(input: &str) -> Vec<i64> {
    let filter = parse(input);
    users()
        .iter()
        .filter(|doc| filter.matches(doc))
        .filter_map(|doc| doc["id"].as_i64())
        .collect()
}

#[test]
fn test_comparisons() {
    assert_eq!(matching("age >= 18"), vec![1, 3]);
    assert_eq!(matching("age < 18"), vec![2]);
    assert_eq!(matching("score = 9.0"), vec![2]);
    assert_eq!(matching("active = true"), vec![1, 3]);
    assert_eq!(matching("name != 'Ada'"), vec![1, 2]);
}

#[test]
fn test_missing_fields_read_as_null() {
    assert_eq!(matching("email = null"), vec![3]);
    assert_eq!(matching("email != null"), vec![1, 2]);
    // Ordering against a missing field never holds
    assert_eq!(matching("score > 0"), vec![1, 2]);
}

#[test]
fn test_explicit_null_reads_like_missing() {
    let filter = parse("email = null");
    assert!(filter.matches(&json!({ "email": null })));
    assert!(filter.matches(&json!({})));
    assert!(!filter.matches(&json!({ "email": "ada@example.com" })));

    let filter = parse("email != null");
    assert!(!filter.matches(&json!({ "email": null })));
    assert!(!filter.matches(&json!({})));
    assert!(filter.matches(&json!({ "email": "ada@example.com" })));
}

#[test]
fn test_patterns_ignore_case() {
    assert_eq!(matching("name = 'jo'*"), vec![1, 2]);
    assert_eq!(matching("email = *'.COM'"), vec![1]);
    assert_eq!(matching("email = *'@EXAMPLE'*"), vec![1, 2]);
    assert_eq!(matching("name like 'j_a%'"), vec![1]);
}

#[test]
fn test_ranges_are_inclusive() {
    assert_eq!(matching("age = 17 to 34"), vec![1, 2]);
    assert_eq!(matching("age between 35 and 40"), vec![3]);
    assert_eq!(matching("created_at = '2024-01-01' to '2024-06-30'"), vec![1]);
}

#[test]
fn test_dates_compare_as_instants() {
    assert_eq!(matching("created_at > '2024-01-01'"), vec![1, 3]);
    assert_eq!(matching("created_at < '2024-07-15T06:00:00Z'"), vec![1, 2]);
}

#[test]
fn test_property_comparisons() {
    assert_eq!(matching("age < min_age"), vec![3]);
    // min_age is missing on the others, so nothing orders against it
    assert_eq!(matching("age >= min_age"), Vec::<i64>::new());
}

#[test]
fn test_logical_operators() {
    assert_eq!(matching("age > 30 and active = true or score = 9"), vec![1, 2, 3]);
    assert_eq!(matching("age > 30 and (active = false or score = 9)"), Vec::<i64>::new());
    assert_eq!(matching("not (age > 30)"), vec![2]);
    assert_eq!(matching("not not active = true"), vec![1, 3]);
}
