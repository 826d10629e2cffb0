#![allow(dead_code)]

use qfilter::{
    parse_filter, resolve, EntityRegistry, EntitySchema, FieldPolicy, FieldType, FilterNode,
    Identity, ResolvedFilter,
};
use std::sync::OnceLock;

static USER_SCHEMA: OnceLock<EntitySchema> = OnceLock::new();
static REGISTRY: OnceLock<EntityRegistry> = OnceLock::new();

/// `User` entity used across the integration tests
pub fn user_schema() -> &'static EntitySchema {
    USER_SCHEMA.get_or_init(|| {
        EntitySchema::new("User")
            .field(FieldPolicy::new("id", FieldType::Uuid))
            .field(FieldPolicy::new("email", FieldType::String))
            .field(FieldPolicy::new("name", FieldType::String).readable_by(["Admin"]))
            .field(FieldPolicy::new("age", FieldType::Integer))
            .field(FieldPolicy::new("min_age", FieldType::Integer))
            .field(FieldPolicy::new("score", FieldType::Number))
            .field(FieldPolicy::new("active", FieldType::Boolean))
            .field(FieldPolicy::new("flag", FieldType::Boolean))
            .field(FieldPolicy::new("created_at", FieldType::Date).read_only())
            .field(
                FieldPolicy::new("salary", FieldType::Number)
                    .readable_by(["Admin", "Finance"])
                    .readable_by(["Owner"]),
            )
            .field(FieldPolicy::new("password", FieldType::String).write_only())
    })
}

pub fn registry() -> &'static EntityRegistry {
    REGISTRY.get_or_init(|| {
        EntityRegistry::new()
            .with(user_schema().clone())
            .unwrap_or_else(|e| panic!("failed to build test registry: {}", e))
    })
}

pub fn admin() -> Identity {
    Identity::new("alice").with_roles(["Admin"])
}

pub fn user() -> Identity {
    Identity::new("bob").with_roles(["User"])
}

pub fn parse(input: &str) -> FilterNode {
    parse_filter(input).unwrap_or_else(|e| panic!("failed to parse {:?}: {}", input, e))
}

/// Parse and resolve against the `User` entity
pub fn resolved(input: &str) -> ResolvedFilter {
    resolve(parse(input), user_schema())
        .unwrap_or_else(|e| panic!("failed to resolve {:?}: {}", input, e))
}
