//! Entity field descriptors
//!
//! Each entity gets a statically built table of fields: name, declared type
//! and read policy. Tables are collected in an [`EntityRegistry`] once at
//! startup and passed by reference to the pipeline; nothing here is global.

use crate::authorize::Identity;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Declared type of an entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    /// ISO-8601 date or date-time
    Date,
    Uuid,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }

    /// Two property references can be compared with each other
    pub fn compatible_with(self, other: FieldType) -> bool {
        self == other || (self.is_numeric() && other.is_numeric())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldAccess {
    #[default]
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

/// Roles that must all be held for the set to grant access
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(pub BTreeSet<String>);

impl RoleSet {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    pub fn granted_to(&self, identity: &Identity) -> bool {
        self.0.iter().all(|role| identity.has_role(role))
    }
}

/// Field-level metadata consumed by the resolver and the authorization overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPolicy {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Any one of these sets grants read access; empty means unrestricted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read: Vec<RoleSet>,
    #[serde(default)]
    pub access: FieldAccess,
}

impl FieldPolicy {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            read: Vec::new(),
            access: FieldAccess::ReadWrite,
        }
    }

    /// Add a role set that grants read access
    pub fn readable_by<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read.push(RoleSet::new(roles));
        self
    }

    pub fn read_only(mut self) -> Self {
        self.access = FieldAccess::ReadOnly;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.access = FieldAccess::WriteOnly;
        self
    }

    pub fn has_read_policy(&self) -> bool {
        !self.read.is_empty()
    }
}

/// Field table of one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    pub fields: Vec<FieldPolicy>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldPolicy) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldPolicy> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.get(name).map(|f| f.field_type)
    }
}

/// Entity name → field table, built once at startup
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, EntitySchema>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: EntitySchema) -> Result<()> {
        if self.entities.contains_key(&schema.name) {
            return Err(Error::Config(format!(
                "Entity '{}' is already registered",
                schema.name
            )));
        }
        let mut seen = BTreeSet::new();
        for field in &schema.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Config(format!(
                    "Entity '{}' declares field '{}' twice",
                    schema.name, field.name
                )));
            }
        }
        tracing::debug!(entity = %schema.name, fields = schema.fields.len(), "Registered entity");
        self.entities.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn with(mut self, schema: EntitySchema) -> Result<Self> {
        self.register(schema)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Load a registry from a JSON array of entity schemas
    pub fn from_json(json: &str) -> Result<Self> {
        let schemas: Vec<EntitySchema> = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid entity registry: {}", e)))?;
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(schema)?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_registry_from_json() {
        let registry = EntityRegistry::from_json(
            r#"[{
                "name": "User",
                "fields": [
                    {"name": "email", "type": "string"},
                    {"name": "name", "type": "string", "read": [["Admin"]]},
                    {"name": "password", "type": "string", "access": "writeOnly"}
                ]
            }]"#,
        )
        .unwrap();

        let user = registry.get("User").unwrap();
        assert_eq!(user.field_type("email"), Some(FieldType::String));
        assert!(user.get("name").unwrap().has_read_policy());
        assert_eq!(user.get("password").unwrap().access, FieldAccess::WriteOnly);
    }

    #[test]
    fn rejects_duplicate_fields() {
        let schema = EntitySchema::new("User")
            .field(FieldPolicy::new("email", FieldType::String))
            .field(FieldPolicy::new("email", FieldType::String));
        assert!(matches!(
            EntityRegistry::new().register(schema),
            Err(Error::Config(_))
        ));
    }
}
