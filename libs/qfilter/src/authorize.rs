//! Field-level read authorization
//!
//! A single depth-first walk over the filter that stops at the first field
//! reference the caller may not read. Unlike resolution this is fail-fast and
//! reports only that field.

use crate::ast::FilterNode;
use crate::error::{AuthorizationError, Denial};
use crate::schema::{EntitySchema, FieldAccess, FieldPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Resolved caller of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl FieldPolicy {
    /// Decide whether `caller` may read this field.
    ///
    /// Fields without a read policy are open to everyone, including anonymous
    /// callers. A restricted field with no caller is denied.
    pub fn can_read(&self, caller: Option<&Identity>) -> Result<(), Denial> {
        if self.access == FieldAccess::WriteOnly {
            return Err(Denial::WriteOnly);
        }
        if self.read.is_empty() {
            return Ok(());
        }
        let Some(identity) = caller else {
            return Err(Denial::Unauthenticated);
        };
        if self.read.iter().any(|set| set.granted_to(identity)) {
            Ok(())
        } else {
            Err(Denial::Forbidden)
        }
    }
}

/// Check every field a filter references against its read policy.
///
/// Unknown fields are left to the resolver and pass here.
pub fn authorize(
    filter: &FilterNode,
    schema: &EntitySchema,
    caller: Option<&Identity>,
) -> Result<(), AuthorizationError> {
    match filter {
        FilterNode::Comparison(c) => {
            check_field(&c.key, schema, caller)?;
            if let Some(other) = c.value.as_property() {
                check_field(other, schema, caller)?;
            }
            Ok(())
        }
        FilterNode::Logical { left, right, .. } => {
            authorize(left, schema, caller)?;
            authorize(right, schema, caller)
        }
        FilterNode::Unary { expr, .. } | FilterNode::Parenthesis { expr } => {
            authorize(expr, schema, caller)
        }
    }
}

/// Same check for a flat list of field names (sort keys, projections)
pub fn authorize_fields<'a, I>(
    fields: I,
    schema: &EntitySchema,
    caller: Option<&Identity>,
) -> Result<(), AuthorizationError>
where
    I: IntoIterator<Item = &'a str>,
{
    fields
        .into_iter()
        .try_for_each(|field| check_field(field, schema, caller))
}

fn check_field(
    field: &str,
    schema: &EntitySchema,
    caller: Option<&Identity>,
) -> Result<(), AuthorizationError> {
    let Some(policy) = schema.get(field) else {
        return Ok(());
    };
    policy.can_read(caller).map_err(|denial| {
        tracing::warn!(
            entity = %schema.name,
            field = field,
            subject = caller.and_then(|c| c.subject.as_deref()).unwrap_or("<anonymous>"),
            ?denial,
            "Field read denied"
        );
        AuthorizationError {
            field: field.to_string(),
            denial,
        }
    })
}
