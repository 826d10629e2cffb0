//! Request boundary
//!
//! Runs a raw query parameter through every stage for one entity: length
//! cap, registry lookup, parsing, resolution, authorization (skipped on
//! public routes) and conversion with the configured backend.

use crate::authorize::{authorize, authorize_fields, Identity};
use crate::config::FilterConfig;
use crate::convert::{convert, Backend};
use crate::error::{Error, Result};
use crate::order::{parse_order, resolve_order, SortKey};
use crate::resolver::resolve;
use crate::schema::{EntityRegistry, EntitySchema};
use crate::select::{parse_select, resolve_select};

/// Per-request inputs supplied by the surrounding framework
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub route: &'a str,
    /// `None` when no identity could be resolved for the request
    pub identity: Option<&'a Identity>,
}

impl<'a> RequestContext<'a> {
    pub fn new(route: &'a str, identity: Option<&'a Identity>) -> Self {
        Self { route, identity }
    }

    pub fn anonymous(route: &'a str) -> Self {
        Self {
            route,
            identity: None,
        }
    }
}

pub struct FilterPipeline<'r, B> {
    registry: &'r EntityRegistry,
    config: &'r FilterConfig,
    backend: B,
}

impl<'r, B: Backend> FilterPipeline<'r, B> {
    pub fn new(registry: &'r EntityRegistry, config: &'r FilterConfig, backend: B) -> Self {
        Self {
            registry,
            config,
            backend,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Parse, validate, authorize and convert a `filter` parameter.
    #[tracing::instrument(
        skip(self, raw, ctx),
        fields(route = ctx.route, backend = self.backend.name())
    )]
    pub fn filter(&self, entity: &str, raw: &str, ctx: &RequestContext<'_>) -> Result<B::Output> {
        let schema = self.prepare(entity, raw)?;
        let ast = crate::parse_filter_with(raw, self.config)?;
        let resolved = resolve(ast, schema)?;
        if self.requires_authorization(ctx) {
            authorize(resolved.root(), schema, ctx.identity)?;
        }
        Ok(convert(&resolved, &self.backend)?)
    }

    /// Parse and validate an `order` parameter.
    #[tracing::instrument(skip(self, raw, ctx), fields(route = ctx.route))]
    pub fn order(&self, entity: &str, raw: &str, ctx: &RequestContext<'_>) -> Result<Vec<SortKey>> {
        let schema = self.prepare(entity, raw)?;
        let keys = parse_order(raw)?;
        resolve_order(&keys, schema)?;
        if self.requires_authorization(ctx) {
            authorize_fields(keys.iter().map(|k| k.field.as_str()), schema, ctx.identity)?;
        }
        Ok(keys)
    }

    /// Parse and validate a `select` parameter.
    #[tracing::instrument(skip(self, raw, ctx), fields(route = ctx.route))]
    pub fn select(&self, entity: &str, raw: &str, ctx: &RequestContext<'_>) -> Result<Vec<String>> {
        let schema = self.prepare(entity, raw)?;
        let fields = parse_select(raw)?;
        resolve_select(&fields, schema)?;
        if self.requires_authorization(ctx) {
            authorize_fields(fields.iter().map(String::as_str), schema, ctx.identity)?;
        }
        Ok(fields)
    }

    fn prepare(&self, entity: &str, raw: &str) -> Result<&'r EntitySchema> {
        let length = raw.chars().count();
        if length > self.config.max_input_length {
            return Err(Error::InputTooLong {
                length,
                max: self.config.max_input_length,
            });
        }
        self.registry
            .get(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }

    fn requires_authorization(&self, ctx: &RequestContext<'_>) -> bool {
        let public = self.config.is_public_route(ctx.route);
        if public {
            tracing::debug!(route = ctx.route, "Public route, skipping field authorization");
        }
        !public
    }
}
