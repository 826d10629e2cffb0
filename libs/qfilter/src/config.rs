//! Limits and route settings for the filter pipeline

use crate::convert::MAX_FOLD_DEPTH;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest `max_input_length` a deployment may configure, in characters
pub const MAX_INPUT_LENGTH: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Longest raw parameter accepted, in characters
    pub max_input_length: usize,
    /// Deepest nesting of `not` and parentheses the parser accepts
    pub max_depth: usize,
    /// Routes that skip field authorization
    pub public_routes: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_input_length: 512,
            max_depth: crate::parser::DEFAULT_MAX_DEPTH,
            public_routes: Vec::new(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_input_length == 0 || self.max_input_length > MAX_INPUT_LENGTH {
            return Err(Error::Config(format!(
                "max_input_length must be between 1 and {}",
                MAX_INPUT_LENGTH
            )));
        }
        if self.max_depth == 0 || self.max_depth > MAX_FOLD_DEPTH {
            return Err(Error::Config(format!(
                "max_depth must be between 1 and {}",
                MAX_FOLD_DEPTH
            )));
        }
        if let Some(route) = self.public_routes.iter().find(|r| !r.starts_with('/')) {
            return Err(Error::Config(format!(
                "public route '{}' must start with '/'",
                route
            )));
        }
        Ok(())
    }

    pub fn is_public_route(&self, route: &str) -> bool {
        self.public_routes.iter().any(|r| r == route)
    }
}
