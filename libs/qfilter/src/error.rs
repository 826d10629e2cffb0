//! Error types for the filter pipeline
//!
//! Three failure families are kept apart all the way to the boundary:
//! syntax errors (the string does not reduce to one expression), semantic
//! errors (the expression does not fit the entity's fields) and authorization
//! errors (the caller may not read a referenced field). Conversion errors are
//! raised by a specific backend when it cannot express a valid filter.

use crate::ast::{ComparisonOperator, LogicalOperator};
use crate::schema::FieldType;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of characters shown in a syntax error snippet
const SNIPPET_LEN: usize = 20;

/// The input could not be reduced to exactly one expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Syntax error at column {column}: {message} (near '{snippet}')")]
pub struct SyntaxError {
    pub message: String,
    /// 1-based column of the offending character
    pub column: usize,
    pub snippet: String,
}

impl SyntaxError {
    /// Build an error pointing at `position` (0-based char offset) in `chars`.
    pub(crate) fn at(chars: &[char], position: usize, message: impl Into<String>) -> Self {
        let snippet = if position >= chars.len() {
            "<end of input>".to_string()
        } else {
            let end = (position + SNIPPET_LEN).min(chars.len());
            chars[position..end].iter().collect()
        };
        Self {
            message: message.into(),
            column: position + 1,
            snippet,
        }
    }
}

/// A single problem found while resolving a filter against entity fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("Unknown field '{name}'")]
    UnknownField { name: String },

    #[error("Field '{key}' cannot be compared with {value} (expected {expected})")]
    TypeMismatch {
        key: String,
        expected: FieldType,
        value: String,
    },

    #[error("Cannot compare '{key}' ({key_type}) with '{other}' ({other_type})")]
    PropertyTypeMismatch {
        key: String,
        other: String,
        key_type: FieldType,
        other_type: FieldType,
    },

    #[error("Invalid range on '{key}': {reason}")]
    InvalidRange { key: String, reason: String },

    #[error("Operator '{operator}' is not supported on {field_type} field '{key}'")]
    UnsupportedOperator {
        key: String,
        operator: ComparisonOperator,
        field_type: FieldType,
    },
}

impl SemanticError {
    /// The field the error is reported under.
    pub fn path(&self) -> &str {
        match self {
            Self::UnknownField { name } => name,
            Self::TypeMismatch { key, .. }
            | Self::PropertyTypeMismatch { key, .. }
            | Self::InvalidRange { key, .. }
            | Self::UnsupportedOperator { key, .. } => key,
        }
    }
}

/// Every semantic error found in one resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticErrors(pub Vec<SemanticError>);

impl SemanticErrors {
    pub fn errors(&self) -> &[SemanticError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Group messages by field, in the order fields were first reported.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        let mut order: Vec<String> = Vec::new();
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for err in &self.0 {
            let path = err.path().to_string();
            if !grouped.contains_key(&path) {
                order.push(path.clone());
            }
            grouped.entry(path).or_default().push(err.to_string());
        }
        order
            .into_iter()
            .map(|path| {
                let messages = grouped.remove(&path).unwrap_or_default();
                ValidationIssue { path, messages }
            })
            .collect()
    }
}

impl fmt::Display for SemanticErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for SemanticErrors {}

/// Why a field read was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Denial {
    /// The caller is known but holds none of the granting role sets
    Forbidden,
    /// The field requires an identity and none was resolved
    Unauthenticated,
    /// The field can never be read
    WriteOnly,
}

/// The first field reference the caller is not allowed to read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Not authorized to read field '{field}'")]
pub struct AuthorizationError {
    pub field: String,
    pub denial: Denial,
}

/// A valid filter the selected backend cannot express.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("The {backend} backend cannot negate an '{combinator}' expression")]
    UnsupportedNegation {
        backend: &'static str,
        combinator: LogicalOperator,
    },

    #[error("The {backend} backend cannot express '{key}': {reason}")]
    UnsupportedValue {
        backend: &'static str,
        key: String,
        reason: String,
    },

    #[error("Filter expands to more than {max} alternatives in the {backend} backend")]
    TooComplex { backend: &'static str, max: usize },

    #[error("Filter too deeply nested (max depth: {max})")]
    TooDeep { max: usize },
}

/// Errors surfaced by the pipeline boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("Invalid filter: {0}")]
    Semantic(#[from] SemanticErrors),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Input too long: {length} characters (max {max})")]
    InputTooLong { length: usize, max: usize },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// One `{ path, messages }` entry of a validation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub messages: Vec<String>,
}

/// Client-facing error body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub error: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub message: Vec<ValidationIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Error {
    /// HTTP status the request pipeline should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Syntax(_)
            | Error::Semantic(_)
            | Error::Conversion(_)
            | Error::InputTooLong { .. } => 422,
            Error::Authorization(e) => match e.denial {
                Denial::Unauthenticated => 401,
                Denial::Forbidden | Denial::WriteOnly => 403,
            },
            Error::UnknownEntity(_) => 404,
            Error::Config(_) => 500,
        }
    }

    /// Render the error body; `parameter` names the query parameter the raw
    /// value came from and is used as the path of syntax-level issues.
    pub fn to_response(&self, parameter: &str) -> ErrorResponse {
        let status_code = self.status_code();
        let error = status_text(status_code);
        let single = |message: String| {
            vec![ValidationIssue {
                path: parameter.to_string(),
                messages: vec![message],
            }]
        };

        match self {
            Error::Semantic(errors) => ErrorResponse {
                status_code,
                error,
                message: errors.issues(),
                field: None,
            },
            Error::Authorization(e) => ErrorResponse {
                status_code,
                error,
                message: Vec::new(),
                field: Some(e.field.clone()),
            },
            Error::Config(_) => {
                tracing::error!("Internal error: {}", self);
                ErrorResponse {
                    status_code,
                    error,
                    message: Vec::new(),
                    field: None,
                }
            }
            Error::Syntax(_)
            | Error::Conversion(_)
            | Error::InputTooLong { .. }
            | Error::UnknownEntity(_) => ErrorResponse {
                status_code,
                error,
                message: single(self.to_string()),
                field: None,
            },
        }
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        _ => "Internal Server Error",
    }
}
