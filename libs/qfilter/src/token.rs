//! Token types for the filter lexer
//!
//! Tokens represent the lexical elements of a filter expression.

/// Token types for the filter lexer
#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub(crate) enum TokenType {
    // Literals
    StringLiteral,
    NumberLiteral,

    // Identifiers
    Identifier,

    // Keywords (case-insensitive)
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Like,
    Between,
    To,

    // Operators
    Equal,              // =
    NotEqual,           // != or <>
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
    LessThan,           // <
    LessThanOrEqual,    // <=
    Bang,               // !
    Star,               // *
    Ellipsis,           // ...

    // Delimiters
    OpenParen,  // (
    CloseParen, // )

    // End of input
    Eof,

    // Error
    Error, // For lexical errors, `value` carries the message
}

impl TokenType {
    /// Map a lowercased word to its keyword token, if it is one.
    pub(crate) fn keyword(word: &str) -> Option<Self> {
        match word {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            "like" => Some(Self::Like),
            "between" => Some(Self::Between),
            "to" => Some(Self::To),
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub(crate) fn describe(self) -> &'static str {
        match self {
            Self::StringLiteral => "string",
            Self::NumberLiteral => "number",
            Self::Identifier => "property name",
            Self::True | Self::False => "boolean",
            Self::Null => "null",
            Self::And => "'and'",
            Self::Or => "'or'",
            Self::Not => "'not'",
            Self::Like => "'like'",
            Self::Between => "'between'",
            Self::To => "'to'",
            Self::Equal => "'='",
            Self::NotEqual => "'!='",
            Self::GreaterThan => "'>'",
            Self::GreaterThanOrEqual => "'>='",
            Self::LessThan => "'<'",
            Self::LessThanOrEqual => "'<='",
            Self::Bang => "'!'",
            Self::Star => "'*'",
            Self::Ellipsis => "'...'",
            Self::OpenParen => "'('",
            Self::CloseParen => "')'",
            Self::Eof => "end of input",
            Self::Error => "invalid token",
        }
    }
}

/// A token in the filter expression
#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub token_type: TokenType,
    pub value: String,
    /// 0-based char offset of the first character
    pub position: usize,
    /// 0-based char offset one past the last character
    pub end: usize,
}

impl Token {
    pub fn new(token_type: TokenType, value: String, position: usize, end: usize) -> Self {
        Self {
            token_type,
            value,
            position,
            end,
        }
    }

    pub fn eof(position: usize) -> Self {
        Self {
            token_type: TokenType::Eof,
            value: String::new(),
            position,
            end: position,
        }
    }

    pub fn error(message: String, position: usize) -> Self {
        Self {
            token_type: TokenType::Error,
            value: message,
            position,
            end: position,
        }
    }

    pub fn is(&self, token_type: TokenType) -> bool {
        self.token_type == token_type
    }
}
