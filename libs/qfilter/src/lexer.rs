//! Filter lexer - tokenizes input strings
//!
//! Converts a filter expression into a stream of tokens. Whitespace is
//! insignificant between tokens; positions are tracked in chars so error
//! columns line up with what the user typed.

use crate::error::SyntaxError;
use crate::token::{Token, TokenType};

/// The filter lexer
pub(crate) struct Lexer {
    chars: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            chars,
            position: 0,
            current_char,
        }
    }

    /// Build a syntax error pointing at `position`
    pub fn error_at(&self, position: usize, message: impl Into<String>) -> SyntaxError {
        SyntaxError::at(&self.chars, position, message)
    }

    /// Advance to the next character
    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.chars.get(self.position).copied();
    }

    /// Peek `offset` characters ahead without advancing
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read an identifier: [A-Za-z_][A-Za-z0-9_]*
    fn read_identifier(&mut self) -> String {
        let start_pos = self.position;

        while let Some(c) = self.current_char {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        self.chars[start_pos..self.position].iter().collect()
    }

    /// Read a string literal delimited by `quote`. The literal ends at the
    /// next matching quote; there are no escape sequences.
    fn read_string(&mut self, quote: char) -> Option<String> {
        self.advance(); // Skip opening quote

        let mut value = String::new();
        while let Some(c) = self.current_char {
            if c == quote {
                self.advance(); // Skip closing quote
                return Some(value);
            }
            value.push(c);
            self.advance();
        }

        None
    }

    /// Read an integer or decimal number with an optional leading '-'
    fn read_number(&mut self) -> String {
        let start_pos = self.position;

        if self.current_char == Some('-') {
            self.advance();
        }

        while let Some(c) = self.current_char {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        // Only consume the dot when digits follow, so `1...5` stays a range
        if self.current_char == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance(); // Skip '.'
            while let Some(c) = self.current_char {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.chars[start_pos..self.position].iter().collect()
    }

    fn single(&mut self, token_type: TokenType, text: &str) -> Token {
        let start = self.position;
        for _ in text.chars() {
            self.advance();
        }
        Token::new(token_type, text.to_string(), start, self.position)
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.position;
        let Some(c) = self.current_char else {
            return Token::eof(start);
        };

        match c {
            '\'' | '"' => match self.read_string(c) {
                Some(value) => Token::new(TokenType::StringLiteral, value, start, self.position),
                None => Token::error("Unterminated string literal".to_string(), start),
            },
            '0'..='9' => self.number_token(start),
            '-' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number_token(start),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let word = self.read_identifier();
                let token_type =
                    TokenType::keyword(&word.to_ascii_lowercase()).unwrap_or(TokenType::Identifier);
                Token::new(token_type, word, start, self.position)
            }
            '.' if self.peek_at(1) == Some('.') && self.peek_at(2) == Some('.') => {
                self.single(TokenType::Ellipsis, "...")
            }
            '=' => self.single(TokenType::Equal, "="),
            '!' if self.peek_at(1) == Some('=') => self.single(TokenType::NotEqual, "!="),
            '!' => self.single(TokenType::Bang, "!"),
            '<' if self.peek_at(1) == Some('=') => self.single(TokenType::LessThanOrEqual, "<="),
            '<' if self.peek_at(1) == Some('>') => self.single(TokenType::NotEqual, "<>"),
            '<' => self.single(TokenType::LessThan, "<"),
            '>' if self.peek_at(1) == Some('=') => {
                self.single(TokenType::GreaterThanOrEqual, ">=")
            }
            '>' => self.single(TokenType::GreaterThan, ">"),
            '*' => self.single(TokenType::Star, "*"),
            '(' => self.single(TokenType::OpenParen, "("),
            ')' => self.single(TokenType::CloseParen, ")"),
            other => Token::error(format!("Unexpected character '{}'", other), start),
        }
    }

    fn number_token(&mut self, start: usize) -> Token {
        let value = self.read_number();
        // `1abc` is an identifier with a leading digit, not a number followed by a name
        if self
            .current_char
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            return Token::error(
                "Invalid property name: identifiers cannot start with a digit".to_string(),
                start,
            );
        }
        Token::new(TokenType::NumberLiteral, value, start, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = matches!(token.token_type, TokenType::Eof | TokenType::Error);
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn types(input: &str) -> Vec<TokenType> {
        tokenize(input).into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            types("= != <> > >= < <="),
            vec![
                TokenType::Equal,
                TokenType::NotEqual,
                TokenType::NotEqual,
                TokenType::GreaterThan,
                TokenType::GreaterThanOrEqual,
                TokenType::LessThan,
                TokenType::LessThanOrEqual,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            types("AND or Not LIKE Between tO TRUE false NULL"),
            vec![
                TokenType::And,
                TokenType::Or,
                TokenType::Not,
                TokenType::Like,
                TokenType::Between,
                TokenType::To,
                TokenType::True,
                TokenType::False,
                TokenType::Null,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("42 3.14 -7");
        assert_eq!(tokens[0].value, "42");
        assert_eq!(tokens[1].value, "3.14");
        assert_eq!(tokens[2].value, "-7");
        assert!(tokens[..3].iter().all(|t| t.is(TokenType::NumberLiteral)));
    }

    #[test]
    fn test_ellipsis_range_keeps_numbers_apart() {
        assert_eq!(
            types("1...10"),
            vec![
                TokenType::NumberLiteral,
                TokenType::Ellipsis,
                TokenType::NumberLiteral,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_with_either_quote() {
        let tokens = tokenize(r#"'john' "it's""#);
        assert_eq!(tokens[0].value, "john");
        assert_eq!(tokens[1].value, "it's");
        assert_eq!(tokens[1].position, 7);
        assert_eq!(tokens[1].end, 13);
    }

    #[test]
    fn test_wildcard_positions() {
        let tokens = tokenize("*'abc'*");
        assert_eq!(tokens[0].token_type, TokenType::Star);
        assert_eq!(tokens[0].end, tokens[1].position);
        assert_eq!(tokens[1].end, tokens[2].position);
    }

    #[test]
    fn test_unterminated_string() {
        let tokens = tokenize("name = 'john");
        let last = tokens.last().unwrap();
        assert_eq!(last.token_type, TokenType::Error);
        assert_eq!(last.position, 7);
    }

    #[test]
    fn test_leading_digit_identifier() {
        let tokens = tokenize("1abc = 2");
        assert_eq!(tokens[0].token_type, TokenType::Error);
    }

    #[test]
    fn test_unexpected_character() {
        let tokens = tokenize("age # 2");
        assert_eq!(tokens[1].token_type, TokenType::Error);
        assert_eq!(tokens[1].value, "Unexpected character '#'");
    }
}
