//! Character scanner for the comma-separated `order` and `select` parameters

use crate::error::SyntaxError;

pub(crate) struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    pub(crate) fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    pub(crate) fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub(crate) fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += 1;
        Some(c)
    }

    pub(crate) fn skip_ws(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.consume_char();
        }
    }

    pub(crate) fn eat_char(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek_char() == Some(expected) {
            self.consume_char();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_keyword(&mut self, kw: &str) -> bool {
        let save = self.pos;
        let Some(word) = self.try_parse_name() else {
            self.pos = save;
            return false;
        };
        if word.eq_ignore_ascii_case(kw) {
            true
        } else {
            self.pos = save;
            false
        }
    }

    /// `[A-Za-z_][A-Za-z0-9_]*`, after optional whitespace
    pub(crate) fn try_parse_name(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.pos;
        let first = self.peek_char()?;
        if !(first == '_' || first.is_ascii_alphabetic()) {
            return None;
        }
        self.consume_char();
        while let Some(c) = self.peek_char() {
            if c == '_' || c.is_ascii_alphanumeric() {
                self.consume_char();
            } else {
                break;
            }
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    pub(crate) fn error_at(&self, position: usize, message: impl Into<String>) -> SyntaxError {
        SyntaxError::at(&self.chars, position, message)
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> SyntaxError {
        self.error_at(self.pos, message)
    }

    /// Parse `item (, item)*` with `item` supplied by the caller. Blank input
    /// yields no items.
    pub(crate) fn comma_list<T>(
        &mut self,
        mut item: impl FnMut(&mut Scanner) -> Result<T, SyntaxError>,
    ) -> Result<Vec<T>, SyntaxError> {
        let mut items = Vec::new();
        self.skip_ws();
        if self.is_eof() {
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            self.skip_ws();
            if self.is_eof() {
                return Ok(items);
            }
            if !self.eat_char(',') {
                return Err(self.error("Expected ',' or end of input"));
            }
        }
    }
}
