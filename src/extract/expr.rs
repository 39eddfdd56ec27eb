//! Boolean condition expressions such as `"en or (de and not at)"`.
use crate::error::{InnoError, Result};

/// Nesting limit for `not` and parentheses.
const MAX_DEPTH: usize = 256;

/// Evaluates condition expressions, where an identifier is true if it equals
/// the test value.
///
/// Operators are `not`, `and` and `or`, in order of precedence. Whitespace
/// and `,` separate terms; terms without an operator between them are
/// combined with `or`, like the old space separated lists.
pub struct Parser<'a> {
    str: &'a [u8],
    pos: usize,
    depth: usize,
    test: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(expr: &'a str, test: &'a str) -> Self {
        Parser {
            str: expr.as_bytes(),
            pos: 0,
            depth: 0,
            test,
        }
    }

    pub fn evaluate(mut self) -> Result<bool> {
        let value = self.parse_or()?;
        self.erase_whitespace();
        if self.pos < self.str.len() {
            return self.error("unexpected input");
        }
        Ok(value)
    }

    fn parse_or(&mut self) -> Result<bool> {
        let mut value = self.parse_and()?;
        loop {
            self.erase_whitespace();
            if self.eat_keyword("or") {
                value |= self.parse_and()?;
            } else if self.starts_term() {
                value |= self.parse_and()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn parse_and(&mut self) -> Result<bool> {
        let mut value = self.parse_not()?;
        loop {
            self.erase_whitespace();
            if self.eat_keyword("and") {
                value &= self.parse_not()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn parse_not(&mut self) -> Result<bool> {
        if self.depth >= MAX_DEPTH {
            return self.error("expression too deep");
        }
        self.depth += 1;
        self.erase_whitespace();
        let value = if self.eat_keyword("not") {
            self.parse_not().map(|v| !v)
        } else {
            self.parse_primary()
        };
        self.depth -= 1;
        value
    }

    fn parse_primary(&mut self) -> Result<bool> {
        self.erase_whitespace();
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.parse_or()?;
                self.erase_whitespace();
                match self.peek() {
                    Some(b')') => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => self.error("expected ')'"),
                }
            }
            Some(c) if is_ident_char(c) => {
                let ident = self.parse_ident();
                Ok(ident.eq_ignore_ascii_case(self.test))
            }
            Some(_) => self.error("expected an identifier"),
            None => self.error("unexpected end of expression"),
        }
    }

    fn parse_ident(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        // Identifier bytes are ASCII, so this slice is on a char boundary.
        std::str::from_utf8(&self.str[start..self.pos]).unwrap_or_default()
    }

    /// Whether the next token can start a term, for implicit `or`.
    fn starts_term(&self) -> bool {
        match self.peek() {
            Some(b'(') => true,
            Some(c) if is_ident_char(c) => !self.is_keyword("and") && !self.is_keyword("or"),
            _ => false,
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        let end = self.pos + keyword.len();
        end <= self.str.len()
            && self.str[self.pos..end].eq_ignore_ascii_case(keyword.as_bytes())
            && !self.str.get(end).copied().is_some_and(is_ident_char)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn erase_whitespace(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_whitespace() || c == b',')
        {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.str.get(self.pos).copied()
    }

    fn error<T>(&self, msg: &str) -> Result<T> {
        Err(InnoError::Format(format!(
            "{} at position {} of expression {:?}",
            msg,
            self.pos,
            String::from_utf8_lossy(self.str)
        )))
    }
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'\\' | b'.' | b'-')
}

/// Evaluates `expr` with only `test` set. Empty expressions match.
pub fn expression_match(expr: &str, test: &str) -> Result<bool> {
    if expr.trim().is_empty() {
        return Ok(true);
    }
    Parser::new(expr, test).evaluate()
}

/// Whether `expr` is a single identifier.
pub fn is_simple_expression(expr: &str) -> bool {
    let expr = expr.trim();
    !expr.is_empty()
        && expr.bytes().all(is_ident_char)
        && !["and", "or", "not"]
            .iter()
            .any(|k| expr.eq_ignore_ascii_case(k))
}
