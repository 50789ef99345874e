//! Safe parser for Python-style data literals.
//!
//! Flat-file datasets carry per-row metadata written as a Python dict
//! literal (`{'topic': 'Science', 'urls': ['https://...']}`). This parser
//! accepts that literal subset, plus plain JSON, and produces a
//! [`serde_json::Value`]. Nothing is ever evaluated.
//!
//! Supported: dicts, lists, tuples (as arrays), single/double quoted strings
//! with escapes, `u`/`b`/`r` string prefixes, adjacent string concatenation,
//! integers, floats, `True`/`False`/`None` and their JSON spellings.
//! f-strings and any other expression are rejected.

use std::fmt;

use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    /// Byte offset into the input
    pub position: usize,
    pub message: String,
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.position)
    }
}

impl std::error::Error for LiteralError {}

type ParseResult<T> = std::result::Result<T, LiteralError>;

/// Parse a complete literal; trailing non-whitespace input is an error.
pub fn parse_literal(src: &str) -> ParseResult<Value> {
    let mut parser = Parser { src, pos: 0 };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < src.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            position: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> ParseResult<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn value(&mut self) -> ParseResult<Value> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.dict(),
            Some('[') => self.sequence('[', ']'),
            Some('(') => self.sequence('(', ')'),
            Some('\'') | Some('"') => self.strings().map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => {
                if self.string_prefix().is_some() {
                    self.strings().map(Value::String)
                } else {
                    self.keyword()
                }
            }
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn dict(&mut self) -> ParseResult<Value> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }

            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(self.error("dict keys must be strings or numbers")),
            };
            self.skip_ws();
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    return Ok(Value::Object(map));
                }
                _ => return Err(self.error("expected ',' or '}' in dict")),
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> ParseResult<Value> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(Value::Array(items));
            }

            items.push(self.value()?);

            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {
                    self.bump();
                    return Ok(Value::Array(items));
                }
                _ => return Err(self.error(format!("expected ',' or '{}'", close))),
            }
        }
    }

    /// Length of the string prefix at the cursor and whether it is raw, when
    /// the cursor is at a string literal.
    fn string_prefix(&self) -> Option<(usize, bool)> {
        let rest = &self.src[self.pos..];
        let len = rest.find(|c: char| !c.is_ascii_alphabetic())?;
        if !rest[len..].starts_with(|c: char| c == '\'' || c == '"') {
            return None;
        }
        match rest[..len].to_ascii_lowercase().as_str() {
            "" | "u" | "b" => Some((len, false)),
            "r" | "rb" | "br" => Some((len, true)),
            _ => None,
        }
    }

    /// One string literal, or several adjacent ones joined together.
    fn strings(&mut self) -> ParseResult<String> {
        let mut out = String::new();
        while let Some((prefix, raw)) = self.string_prefix() {
            self.pos += prefix;
            self.string(raw, &mut out)?;
            self.skip_ws();
        }
        Ok(out)
    }

    fn string(&mut self, raw: bool, out: &mut String) -> ParseResult<()> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(()),
                // Raw strings keep the backslash and the escaped character
                Some('\\') if raw => {
                    out.push('\\');
                    let c = self.bump().ok_or_else(|| self.error("unterminated string"))?;
                    out.push(c);
                }
                Some('\\') => self.escape(out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> ParseResult<()> {
        match self.bump() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('/') => out.push('/'),
            Some('x') => out.push(self.hex_char(2)?),
            Some('u') => out.push(self.hex_char(4)?),
            Some('U') => out.push(self.hex_char(8)?),
            // Unknown escapes keep the backslash
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => return Err(self.error("unterminated escape")),
        }
        Ok(())
    }

    fn hex_char(&mut self, digits: usize) -> ParseResult<char> {
        let src = self.src;
        let start = self.pos;
        let end = start + digits;
        let hex = src
            .get(start..end)
            .ok_or_else(|| self.error("truncated escape sequence"))?;
        let code =
            u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error("escape is not a valid character"))
    }

    fn number(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_'))
        {
            self.bump();
        }
        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();

        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError {
                position: start,
                message: format!("invalid number '{}'", text),
            })
    }

    fn keyword(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            other => Err(LiteralError {
                position: start,
                message: format!("unsupported identifier '{}'", other),
            }),
        }
    }
}
