//! Parser for the subset of JavaScript the documentation generator emits for
//! its search data: `var name = <literal>;` statements whose literals are
//! arrays, objects, strings and integers.

use crate::error::DecodeError;

/// Deepest array/object nesting accepted. Generator output needs four levels.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JsValue {
    Array(Vec<JsValue>),
    Object(Vec<(String, JsValue)>),
    String(String),
    Number(i64),
    Ident(String),
}

impl JsValue {
    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn as_array(&self) -> Option<&[JsValue]> {
        match self {
            JsValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub(crate) fn as_number(&self) -> Option<i64> {
        match self {
            JsValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Parses every `var name = value;` statement in `text`.
pub(crate) fn parse_assignments(text: &str) -> Result<Vec<(String, JsValue)>, DecodeError> {
    let mut parser = Parser::new(text);
    let mut out = Vec::new();
    loop {
        parser.skip_trivia();
        if parser.at_end() {
            break;
        }
        let keyword = parser.ident()?;
        let name = if matches!(keyword.as_str(), "var" | "let" | "const") {
            parser.skip_trivia();
            parser.ident()?
        } else {
            keyword
        };
        parser.skip_trivia();
        parser.expect(b'=')?;
        let value = parser.value()?;
        parser.skip_trivia();
        parser.eat(b';');
        out.push((name, value));
    }
    Ok(out)
}

struct Parser<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            text,
            pos: 0,
            depth: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::Syntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                // UTF-8 BOM.
                Some(0xEF) if self.bytes[self.pos..].starts_with(&[0xEF, 0xBB, 0xBF]) => {
                    self.pos += 3
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    match self.text[self.pos + 2..].find("*/") {
                        Some(end) => self.pos += 2 + end + 2,
                        None => self.pos = self.bytes.len(),
                    }
                }
                _ => break,
            }
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), DecodeError> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", byte as char)))
        }
    }

    fn ident(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'$' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected identifier"));
        }
        Ok(self.text[start..self.pos].to_owned())
    }

    fn value(&mut self) -> Result<JsValue, DecodeError> {
        self.skip_trivia();
        match self.peek() {
            Some(b'[') => self.nested(Self::array),
            Some(b'{') => self.nested(Self::object),
            Some(quote @ (b'\'' | b'"')) => self.string(quote).map(JsValue::String),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(b) if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => {
                self.ident().map(JsValue::Ident)
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<JsValue, DecodeError>,
    ) -> Result<JsValue, DecodeError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn array(&mut self) -> Result<JsValue, DecodeError> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(b']') {
                return Ok(JsValue::Array(items));
            }
            items.push(self.value()?);
            self.skip_trivia();
            if self.eat(b',') {
                continue;
            }
            self.skip_trivia();
            self.expect(b']')?;
            return Ok(JsValue::Array(items));
        }
    }

    fn object(&mut self) -> Result<JsValue, DecodeError> {
        self.expect(b'{')?;
        let mut fields = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(b'}') {
                return Ok(JsValue::Object(fields));
            }
            let key = match self.peek() {
                Some(quote @ (b'\'' | b'"')) => self.string(quote)?,
                Some(b'0'..=b'9') => match self.number()? {
                    JsValue::Number(n) => n.to_string(),
                    _ => return Err(self.error("expected object key")),
                },
                _ => self.ident()?,
            };
            self.skip_trivia();
            self.expect(b':')?;
            let value = self.value()?;
            fields.push((key, value));
            self.skip_trivia();
            if self.eat(b',') {
                continue;
            }
            self.expect(b'}')?;
            return Ok(JsValue::Object(fields));
        }
    }

    fn number(&mut self) -> Result<JsValue, DecodeError> {
        let start = self.pos;
        self.eat(b'-');
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.text[start..self.pos]
            .parse::<i64>()
            .map(JsValue::Number)
            .map_err(|_| DecodeError::Syntax {
                offset: start,
                message: "invalid integer".to_owned(),
            })
    }

    fn string(&mut self, quote: u8) -> Result<String, DecodeError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let rest = &self.text[self.pos..];
            let Some(rel) = rest.find(|c: char| c == quote as char || c == '\\' || c == '\n') else {
                return Err(DecodeError::Syntax {
                    offset: start,
                    message: "unterminated string".to_owned(),
                });
            };
            out.push_str(&rest[..rel]);
            self.pos += rel;
            match self.bytes[self.pos] {
                b'\n' => {
                    return Err(DecodeError::Syntax {
                        offset: start,
                        message: "unterminated string".to_owned(),
                    })
                }
                b'\\' => {
                    self.pos += 1;
                    self.escape(&mut out)?;
                }
                _ => {
                    self.pos += 1;
                    return Ok(out);
                }
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), DecodeError> {
        let Some(ch) = self.text[self.pos..].chars().next() else {
            return Err(self.error("unterminated escape"));
        };
        self.pos += ch.len_utf8();
        match ch {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'u' => {
                let hex = self
                    .text
                    .get(self.pos..self.pos + 4)
                    .ok_or_else(|| self.error("truncated \\u escape"))?;
                let code =
                    u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid \\u escape"))?;
                self.pos += 4;
                // Lone surrogates cannot be represented; substitute.
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            'x' => {
                let hex = self
                    .text
                    .get(self.pos..self.pos + 2)
                    .ok_or_else(|| self.error("truncated \\x escape"))?;
                let code =
                    u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid \\x escape"))?;
                self.pos += 2;
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            // `\'`, `\"`, `\\`, `\/` and any other escaped char stand for themselves.
            other => out.push(other),
        }
        Ok(())
    }
}
