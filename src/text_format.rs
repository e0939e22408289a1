//! Human-readable protobuf text format.
//!
//! [`to_text`] prints `name: value` lines with nested messages as indented
//! `name { ... }` blocks, [`from_text`] parses that notation back, and
//! [`decode_raw`] renders arbitrary wire data by field number without a
//! schema, the way `protoc --decode_raw` does.
//!
//! # Beispiel
//!
//! ```
//! use protodyn::{catalog, text_format, MessageValue, Value};
//!
//! let mut simple = MessageValue::new(catalog::simple());
//! simple.set(1, 10).unwrap();
//! simple.set(4, vec![Value::I32(1), Value::I32(2)]).unwrap();
//!
//! let text = text_format::to_text(&simple);
//! assert_eq!(text, "id: 10\nsample_list: 1\nsample_list: 2\n");
//! assert_eq!(text_format::from_text(&text, &catalog::simple()).unwrap(), simple);
//! ```

use std::fmt::{self, Write as _};
use std::sync::Arc;

use crate::codec::RECURSION_LIMIT;
use crate::message::MessageValue;
use crate::schema::{FieldDescriptor, FieldKind, FieldType, MessageSchema, ScalarType};
use crate::value::{MapKey, Value};
use crate::wire::{RawValue, Records};
use crate::{Error, Result};

const INDENT: usize = 2;

// ============================================================================
// Printing
// ============================================================================

/// Renders `message` in text format.
pub fn to_text(message: &MessageValue) -> String {
    let mut out = String::new();
    write_message(&mut out, message, 0);
    out
}

impl fmt::Display for MessageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_text(self))
    }
}

fn write_message(out: &mut String, message: &MessageValue, indent: usize) {
    for (field, value) in message.fields() {
        let name = field.name();
        match (field.kind(), value) {
            (FieldKind::Singular(ty), value) => write_element(out, indent, name, ty, value),
            (FieldKind::Repeated(ty), Value::List(items)) => {
                for item in items {
                    write_element(out, indent, name, ty, item);
                }
            }
            (FieldKind::Map { value: value_type, .. }, Value::Map(map)) => {
                for (key, entry) in map.iter() {
                    let _ = writeln!(out, "{:indent$}{name} {{", "");
                    let inner = indent + INDENT;
                    let _ = writeln!(out, "{:inner$}key: {}", "", format_key(key));
                    write_element(out, inner, "value", value_type, entry);
                    let _ = writeln!(out, "{:indent$}}}", "");
                }
            }
            (kind, value) => {
                log::warn!("{name}: {} does not fit {}", value.describe(), kind.describe());
            }
        }
    }
    for record in message.unknown_fields() {
        write_raw_record(out, record.field_number, record.value.as_raw(), indent, 0);
    }
}

fn write_element(out: &mut String, indent: usize, name: &str, ty: &FieldType, value: &Value) {
    match (ty, value) {
        (FieldType::Message(_), Value::Message(m)) => {
            let _ = writeln!(out, "{:indent$}{name} {{", "");
            write_message(out, m, indent + INDENT);
            let _ = writeln!(out, "{:indent$}}}", "");
        }
        (FieldType::Enum(desc), Value::Enum(n)) => match desc.name_of(*n) {
            Some(symbol) => {
                let _ = writeln!(out, "{:indent$}{name}: {symbol}", "");
            }
            None => {
                let _ = writeln!(out, "{:indent$}{name}: {n}", "");
            }
        },
        (_, value) => {
            let _ = writeln!(out, "{:indent$}{name}: {}", "", format_scalar(value));
        }
    }
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::F32(v) => format_float(f64::from(*v), format!("{v:?}")),
        Value::F64(v) => format_float(*v, format!("{v:?}")),
        Value::String(s) => quote_str(s),
        Value::Bytes(b) => quote_bytes(b),
        Value::Enum(n) => n.to_string(),
        other => other.describe().into_owned(),
    }
}

fn format_float(v: f64, shortest: String) -> String {
    if v.is_nan() {
        "nan".into()
    } else if v.is_infinite() {
        if v > 0.0 { "inf".into() } else { "-inf".into() }
    } else {
        shortest
    }
}

fn format_key(key: &MapKey) -> String {
    match key {
        MapKey::String(s) => quote_str(s),
        other => other.to_string(),
    }
}

fn push_escaped_byte(out: &mut String, byte: u8) {
    match byte {
        b'\n' => out.push_str("\\n"),
        b'\r' => out.push_str("\\r"),
        b'\t' => out.push_str("\\t"),
        b'"' => out.push_str("\\\""),
        b'\'' => out.push_str("\\'"),
        b'\\' => out.push_str("\\\\"),
        0x20..=0x7E => out.push(char::from(byte)),
        _ => {
            let _ = write!(out, "\\{byte:03o}");
        }
    }
}

/// Quotes a string; non-ASCII characters stay as UTF-8.
fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch.is_ascii() {
            push_escaped_byte(&mut out, ch as u8);
        } else {
            out.push(ch);
        }
    }
    out.push('"');
    out
}

/// Quotes raw bytes; everything outside printable ASCII becomes an octal escape.
fn quote_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &byte in bytes {
        push_escaped_byte(&mut out, byte);
    }
    out.push('"');
    out
}

// ============================================================================
// Schema-less rendering
// ============================================================================

/// Renders wire data by field number only.
///
/// Length-delimited payloads that parse completely as a non-empty message are
/// shown as nested blocks, everything else as quoted strings.
pub fn decode_raw(bytes: &[u8]) -> Result<String> {
    let mut out = String::new();
    for record in Records::new(bytes) {
        let record = record?;
        write_raw_record(&mut out, record.field_number, record.value, 0, 0);
    }
    Ok(out)
}

fn write_raw_record(out: &mut String, number: u32, value: RawValue<'_>, indent: usize, depth: usize) {
    match value {
        RawValue::Varint(v) => {
            let _ = writeln!(out, "{:indent$}{number}: {v}", "");
        }
        RawValue::Fixed32(v) => {
            let _ = writeln!(out, "{:indent$}{number}: 0x{v:08x}", "");
        }
        RawValue::Fixed64(v) => {
            let _ = writeln!(out, "{:indent$}{number}: 0x{v:016x}", "");
        }
        RawValue::LengthDelimited(payload) if looks_like_message(payload, depth) => {
            let _ = writeln!(out, "{:indent$}{number} {{", "");
            for record in Records::new(payload).flatten() {
                write_raw_record(out, record.field_number, record.value, indent + INDENT, depth + 1);
            }
            let _ = writeln!(out, "{:indent$}}}", "");
        }
        RawValue::LengthDelimited(payload) => {
            let _ = writeln!(out, "{:indent$}{number}: {}", "", quote_bytes(payload));
        }
    }
}

fn looks_like_message(payload: &[u8], depth: usize) -> bool {
    !payload.is_empty() && depth < RECURSION_LIMIT && Records::new(payload).all(|r| r.is_ok())
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses text format into an instance of `schema`.
///
/// Fails with `MalformedInput` for syntax errors, `UnknownField` for names
/// the schema does not declare and `TypeMismatch` for values of the wrong kind.
pub fn from_text(text: &str, schema: &Arc<MessageSchema>) -> Result<MessageValue> {
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut message = MessageValue::new(Arc::clone(schema));
    parser.parse_message(&mut message, None, 0)?;
    Ok(message)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(Vec<u8>),
    Punct(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) | Token::Number(s) => f.write_str(s),
            Token::Str(b) => f.write_str(&quote_bytes(b)),
            Token::Punct(c) => write!(f, "'{c}'"),
        }
    }
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self { src: text.as_bytes(), pos: 0, line: 1 }
    }

    fn error(&self, msg: impl fmt::Display) -> Error {
        Error::malformed(format!("line {}: {msg}", self.line))
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();
        while let Some(byte) = self.peek() {
            match byte {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'#' => {
                    while self.peek().is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                b'"' | b'\'' => {
                    let line = self.line;
                    tokens.push((Token::Str(self.string(byte)?), line));
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    let start = self.pos;
                    while self.peek().is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.') {
                        self.pos += 1;
                    }
                    tokens.push((Token::Ident(self.slice(start)), self.line));
                }
                b'0'..=b'9' | b'.' => {
                    let start = self.pos;
                    self.number();
                    tokens.push((Token::Number(self.slice(start)), self.line));
                }
                b':' | b'{' | b'}' | b'<' | b'>' | b'[' | b']' | b',' | b';' | b'-' => {
                    tokens.push((Token::Punct(char::from(byte)), self.line));
                    self.pos += 1;
                }
                other => return Err(self.error(format!("unexpected character {:?}", char::from(other)))),
            }
        }
        Ok(tokens)
    }

    fn slice(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    /// Consumes a numeric literal including exponent signs (`1e-5`).
    fn number(&mut self) {
        let start = self.pos;
        while let Some(b) = self.peek() {
            let hex = self.src[start..self.pos].starts_with(b"0x") || self.src[start..self.pos].starts_with(b"0X");
            if b.is_ascii_alphanumeric() || b == b'.' {
                self.pos += 1;
            } else if (b == b'-' || b == b'+')
                && !hex
                && self.pos > start
                && matches!(self.src[self.pos - 1], b'e' | b'E')
            {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<Vec<u8>> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            let Some(byte) = self.peek() else {
                return Err(self.error("unterminated string"));
            };
            self.pos += 1;
            match byte {
                b'\n' => return Err(self.error("newline in string")),
                b if b == quote => return Ok(out),
                b'\\' => self.escape(&mut out)?,
                b => out.push(b),
            }
        }
    }

    fn escape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let Some(byte) = self.peek() else {
            return Err(self.error("unterminated escape"));
        };
        self.pos += 1;
        match byte {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'v' => out.push(0x0B),
            b'\\' | b'\'' | b'"' | b'?' => out.push(byte),
            b'0'..=b'7' => {
                let mut value = u32::from(byte - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                let byte = u8::try_from(value).map_err(|_| self.error(format!("octal escape \\{value:o} out of range")))?;
                out.push(byte);
            }
            b'x' | b'X' => {
                let value = self.hex_digits(2)?;
                out.push(value as u8);
            }
            b'u' | b'U' => {
                let width = if byte == b'u' { 4 } else { 8 };
                let value = self.hex_digits(width)?;
                let ch = char::from_u32(value).ok_or_else(|| self.error(format!("invalid code point {value:#x}")))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            other => return Err(self.error(format!("unknown escape \\{}", char::from(other)))),
        }
        Ok(())
    }

    /// Reads up to `max` hex digits (at least one).
    fn hex_digits(&mut self, max: usize) -> Result<u32> {
        let mut value = 0u32;
        let mut count = 0;
        while count < max {
            match self.peek().and_then(|b| char::from(b).to_digit(16)) {
                Some(d) => {
                    value = value * 16 + d;
                    self.pos += 1;
                    count += 1;
                }
                None => break,
            }
        }
        if count == 0 {
            return Err(self.error("hex escape without digits"));
        }
        Ok(value)
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(_, line)| *line)
    }

    fn error(&self, msg: impl fmt::Display) -> Error {
        Error::malformed(format!("line {}: {msg}", self.line()))
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek() == Some(&Token::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        if self.eat_punct(c) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(t) => self.error(format!("expected '{c}', found {t}")),
            None => self.error(format!("expected '{c}', found end of input")),
        })
    }

    /// Consumes `{` or `<` and returns the matching closing delimiter.
    fn open_block(&mut self) -> Result<char> {
        if self.eat_punct('{') {
            Ok('}')
        } else if self.eat_punct('<') {
            Ok('>')
        } else {
            Err(self.error("expected '{' or '<'"))
        }
    }

    fn eat_separator(&mut self) {
        if !self.eat_punct(',') {
            self.eat_punct(';');
        }
    }

    fn parse_message(&mut self, message: &mut MessageValue, close: Option<char>, depth: usize) -> Result<()> {
        if depth > RECURSION_LIMIT {
            return Err(self.error(format!("message nesting exceeds {RECURSION_LIMIT} levels")));
        }
        loop {
            match (self.peek(), close) {
                (None, None) => return Ok(()),
                (None, Some(c)) => return Err(self.error(format!("expected '{c}', found end of input"))),
                (Some(Token::Punct(p)), Some(c)) if *p == c => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => {
                    self.parse_field(message, depth)?;
                    self.eat_separator();
                }
            }
        }
    }

    fn parse_field(&mut self, message: &mut MessageValue, depth: usize) -> Result<()> {
        let schema = Arc::clone(message.schema());
        let field = match self.next() {
            Some(Token::Ident(name)) => schema
                .field_by_name(&name)
                .ok_or_else(|| Error::UnknownField(format!("{}.{name}", schema.full_name())))?,
            Some(Token::Number(text)) => text
                .parse::<u32>()
                .ok()
                .and_then(|n| schema.field(n))
                .ok_or_else(|| Error::UnknownField(format!("{}#{text}", schema.full_name())))?,
            Some(other) => return Err(self.error(format!("expected field name, found {other}"))),
            None => return Err(self.error("expected field name, found end of input")),
        };
        let number = field.number();
        match field.kind() {
            FieldKind::Singular(FieldType::Message(_)) => {
                self.eat_punct(':');
                let close = self.open_block()?;
                let nested = message.message_mut(number)?;
                self.parse_message(nested, Some(close), depth + 1)
            }
            FieldKind::Singular(ty) => {
                self.expect_punct(':')?;
                let value = self.parse_value(field, ty)?;
                message.set(number, value)
            }
            FieldKind::Repeated(FieldType::Message(_)) => {
                self.eat_punct(':');
                self.each_element(|parser| {
                    let close = parser.open_block()?;
                    let element = message.add_message(number)?;
                    parser.parse_message(element, Some(close), depth + 1)
                })
            }
            FieldKind::Repeated(ty) => {
                self.expect_punct(':')?;
                self.each_element(|parser| {
                    let value = parser.parse_value(field, ty)?;
                    message.add_repeated(number, value)
                })
            }
            FieldKind::Map { key, value } => {
                self.eat_punct(':');
                self.each_element(|parser| {
                    let (k, v) = parser.parse_map_entry(field, *key, value, depth)?;
                    message.map_put(number, k, v)
                })
            }
        }
    }

    /// Runs `f` once, or once per element of a `[a, b, ...]` list.
    fn each_element(&mut self, mut f: impl FnMut(&mut Self) -> Result<()>) -> Result<()> {
        if !self.eat_punct('[') {
            return f(self);
        }
        if self.eat_punct(']') {
            return Ok(());
        }
        loop {
            f(self)?;
            if self.eat_punct(']') {
                return Ok(());
            }
            self.expect_punct(',')?;
        }
    }

    fn parse_map_entry(
        &mut self,
        field: &FieldDescriptor,
        key_type: ScalarType,
        value_type: &FieldType,
        depth: usize,
    ) -> Result<(MapKey, Value)> {
        let close = self.open_block()?;
        let mut key = None;
        let mut value = None;
        loop {
            match self.next() {
                Some(Token::Punct(p)) if p == close => break,
                Some(Token::Ident(name)) if name == "key" => {
                    self.expect_punct(':')?;
                    key = self.parse_scalar(field, key_type)?.to_map_key();
                }
                Some(Token::Ident(name)) if name == "value" => match value_type {
                    FieldType::Message(schema) => {
                        self.eat_punct(':');
                        let inner = self.open_block()?;
                        let slot = value.get_or_insert_with(|| Value::from(MessageValue::new(Arc::clone(schema))));
                        if let Some(nested) = slot.as_message_mut() {
                            self.parse_message(nested, Some(inner), depth + 2)?;
                        }
                    }
                    ty => {
                        self.expect_punct(':')?;
                        value = Some(self.parse_value(field, ty)?);
                    }
                },
                Some(Token::Ident(name)) => {
                    return Err(Error::UnknownField(format!("{} entry.{name}", field.name())));
                }
                Some(other) => return Err(self.error(format!("expected 'key' or 'value', found {other}"))),
                None => return Err(self.error(format!("expected '{close}', found end of input"))),
            }
            self.eat_separator();
        }
        let key = key
            .or_else(|| MapKey::default_for(key_type))
            .ok_or_else(|| Error::type_mismatch(field.name().to_string(), "map key", key_type.name()))?;
        Ok((key, value.unwrap_or_else(|| Value::default_for(value_type))))
    }

    fn parse_value(&mut self, field: &FieldDescriptor, ty: &FieldType) -> Result<Value> {
        match ty {
            FieldType::Scalar(s) => self.parse_scalar(field, *s),
            FieldType::Enum(desc) => {
                let negative = self.eat_punct('-');
                match self.next() {
                    Some(Token::Ident(name)) if !negative => desc.number_of(&name).map(Value::Enum).ok_or_else(|| {
                        Error::type_mismatch(
                            field.name().to_string(),
                            format!("value of enum {}", desc.full_name()),
                            name,
                        )
                    }),
                    Some(Token::Number(text)) => parse_integer(&text, negative)
                        .and_then(|n| i32::try_from(n).ok())
                        .map(Value::Enum)
                        .ok_or_else(|| mismatch(field, "enum number", &Token::Number(text))),
                    other => Err(self.unexpected(field, "enum name or number", other)),
                }
            }
            FieldType::Message(schema) => Err(self.error(format!(
                "field {}: message {} needs a '{{' block",
                field.name(),
                schema.full_name()
            ))),
        }
    }

    fn parse_scalar(&mut self, field: &FieldDescriptor, ty: ScalarType) -> Result<Value> {
        match ty {
            ScalarType::String | ScalarType::Bytes => {
                let mut bytes = match self.next() {
                    Some(Token::Str(b)) => b,
                    other => return Err(self.unexpected(field, "quoted string", other)),
                };
                // benachbarte Strings werden verkettet
                while let Some(Token::Str(_)) = self.peek() {
                    if let Some(Token::Str(more)) = self.next() {
                        bytes.extend(more);
                    }
                }
                if ty == ScalarType::Bytes {
                    return Ok(Value::Bytes(bytes));
                }
                String::from_utf8(bytes)
                    .map(Value::String)
                    .map_err(|e| self.error(format!("field {}: invalid UTF-8 in string: {e}", field.name())))
            }
            ScalarType::Bool => match self.next() {
                Some(Token::Ident(s)) if matches!(s.as_str(), "true" | "True" | "t") => Ok(Value::Bool(true)),
                Some(Token::Ident(s)) if matches!(s.as_str(), "false" | "False" | "f") => Ok(Value::Bool(false)),
                Some(Token::Number(s)) if s == "1" => Ok(Value::Bool(true)),
                Some(Token::Number(s)) if s == "0" => Ok(Value::Bool(false)),
                other => Err(self.unexpected(field, "bool", other)),
            },
            ScalarType::Float => {
                let (negative, token) = (self.eat_punct('-'), self.next());
                let v: f32 = parse_float(token.as_ref()).ok_or_else(|| self.unexpected(field, "float", token))?;
                Ok(Value::F32(if negative { -v } else { v }))
            }
            ScalarType::Double => {
                let (negative, token) = (self.eat_punct('-'), self.next());
                let v: f64 = parse_float(token.as_ref()).ok_or_else(|| self.unexpected(field, "double", token))?;
                Ok(Value::F64(if negative { -v } else { v }))
            }
            int => {
                let negative = self.eat_punct('-');
                let token = self.next();
                let wide = match &token {
                    Some(Token::Number(text)) => parse_integer(text, negative),
                    _ => None,
                };
                let value = wide.and_then(|w| match int {
                    ScalarType::Int32 | ScalarType::SInt32 | ScalarType::SFixed32 => i32::try_from(w).ok().map(Value::I32),
                    ScalarType::Int64 | ScalarType::SInt64 | ScalarType::SFixed64 => i64::try_from(w).ok().map(Value::I64),
                    ScalarType::UInt32 | ScalarType::Fixed32 => u32::try_from(w).ok().map(Value::U32),
                    _ => u64::try_from(w).ok().map(Value::U64),
                });
                value.ok_or_else(|| self.unexpected(field, int.name(), token))
            }
        }
    }

    /// `TypeMismatch` for a wrong-kind token, `MalformedInput` at end of input.
    fn unexpected(&self, field: &FieldDescriptor, expected: &'static str, found: Option<Token>) -> Error {
        match found {
            Some(token) => mismatch(field, expected, &token),
            None => self.error(format!("field {}: expected {expected}, found end of input", field.name())),
        }
    }
}

fn mismatch(field: &FieldDescriptor, expected: &'static str, found: &Token) -> Error {
    Error::type_mismatch(field.name().to_string(), expected, found.to_string())
}

/// Decimal, `0x` hexadecimal or leading-zero octal.
fn parse_integer(text: &str, negative: bool) -> Option<i128> {
    let (digits, radix) = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = i128::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Float literal (optional `f` suffix) or `inf`/`infinity`/`nan` in any case.
fn parse_float<F: std::str::FromStr + From<f32>>(token: Option<&Token>) -> Option<F> {
    match token? {
        Token::Number(text) if text.starts_with("0x") || text.starts_with("0X") => {
            parse_integer(text, false)?.to_string().parse().ok()
        }
        Token::Number(text) => {
            let trimmed = text.strip_suffix(|c: char| c == 'f' || c == 'F').unwrap_or(text);
            trimmed.parse().ok()
        }
        Token::Ident(word) => match word.to_ascii_lowercase().as_str() {
            "inf" | "infinity" => Some(F::from(f32::INFINITY)),
            "nan" => Some(F::from(f32::NAN)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog, codec};

    fn address_book() -> MessageValue {
        let mut book = MessageValue::new(catalog::address_book());
        let person = book.add_message(1).unwrap();
        person.set_by_name("name", "John Doe").unwrap();
        person.set_by_name("id", 1234).unwrap();
        person.set_by_name("email", "jdoe@example.com").unwrap();
        let phone = person.add_message(4).unwrap();
        phone.set(1, "555-4321").unwrap();
        phone.set(2, Value::Enum(1)).unwrap();
        book
    }

    #[test]
    fn prints_nested_blocks_and_enum_names() {
        let expected = "\
people {
  name: \"John Doe\"
  id: 1234
  email: \"jdoe@example.com\"
  phones {
    number: \"555-4321\"
    type: HOME
  }
}
";
        assert_eq!(to_text(&address_book()), expected);
        assert_eq!(address_book().to_string(), expected);
    }

    #[test]
    fn decode_raw_uses_field_numbers() {
        let bytes = codec::encode(&address_book()).unwrap();
        let expected = "\
1 {
  1: \"John Doe\"
  2: 1234
  3: \"jdoe@example.com\"
  4 {
    1: \"555-4321\"
    2: 1
  }
}
";
        assert_eq!(decode_raw(&bytes).unwrap(), expected);
    }

    #[test]
    fn decode_raw_fixed_width_as_hex() {
        let bytes = [0x0D, 0x2A, 0, 0, 0, 0x11, 1, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode_raw(&bytes).unwrap(), "1: 0x0000002a\n2: 0x0000000000000001\n");
        assert!(decode_raw(&[0x0B]).unwrap_err().is_malformed());
        assert_eq!(decode_raw(&[0x0A, 0x00]).unwrap(), "1: \"\"\n");
    }

    #[test]
    fn text_round_trip_preserves_binary() {
        let book = address_book();
        let parsed = from_text(&to_text(&book), &catalog::address_book()).unwrap();
        assert_eq!(codec::encode(&parsed).unwrap(), codec::encode(&book).unwrap());
    }

    #[test]
    fn maps_and_oneofs() {
        let mut menu = MessageValue::new(catalog::drink_map());
        menu.map_entry_message(1, "latte").unwrap().set(2, 40).unwrap();
        let text = to_text(&menu);
        assert_eq!(text, "menu {\n  key: \"latte\"\n  value {\n    price: 40\n  }\n}\n");
        assert_eq!(from_text(&text, &catalog::drink_map()).unwrap(), menu);

        let result = from_text("this: \"a\" that: \"b\"", &catalog::result()).unwrap();
        assert_eq!(result.which_oneof("result").unwrap(), Some(2));
    }

    #[test]
    fn lenient_syntax() {
        let text = r#"
            # comment
            id: 0x10, name: "hel" 'lo';
            sample_list: [1, -2, 07]
            is_simple: t
        "#;
        let m = from_text(text, &catalog::simple()).unwrap();
        assert_eq!(m.get(1).unwrap().as_i32(), Some(16));
        assert_eq!(m.get(2).unwrap().as_bool(), Some(true));
        assert_eq!(m.get(3).unwrap().as_str(), Some("hello"));
        assert_eq!(
            m.get(4).unwrap().into_owned(),
            Value::List(vec![Value::I32(1), Value::I32(-2), Value::I32(7)])
        );
    }

    #[test]
    fn angle_brackets_and_optional_colon() {
        let m = from_text("single_dummy: < id: 1 > list_of_dummy { name: \"x\" }", &catalog::complex()).unwrap();
        assert!(m.has(2));
        assert_eq!(m.get(3).unwrap().as_list().unwrap().len(), 1);
    }

    #[test]
    fn escapes_round_trip() {
        let schema = MessageSchema::builder("t.S")
            .singular(1, "s", FieldType::Scalar(ScalarType::String))
            .singular(2, "b", FieldType::Scalar(ScalarType::Bytes))
            .build()
            .unwrap();
        let mut m = MessageValue::new(Arc::clone(&schema));
        m.set(1, "tab\there \"quoted\" ümlaut\n").unwrap();
        m.set(2, vec![0u8, 0xFF, b'a', b'\\']).unwrap();
        let text = to_text(&m);
        assert_eq!(text, "s: \"tab\\there \\\"quoted\\\" ümlaut\\n\"\nb: \"\\000\\377a\\\\\"\n");
        assert_eq!(from_text(&text, &schema).unwrap(), m);
        let hex = from_text(r#"b: "\x41ä""#, &schema).unwrap();
        assert_eq!(hex.get(2).unwrap().as_bytes(), Some(&[0x41, 0xC3, 0xA4][..]));
    }

    #[test]
    fn floats_and_specials() {
        let schema = MessageSchema::builder("t.F")
            .singular(1, "d", FieldType::Scalar(ScalarType::Double))
            .singular(2, "f", FieldType::Scalar(ScalarType::Float))
            .build()
            .unwrap();
        let m = from_text("d: -inf f: 1.5e-3f", &schema).unwrap();
        assert_eq!(m.get(1).unwrap().as_f64(), Some(f64::NEG_INFINITY));
        assert_eq!(m.get(2).unwrap().into_owned(), Value::F32(1.5e-3));
        assert_eq!(to_text(&m), "d: -inf\nf: 0.0015\n");
        let nan = from_text("d: nan", &schema).unwrap();
        assert!(nan.get(1).unwrap().as_f64().unwrap().is_nan());
    }

    #[test]
    fn errors_by_kind() {
        let schema = catalog::simple();
        assert!(matches!(from_text("colour: 1", &schema), Err(Error::UnknownField(_))));
        assert!(matches!(from_text("id: \"ten\"", &schema), Err(Error::TypeMismatch { .. })));
        assert!(matches!(from_text("id: 1.5", &schema), Err(Error::TypeMismatch { .. })));
        assert!(matches!(from_text("id: 3000000000", &schema), Err(Error::TypeMismatch { .. })));
        assert!(from_text("id 1", &schema).unwrap_err().is_malformed());
        assert!(from_text("name: \"open", &schema).unwrap_err().is_malformed());
        assert!(from_text("id: ", &schema).unwrap_err().is_malformed());
        assert!(from_text("id: 1 }", &schema).unwrap_err().is_malformed());
        assert!(from_text("single_dummy { id: 1", &catalog::complex()).unwrap_err().is_malformed());
    }

    #[test]
    fn unknown_enum_name_is_type_mismatch() {
        let err = from_text("eye_color: PURPLE", &catalog::enumeration()).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
        let m = from_text("eye_color: 42", &catalog::enumeration()).unwrap();
        assert_eq!(m.get(1).unwrap().as_enum(), Some(42));
        assert_eq!(to_text(&m), "eye_color: 42\n");
    }

    #[test]
    fn unknown_fields_printed_by_number() {
        let m = codec::decode(&[0x08, 0x01, 0xA0, 0x06, 0x2A], &catalog::simple()).unwrap();
        assert_eq!(to_text(&m), "id: 1\n100: 42\n");
    }
}
