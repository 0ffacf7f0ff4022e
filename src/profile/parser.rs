//! Meson cross-file parser
//!
//! A cross file is an INI document whose values are written in a small subset
//! of the meson language: single-quoted strings, booleans, integers, arrays,
//! references to `[constants]`, `+` concatenation and `/` path joining.

use crate::profile::lexer::{Lexer, Tok};
use crate::profile::ProfileError;
use std::collections::BTreeMap;

/// An evaluated cross-file value
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interpret the value as a list of strings; a bare string is a one-element list
    pub fn to_string_list(&self) -> Option<Vec<String>> {
        match self {
            Value::Str(s) => Some(vec![s.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Array(_) => "array",
        }
    }
}

/// Raw `key = value` entry before evaluation
#[derive(Debug, Clone)]
struct RawEntry {
    key: String,
    expr: String,
    line: usize,
}

/// A parsed and evaluated cross file: section -> key -> value, in file order
#[derive(Debug, Clone, Default)]
pub struct CrossFile {
    pub sections: BTreeMap<String, Vec<(String, Value)>>,
}

impl CrossFile {
    /// Parse and evaluate a cross file
    ///
    /// `[constants]` is evaluated first so any other section may reference its
    /// entries, regardless of where the section appears in the file.
    pub fn parse(profile: &str, text: &str) -> Result<Self, ProfileError> {
        let raw = split_sections(profile, text)?;

        let mut constants: BTreeMap<String, Value> = BTreeMap::new();
        let mut sections = BTreeMap::new();

        if let Some(entries) = raw.iter().find(|(name, _)| name == "constants").map(|(_, e)| e) {
            let mut evaluated = Vec::new();
            for entry in entries {
                let value = eval(&entry.expr, &constants).map_err(|message| {
                    ProfileError::ConfigParse {
                        profile: profile.to_string(),
                        line: entry.line,
                        message,
                    }
                })?;
                constants.insert(entry.key.clone(), value.clone());
                evaluated.push((entry.key.clone(), value));
            }
            sections.insert("constants".to_string(), evaluated);
        }

        for (name, entries) in raw.iter().filter(|(name, _)| name != "constants") {
            let mut evaluated = Vec::with_capacity(entries.len());
            for entry in entries {
                let value = eval(&entry.expr, &constants).map_err(|message| {
                    ProfileError::ConfigParse {
                        profile: profile.to_string(),
                        line: entry.line,
                        message,
                    }
                })?;
                evaluated.push((entry.key.clone(), value));
            }
            sections.insert(name.clone(), evaluated);
        }

        Ok(Self { sections })
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn section(&self, name: &str) -> Option<&[(String, Value)]> {
        self.sections.get(name).map(Vec::as_slice)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.section(section)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// Split INI text into sections of raw entries, joining continuation lines
fn split_sections(profile: &str, text: &str) -> Result<Vec<(String, Vec<RawEntry>)>, ProfileError> {
    let parse_err = |line: usize, message: String| ProfileError::ConfigParse {
        profile: profile.to_string(),
        line,
        message,
    };

    let mut sections: Vec<(String, Vec<RawEntry>)> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indented = line.starts_with(|c: char| c.is_whitespace());

        if indented {
            // continuation of the previous value
            let entry = sections
                .last_mut()
                .and_then(|(_, entries)| entries.last_mut())
                .ok_or_else(|| parse_err(line_no, "continuation line without a key".to_string()))?;
            entry.expr.push('\n');
            entry.expr.push_str(trimmed);
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .ok_or_else(|| parse_err(line_no, format!("malformed section header '{}'", trimmed)))?
                .trim();
            if name.is_empty() {
                return Err(parse_err(line_no, "empty section name".to_string()));
            }
            if sections.iter().any(|(existing, _)| existing == name) {
                return Err(parse_err(line_no, format!("duplicate section [{}]", name)));
            }
            sections.push((name.to_string(), Vec::new()));
            continue;
        }

        let (key, expr) = trimmed
            .split_once('=')
            .ok_or_else(|| parse_err(line_no, format!("expected 'key = value', got '{}'", trimmed)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(parse_err(line_no, "empty key".to_string()));
        }

        let (section_name, entries) = sections
            .last_mut()
            .ok_or_else(|| parse_err(line_no, format!("key '{}' outside of any section", key)))?;
        if entries.iter().any(|e| e.key == key) {
            return Err(parse_err(
                line_no,
                format!("duplicate key '{}' in section [{}]", key, section_name),
            ));
        }
        entries.push(RawEntry {
            key: key.to_string(),
            expr: expr.trim().to_string(),
            line: line_no,
        });
    }

    Ok(sections)
}

/// Evaluate a value expression against the known constants
pub fn eval(src: &str, constants: &BTreeMap<String, Value>) -> Result<Value, String> {
    let mut parser = ValueParser::new(src, constants)?;
    let value = parser.sum()?;
    if parser.tok != Tok::Eof {
        return Err(format!("unexpected trailing input {:?}", parser.tok));
    }
    Ok(value)
}

struct ValueParser<'a> {
    lexer: Lexer<'a>,
    tok: Tok,
    constants: &'a BTreeMap<String, Value>,
}

impl<'a> ValueParser<'a> {
    fn new(src: &'a str, constants: &'a BTreeMap<String, Value>) -> Result<Self, String> {
        let mut lexer = Lexer::new(src);
        let tok = lexer.next_tok()?;
        Ok(Self { lexer, tok, constants })
    }

    fn advance(&mut self) -> Result<Tok, String> {
        let next = self.lexer.next_tok()?;
        Ok(std::mem::replace(&mut self.tok, next))
    }

    fn expect(&mut self, want: Tok) -> Result<(), String> {
        if self.tok == want {
            self.advance()?;
            Ok(())
        } else {
            Err(format!("expected {:?}, found {:?}", want, self.tok))
        }
    }

    // sum := product ('+' product)*
    fn sum(&mut self) -> Result<Value, String> {
        let mut lhs = self.product()?;
        while self.tok == Tok::Plus {
            self.advance()?;
            let rhs = self.product()?;
            lhs = concat(lhs, rhs)?;
        }
        Ok(lhs)
    }

    // product := atom ('/' atom)*
    fn product(&mut self) -> Result<Value, String> {
        let mut lhs = self.atom()?;
        while self.tok == Tok::Slash {
            self.advance()?;
            let rhs = self.atom()?;
            lhs = join_path(lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn atom(&mut self) -> Result<Value, String> {
        match self.advance()? {
            Tok::Str(s) => Ok(Value::Str(s)),
            Tok::Int(i) => Ok(Value::Int(i)),
            Tok::Ident(name) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => self
                    .constants
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| format!("undefined constant '{}'", name)),
            },
            Tok::LParen => {
                let inner = self.sum()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Tok::LBracket => {
                let mut items = Vec::new();
                while self.tok != Tok::RBracket {
                    items.push(self.sum()?);
                    if self.tok == Tok::Comma {
                        self.advance()?;
                    } else {
                        break;
                    }
                }
                self.expect(Tok::RBracket)?;
                Ok(Value::Array(items))
            }
            Tok::Eof => Err("missing value".to_string()),
            other => Err(format!("unexpected token {:?}", other)),
        }
    }
}

fn concat(lhs: Value, rhs: Value) -> Result<Value, String> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(b)
            .map(Value::Int)
            .ok_or_else(|| "integer overflow".to_string()),
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (Value::Array(mut a), other) => {
            a.push(other);
            Ok(Value::Array(a))
        }
        (a, b) => Err(format!("cannot add {} and {}", a.type_name(), b.type_name())),
    }
}

fn join_path(lhs: Value, rhs: Value) -> Result<Value, String> {
    match (lhs, rhs) {
        (Value::Str(_), Value::Str(b)) if b.starts_with('/') => Ok(Value::Str(b)),
        (Value::Str(a), Value::Str(b)) => {
            Ok(Value::Str(format!("{}/{}", a.trim_end_matches('/'), b)))
        }
        (a, b) => Err(format!("cannot join {} with {}", a.type_name(), b.type_name())),
    }
}
