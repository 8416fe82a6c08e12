//! Entity identity: `EntityUid` and its type-name component.
//!
//! Mirrors Cedar's `Type::"id"` literal syntax without depending on the
//! `cedar-policy` crate itself — the engine crate is the only place that
//! converts these into the native SDK's `EntityUid`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated, possibly namespaced Cedar entity type name, e.g. `User` or
/// `Drive::Folder`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityTypeName(String);

impl EntityTypeName {
    pub fn new(name: impl Into<String>) -> Result<Self, ParseError> {
        let name = name.into();
        if !is_valid_type_name(&name) {
            return Err(ParseError::InvalidTypeName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityTypeName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

fn is_valid_type_name(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    s.split("::").all(is_valid_ident)
}

fn is_valid_ident(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Errors raised while parsing entity-uid literals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid entity type name: {0:?}")]
    InvalidTypeName(String),
    #[error("malformed entity uid literal: {0:?}")]
    MalformedLiteral(String),
}

/// `(type-name, id-string)`. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityUid {
    entity_type: EntityTypeName,
    id: String,
}

impl EntityUid {
    pub fn new(entity_type: EntityTypeName, id: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }

    pub fn of_type(type_name: &str, id: impl Into<String>) -> Result<Self, ParseError> {
        Ok(Self::new(EntityTypeName::new(type_name)?, id))
    }

    /// Parses the canonical `Type::"id"` textual form, honoring `\"` and
    /// `\\` escapes inside the id.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let (type_part, id) =
            split_type_and_id(text).ok_or_else(|| ParseError::MalformedLiteral(text.to_string()))?;
        let entity_type = EntityTypeName::new(type_part)?;
        Ok(Self { entity_type, id })
    }

    pub fn entity_type(&self) -> &EntityTypeName {
        &self.entity_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EntityUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::\"{}\"", self.entity_type, escape(&self.id))
    }
}

impl FromStr for EntityUid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn escape(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}

/// Finds the rightmost `::"` boundary whose tail parses as a complete
/// escaped string literal, and returns `(type_name, unescaped_id)`.
fn split_type_and_id(text: &str) -> Option<(&str, String)> {
    let mut search_from = text.len();
    while let Some(rel_pos) = text[..search_from].rfind("::\"") {
        let type_part = &text[..rel_pos];
        let quoted = &text[rel_pos + 2..];
        if !type_part.is_empty() {
            if let Some(id) = parse_quoted_literal(quoted) {
                return Some((type_part, id));
            }
        }
        search_from = rel_pos;
    }
    None
}

fn parse_quoted_literal(s: &str) -> Option<String> {
    let mut chars = s.chars();
    if chars.next() != Some('"') {
        return None;
    }
    let mut out = String::new();
    let mut escaped = false;
    let mut closed = false;
    for c in chars.by_ref() {
        if escaped {
            match c {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            closed = true;
            break;
        } else {
            out.push(c);
        }
    }
    if !closed || chars.next().is_some() {
        return None;
    }
    Some(out)
}
