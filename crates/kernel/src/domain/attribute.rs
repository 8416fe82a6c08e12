//! `AttributeValue`: the tagged sum of values an entity or a request context
//! can carry.

use crate::domain::entity_uid::EntityUid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// A single Cedar-shaped attribute value. Immutable and structurally
/// comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttributeValue {
    Bool(bool),
    Long(i64),
    String(String),
    /// Ordered-insertion set of values.
    Set(Vec<AttributeValue>),
    /// Mapping from attribute name to value.
    Record(HashMap<String, AttributeValue>),
    EntityRef(EntityUid),
    /// Extension value: an IP address, stored as its textual form.
    Ip(String),
    /// Extension value: an arbitrary-precision decimal, stored as text.
    Decimal(String),
    /// Extension value: an instant in time.
    DateTime(OffsetDateTime),
    /// Extension value: a duration.
    Duration(std::time::Duration),
}

impl AttributeValue {
    pub fn bool(value: bool) -> Self {
        Self::Bool(value)
    }

    pub fn long(value: i64) -> Self {
        Self::Long(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn set(values: impl IntoIterator<Item = AttributeValue>) -> Self {
        Self::Set(values.into_iter().collect())
    }

    pub fn record(fields: impl IntoIterator<Item = (String, AttributeValue)>) -> Self {
        Self::Record(fields.into_iter().collect())
    }

    pub fn entity_ref(uid: EntityUid) -> Self {
        Self::EntityRef(uid)
    }

    pub fn ip(addr: impl Into<String>) -> Self {
        Self::Ip(addr.into())
    }

    pub fn decimal(value: impl Into<String>) -> Self {
        Self::Decimal(value.into())
    }

    pub fn datetime(value: OffsetDateTime) -> Self {
        Self::DateTime(value)
    }

    pub fn duration(value: std::time::Duration) -> Self {
        Self::Duration(value)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            Self::Record(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_entity_ref(&self) -> Option<&EntityUid> {
        match self {
            Self::EntityRef(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Self::Long(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record(_))
    }

    pub fn is_entity_ref(&self) -> bool {
        matches!(self, Self::EntityRef(_))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<EntityUid> for AttributeValue {
    fn from(value: EntityUid) -> Self {
        Self::EntityRef(value)
    }
}
