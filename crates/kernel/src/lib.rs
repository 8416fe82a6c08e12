//! Shared kernel for the authorization runtime.
//!
//! This crate carries only the data types and pure composition logic shared
//! across the entity store, the engine adapter and the session runner: entity
//! identity, attribute values, entity collections and the `AuthCheck` /
//! `AuthResponse` records. It has no dependency on Cedar or on any I/O
//! runtime — translation to/from the native policy engine representation is
//! the engine crate's job, not this one's.

pub mod domain;

pub use domain::{
    attribute::AttributeValue,
    check::{AuthCheck, AuthResponse, Single},
    entity::{Entities, Entity},
    entity_uid::{EntityTypeName, EntityUid, ParseError},
    error::AuthError,
    request::{CedarPrincipal, CedarRequest, Decision, Diagnostics, ResourceRef},
};
