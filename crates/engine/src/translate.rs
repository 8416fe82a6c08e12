//! The only module in this crate (and the only module in the whole
//! workspace) that converts between kernel's agnostic types and Cedar's
//! native SDK representation.

use crate::error::EngineError;
use cedar_policy::{Context, RestrictedExpression};
use kernel::{AttributeValue, Decision, Diagnostics, Entities, Entity, EntityUid};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

pub fn to_cedar_euid(uid: &EntityUid) -> Result<cedar_policy::EntityUid, EngineError> {
    let type_name = cedar_policy::EntityTypeName::from_str(uid.entity_type().as_str())
        .map_err(|e| EngineError::TranslationError(e.to_string()))?;
    let id = cedar_policy::EntityId::from_str(uid.id())
        .map_err(|e: std::convert::Infallible| EngineError::TranslationError(e.to_string()))?;
    Ok(cedar_policy::EntityUid::from_type_name_and_id(
        type_name, id,
    ))
}

pub fn from_cedar_euid(euid: &cedar_policy::EntityUid) -> Result<EntityUid, EngineError> {
    EntityUid::parse(&euid.to_string()).map_err(|e| EngineError::TranslationError(e.to_string()))
}

pub fn attribute_to_expr(value: &AttributeValue) -> Result<RestrictedExpression, EngineError> {
    Ok(match value {
        AttributeValue::Bool(b) => RestrictedExpression::new_bool(*b),
        AttributeValue::Long(i) => RestrictedExpression::new_long(*i),
        AttributeValue::String(s) => RestrictedExpression::new_string(s.clone()),
        AttributeValue::Set(items) => RestrictedExpression::new_set(
            items
                .iter()
                .map(attribute_to_expr)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AttributeValue::Record(fields) => {
            let pairs = fields
                .iter()
                .map(|(k, v)| attribute_to_expr(v).map(|e| (k.clone(), e)))
                .collect::<Result<Vec<_>, _>>()?;
            RestrictedExpression::new_record(pairs)
                .map_err(|e| EngineError::TranslationError(e.to_string()))?
        }
        AttributeValue::EntityRef(uid) => RestrictedExpression::new_entity_uid(to_cedar_euid(uid)?),
        AttributeValue::Ip(addr) => RestrictedExpression::new_ip(addr),
        AttributeValue::Decimal(dec) => RestrictedExpression::new_decimal(dec),
        AttributeValue::DateTime(dt) => RestrictedExpression::new_datetime(
            dt.format(&time::format_description::well_known::Rfc3339)
                .map_err(|e| EngineError::TranslationError(e.to_string()))?,
        ),
        AttributeValue::Duration(dur) => {
            RestrictedExpression::new_duration(format!("{}ms", dur.as_millis()))
        }
    })
}

pub fn to_cedar_entity(entity: &Entity) -> Result<cedar_policy::Entity, EngineError> {
    let uid = to_cedar_euid(entity.uid())?;
    let attrs = entity
        .attributes()
        .iter()
        .map(|(k, v)| attribute_to_expr(v).map(|e| (k.clone(), e)))
        .collect::<Result<HashMap<_, _>, _>>()?;
    let parents = entity
        .parents()
        .iter()
        .map(to_cedar_euid)
        .collect::<Result<HashSet<_>, _>>()?;
    cedar_policy::Entity::new(uid, attrs, parents)
        .map_err(|e| EngineError::TranslationError(e.to_string()))
}

pub fn to_cedar_entities(entities: &Entities) -> Result<cedar_policy::Entities, EngineError> {
    let cedar_entities = entities
        .iter()
        .map(to_cedar_entity)
        .collect::<Result<Vec<_>, _>>()?;
    cedar_policy::Entities::from_entities(cedar_entities, None)
        .map_err(|e| EngineError::TranslationError(e.to_string()))
}

pub fn to_cedar_context(context: &HashMap<String, AttributeValue>) -> Result<Context, EngineError> {
    let pairs = context
        .iter()
        .map(|(k, v)| attribute_to_expr(v).map(|e| (k.clone(), e)))
        .collect::<Result<Vec<_>, _>>()?;
    Context::from_pairs(pairs).map_err(|e| EngineError::TranslationError(e.to_string()))
}

pub fn from_cedar_response(response: cedar_policy::Response) -> Decision {
    let allow = response.decision() == cedar_policy::Decision::Allow;
    let diag = response.diagnostics();
    let errors: Vec<String> = diag.errors().map(|e| e.to_string()).collect();
    let reasons: Vec<String> = if allow {
        diag.reason().map(|id| id.to_string()).collect()
    } else {
        Vec::new()
    };
    let decision = Decision {
        allow,
        diagnostics: Some(Diagnostics {
            reasons,
            errors,
            policies_satisfied: if allow {
                Some(diag.reason().map(|id| id.to_string()).collect())
            } else {
                None
            },
            policies_denied: None,
        }),
    };
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euid_roundtrips_through_cedar() {
        let uid = EntityUid::of_type("User", "alice").unwrap();
        let cedar_uid = to_cedar_euid(&uid).unwrap();
        let back = from_cedar_euid(&cedar_uid).unwrap();
        assert_eq!(uid, back);
    }

    #[test]
    fn primitive_attributes_translate_without_error() {
        assert!(attribute_to_expr(&AttributeValue::bool(true)).is_ok());
        assert!(attribute_to_expr(&AttributeValue::long(1)).is_ok());
        assert!(attribute_to_expr(&AttributeValue::string("x")).is_ok());
        assert!(attribute_to_expr(&AttributeValue::ip("127.0.0.1")).is_ok());
        assert!(attribute_to_expr(&AttributeValue::decimal("1.5")).is_ok());
    }

    #[test]
    fn entity_ref_attribute_requires_valid_uid() {
        let uid = EntityUid::of_type("Document", "d1").unwrap();
        let expr = attribute_to_expr(&AttributeValue::entity_ref(uid));
        assert!(expr.is_ok());
    }
}
