//! Request/response shapes exchanged between the session runner, the entity
//! store and the engine adapter.

use crate::domain::attribute::AttributeValue;
use crate::domain::entity::Entities;
use crate::domain::entity_uid::{EntityTypeName, EntityUid};
use std::collections::HashMap;

/// Synthetic id substituted for collection-level actions (no concrete
/// resource instance yet, e.g. `create`).
pub const COLLECTION_PLACEHOLDER_ID: &str = "__collection__";

/// `(entity-type, entity-id, parents)`. `entity_id` is absent for
/// collection-level actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub entity_type: EntityTypeName,
    pub entity_id: Option<String>,
    pub parents: Vec<(EntityTypeName, String)>,
}

impl ResourceRef {
    pub fn new(entity_type: EntityTypeName, entity_id: Option<String>) -> Self {
        Self {
            entity_type,
            entity_id,
            parents: Vec::new(),
        }
    }

    pub fn with_parents(
        entity_type: EntityTypeName,
        entity_id: Option<String>,
        parents: Vec<(EntityTypeName, String)>,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            parents,
        }
    }

    pub fn collection(entity_type: EntityTypeName) -> Self {
        Self::new(entity_type, None)
    }

    /// The uid used for the engine call: the real id, or the synthetic
    /// collection placeholder when absent.
    pub fn uid(&self) -> EntityUid {
        let id = self
            .entity_id
            .clone()
            .unwrap_or_else(|| COLLECTION_PLACEHOLDER_ID.to_string());
        EntityUid::new(self.entity_type.clone(), id)
    }

    pub fn parent_uids(&self) -> Vec<EntityUid> {
        self.parents
            .iter()
            .map(|(t, id)| EntityUid::new(t.clone(), id.clone()))
            .collect()
    }

    /// All uids (resource + parents) that the store must resolve for this
    /// reference. When `entity_id` is absent only parents are included.
    pub fn uids_to_load(&self) -> Vec<EntityUid> {
        let mut uids = self.parent_uids();
        if self.entity_id.is_some() {
            uids.push(self.uid());
        }
        uids
    }

    pub fn description(&self) -> String {
        match &self.entity_id {
            Some(id) => format!("{}::\"{}\"", self.entity_type, id),
            None => format!("{} collection", self.entity_type),
        }
    }
}

/// `(principal, action, resource, context)` — the evaluated request handed
/// to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CedarRequest {
    pub principal: EntityUid,
    pub action: EntityUid,
    pub resource: EntityUid,
    pub context: HashMap<String, AttributeValue>,
}

/// `(uid, entities)`: the already-resolved principal plus any extra entities
/// (e.g. groups) the resolver wants attached.
#[derive(Debug, Clone, PartialEq)]
pub struct CedarPrincipal {
    pub uid: EntityUid,
    pub entities: Entities,
}

impl CedarPrincipal {
    pub fn new(uid: EntityUid, entities: Entities) -> Self {
        Self { uid, entities }
    }

    /// A principal resolved to a single entity (itself, no extra group
    /// entities attached).
    pub fn single(entity: crate::domain::entity::Entity) -> Self {
        let uid = entity.uid().clone();
        Self {
            uid,
            entities: Entities::from_iter([entity]),
        }
    }
}

/// Free-form diagnostic information attached to a `Decision`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub reasons: Vec<String>,
    pub errors: Vec<String>,
    pub policies_satisfied: Option<Vec<String>>,
    pub policies_denied: Option<Vec<String>>,
}

impl Diagnostics {
    pub fn deny_reason(&self) -> Option<&str> {
        self.reasons
            .first()
            .or_else(|| self.errors.first())
            .map(String::as_str)
    }
}

/// `(allow, diagnostics)` — Cedar's verdict on a single `CedarRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allow: bool,
    pub diagnostics: Option<Diagnostics>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            diagnostics: None,
        }
    }

    pub fn deny() -> Self {
        Self {
            allow: false,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn deny_reason(&self) -> Option<&str> {
        self.diagnostics.as_ref().and_then(Diagnostics::deny_reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_ref_substitutes_collection_placeholder() {
        let entity_type = EntityTypeName::new("Document").unwrap();
        let collection = ResourceRef::collection(entity_type);
        assert_eq!(collection.uid().id(), COLLECTION_PLACEHOLDER_ID);
        assert!(collection.uids_to_load().is_empty());
    }

    #[test]
    fn resource_ref_uids_to_load_includes_parents_and_self() {
        let folder = EntityTypeName::new("Folder").unwrap();
        let document = EntityTypeName::new("Document").unwrap();
        let resource = ResourceRef::with_parents(
            document,
            Some("d1".to_string()),
            vec![(folder, "f1".to_string())],
        );
        let uids = resource.uids_to_load();
        assert_eq!(uids.len(), 2);
        assert_eq!(uids[0].id(), "f1");
        assert_eq!(uids[1].id(), "d1");
    }

    #[test]
    fn deny_reason_falls_back_to_errors() {
        let diagnostics = Diagnostics {
            reasons: vec![],
            errors: vec!["policy X forbids this".to_string()],
            ..Default::default()
        };
        assert_eq!(diagnostics.deny_reason(), Some("policy X forbids this"));
    }
}
