//! `Entity` and `Entities`: the runtime's working set of Cedar-shaped
//! objects.

use crate::domain::attribute::AttributeValue;
use crate::domain::entity_uid::EntityUid;
use std::collections::{BTreeSet, HashMap};

/// `(uid, parents, attributes)`. Ephemeral — constructed per request by
/// fetchers and discarded afterward.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    uid: EntityUid,
    parents: BTreeSet<EntityUid>,
    attributes: HashMap<String, AttributeValue>,
}

impl Entity {
    pub fn new(
        uid: EntityUid,
        parents: impl IntoIterator<Item = EntityUid>,
        attributes: impl IntoIterator<Item = (String, AttributeValue)>,
    ) -> Self {
        Self {
            uid,
            parents: parents.into_iter().collect(),
            attributes: attributes.into_iter().collect(),
        }
    }

    pub fn with_no_parents(
        uid: EntityUid,
        attributes: impl IntoIterator<Item = (String, AttributeValue)>,
    ) -> Self {
        Self::new(uid, [], attributes)
    }

    pub fn uid(&self) -> &EntityUid {
        &self.uid
    }

    pub fn parents(&self) -> &BTreeSet<EntityUid> {
        &self.parents
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &HashMap<String, AttributeValue> {
        &self.attributes
    }
}

/// An ordered semantic set of `Entity` values, unique by uid.
///
/// Insertion order is preserved; on a uid collision the incoming value wins
/// but keeps the position of the first occurrence (right-biased merge).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entities {
    order: Vec<EntityUid>,
    by_uid: HashMap<EntityUid, Entity>,
}

impl Entities {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_iter(iter: impl IntoIterator<Item = Entity>) -> Self {
        let mut entities = Self::empty();
        for entity in iter {
            entities.insert(entity);
        }
        entities
    }

    /// Inserts or overwrites `entity` by uid, right-biased.
    pub fn insert(&mut self, entity: Entity) {
        let uid = entity.uid().clone();
        if self.by_uid.insert(uid.clone(), entity).is_none() {
            self.order.push(uid);
        }
    }

    /// Merges `other` into `self`; on uid collisions `other`'s value wins.
    pub fn merge(mut self, other: Entities) -> Entities {
        for uid in other.order {
            if let Some(entity) = other.by_uid.get(&uid) {
                self.insert(entity.clone());
            }
        }
        self
    }

    pub fn find(&self, uid: &EntityUid) -> Option<&Entity> {
        self.by_uid.get(uid)
    }

    pub fn of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.iter()
            .filter(move |e| e.uid().entity_type().as_str() == type_name)
    }

    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|uid| self.by_uid.get(uid))
    }
}

impl FromIterator<Entity> for Entities {
    fn from_iter<T: IntoIterator<Item = Entity>>(iter: T) -> Self {
        Entities::from_iter(iter)
    }
}

impl IntoIterator for Entities {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        let entities: Vec<Entity> = self
            .order
            .into_iter()
            .filter_map(|uid| self.by_uid.get(&uid).cloned())
            .collect();
        entities.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(type_name: &str, id: &str) -> EntityUid {
        EntityUid::of_type(type_name, id).unwrap()
    }

    #[test]
    fn from_iter_deduplicates_right_biased() {
        let first = Entity::with_no_parents(uid("User", "a"), [("v".into(), AttributeValue::long(1))]);
        let second = Entity::with_no_parents(uid("User", "a"), [("v".into(), AttributeValue::long(2))]);

        let entities = Entities::from_iter([first, second]);
        assert_eq!(entities.size(), 1);
        assert_eq!(
            entities.find(&uid("User", "a")).unwrap().attribute("v"),
            Some(&AttributeValue::long(2))
        );
    }

    #[test]
    fn merge_is_right_biased_and_idempotent() {
        let a = Entities::from_iter([Entity::with_no_parents(uid("User", "a"), [])]);
        let b = Entities::from_iter([Entity::with_no_parents(
            uid("User", "a"),
            [("v".into(), AttributeValue::long(9))],
        )]);

        let merged = a.clone().merge(b);
        assert_eq!(
            merged.find(&uid("User", "a")).unwrap().attribute("v"),
            Some(&AttributeValue::long(9))
        );

        let idempotent = merged.clone().merge(merged.clone());
        assert_eq!(idempotent, merged);
    }

    #[test]
    fn of_type_filters_by_entity_type() {
        let entities = Entities::from_iter([
            Entity::with_no_parents(uid("User", "a"), []),
            Entity::with_no_parents(uid("Document", "d1"), []),
        ]);
        let users: Vec<_> = entities.of_type("User").collect();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].uid(), &uid("User", "a"));
    }

    #[test]
    fn empty_set_is_distinguished() {
        let empty = Entities::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.size(), 0);
        assert_eq!(empty.clone().merge(Entities::empty()), empty);
    }
}
