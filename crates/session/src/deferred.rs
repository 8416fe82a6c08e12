//! Deferred check (C8): an authorization value that resolves its resource
//! from a bare identifier at execution time instead of requiring the caller
//! to already know the parent chain.

use kernel::{AttributeValue, AuthCheck, EntityTypeName, EntityUid, ResourceRef};
use std::collections::HashMap;
use store::{EntityStore, StoreConfig};

/// `<Domain>.<Action>.on(typed_id)` in the DSL surface (§6.3); this is the
/// runtime value that surface sugar compiles down to.
#[derive(Clone)]
pub struct DeferredCheck<P> {
    entity_type: EntityTypeName,
    entity_id: String,
    action: EntityUid,
    principal: Option<P>,
    context: HashMap<String, AttributeValue>,
}

impl<P> DeferredCheck<P> {
    pub fn new(entity_type: EntityTypeName, entity_id: impl Into<String>, action: EntityUid) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            action,
            principal: None,
            context: HashMap::new(),
        }
    }

    pub fn as_principal(mut self, principal: P) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_context(mut self, context: HashMap<String, AttributeValue>) -> Self {
        self.context.extend(context);
        self
    }
}

impl<P: Clone> DeferredCheck<P> {
    /// Resolves the parent chain via `store` and builds the `AuthCheck` the
    /// session runner actually executes. Never fails: a store error or a
    /// missing entity both degrade to an empty parent chain, matching §4.8's
    /// "MUST NOT fail" requirement.
    pub async fn resolve(&self, store: &dyn EntityStore, config: StoreConfig) -> AuthCheck<P> {
        let uid = EntityUid::new(self.entity_type.clone(), self.entity_id.clone());
        let chain = match store.load_entity_with_parents(&uid, config).await {
            Ok((_, chain)) => chain,
            Err(_) => Default::default(),
        };

        let parents: Vec<(EntityTypeName, String)> = chain
            .uids
            .into_iter()
            .map(|uid| (uid.entity_type().clone(), uid.id().to_string()))
            .collect();

        let resource = ResourceRef::with_parents(
            self.entity_type.clone(),
            Some(self.entity_id.clone()),
            parents,
        );

        let mut check = AuthCheck::single(self.action.clone(), resource).with_context(self.context.clone());
        if let Some(principal) = self.principal.clone() {
            check = check.as_principal(principal);
        }
        check
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kernel::{AuthError, Entity};
    use std::collections::HashMap as StdHashMap;
    use store::ParentChain;

    struct MapStore {
        parents: StdHashMap<String, Vec<(String, String)>>,
    }

    #[async_trait]
    impl EntityStore for MapStore {
        async fn load_entity(&self, uid: &EntityUid) -> Result<Option<Entity>, AuthError> {
            Ok(Some(Entity::with_no_parents(uid.clone(), [])))
        }

        async fn load_entity_with_parents(
            &self,
            uid: &EntityUid,
            _config: StoreConfig,
        ) -> Result<(Vec<Entity>, ParentChain), AuthError> {
            let parents = self.parents.get(uid.id()).cloned().unwrap_or_default();
            let uids = parents
                .into_iter()
                .map(|(t, id)| EntityUid::new(EntityTypeName::new(t).unwrap(), id))
                .collect();
            Ok((vec![], ParentChain { uids, truncated: false }))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl EntityStore for FailingStore {
        async fn load_entity(&self, _uid: &EntityUid) -> Result<Option<Entity>, AuthError> {
            Ok(None)
        }

        async fn load_entity_with_parents(
            &self,
            _uid: &EntityUid,
            _config: StoreConfig,
        ) -> Result<(Vec<Entity>, ParentChain), AuthError> {
            Err(AuthError::authorization_failed("store unavailable"))
        }
    }

    #[tokio::test]
    async fn resolve_attaches_the_discovered_parent_chain() {
        let mut parents = StdHashMap::new();
        parents.insert(
            "d1".to_string(),
            vec![("Folder".to_string(), "f1".to_string())],
        );
        let store = MapStore { parents };
        let deferred: DeferredCheck<()> = DeferredCheck::new(
            EntityTypeName::new("Document").unwrap(),
            "d1",
            EntityUid::of_type("Action", "read").unwrap(),
        );

        let check = deferred.resolve(&store, StoreConfig::default()).await;
        match check {
            AuthCheck::Single(single) => {
                assert_eq!(single.resource.parents.len(), 1);
            }
            _ => panic!("expected Single"),
        }
    }

    #[tokio::test]
    async fn resolve_degrades_gracefully_when_the_store_fails() {
        let deferred: DeferredCheck<()> = DeferredCheck::new(
            EntityTypeName::new("Document").unwrap(),
            "d1",
            EntityUid::of_type("Action", "read").unwrap(),
        );
        let check = deferred.resolve(&FailingStore, StoreConfig::default()).await;
        match check {
            AuthCheck::Single(single) => assert!(single.resource.parents.is_empty()),
            _ => panic!("expected Single"),
        }
    }
}
