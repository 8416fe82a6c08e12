//! Entity store (C3): resolves `EntityUid`s to `Entity` values through the
//! fetcher registry, including parent-chain traversal for hierarchical
//! authorization checks.

use crate::fetcher::FetcherRegistry;
use async_trait::async_trait;
use kernel::{AuthError, Entity, EntityUid, ResourceRef};
use std::collections::{HashMap, HashSet};
use tracing::{instrument, warn};

/// Bounds the BFS walk `load_entity_with_parents` performs so a cyclical or
/// unbounded hierarchy cannot hang a request.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub max_parent_chain_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_parent_chain_depth: 32,
        }
    }
}

/// Result of walking an entity's ancestor chain: the chain of uids visited
/// (excluding the leaf itself, root-to-leaf order) and whether the walk was
/// cut short by `max_parent_chain_depth`.
#[derive(Debug, Clone, Default)]
pub struct ParentChain {
    pub uids: Vec<EntityUid>,
    pub truncated: bool,
}

/// Application-facing port used by the session runner. Implementors resolve
/// `EntityUid`s into `Entity` values; a `None` means "resolved successfully
/// but no such entity exists", while `Err` means resolution itself failed.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn load_entity(&self, uid: &EntityUid) -> Result<Option<Entity>, AuthError>;

    /// Default: calls `load_entity` once per uid. Implementations backed by
    /// a batching source should override this.
    async fn load_entities(&self, uids: &[EntityUid]) -> Result<Vec<Entity>, AuthError> {
        let mut loaded = Vec::with_capacity(uids.len());
        for uid in uids {
            if let Some(entity) = self.load_entity(uid).await? {
                loaded.push(entity);
            }
        }
        Ok(loaded)
    }

    /// Resolves `uid` plus every entity transitively reachable through its
    /// declared parents, bounded by `config.max_parent_chain_depth`.
    async fn load_entity_with_parents(
        &self,
        uid: &EntityUid,
        config: StoreConfig,
    ) -> Result<(Vec<Entity>, ParentChain), AuthError>;

    /// Resolves every uid a `ResourceRef` needs for one authorization check.
    async fn load_for_request(&self, resource: &ResourceRef) -> Result<Vec<Entity>, AuthError> {
        self.load_entities(&resource.uids_to_load()).await
    }

    /// Resolves the union of uids a batch of resource refs need, deduplicated.
    async fn load_for_batch(&self, resources: &[ResourceRef]) -> Result<Vec<Entity>, AuthError> {
        let mut seen = HashSet::new();
        let mut uids = Vec::new();
        for resource in resources {
            for uid in resource.uids_to_load() {
                if seen.insert(uid.clone()) {
                    uids.push(uid);
                }
            }
        }
        self.load_entities(&uids).await
    }
}

/// Base `EntityStore` implementation backed directly by a `FetcherRegistry`,
/// with no caching or request coalescing layered on top.
pub struct FetcherEntityStore {
    registry: FetcherRegistry,
}

impl FetcherEntityStore {
    pub fn new(registry: FetcherRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EntityStore for FetcherEntityStore {
    #[instrument(skip(self))]
    async fn load_entity(&self, uid: &EntityUid) -> Result<Option<Entity>, AuthError> {
        let Some(fetcher) = self.registry.get(uid.entity_type().as_str()) else {
            warn!(entity_type = %uid.entity_type(), "no fetcher registered for entity type");
            return Ok(None);
        };
        fetcher.fetch(uid.id()).await
    }

    #[instrument(skip(self, uids))]
    async fn load_entities(&self, uids: &[EntityUid]) -> Result<Vec<Entity>, AuthError> {
        let mut by_type: HashMap<&str, Vec<&str>> = HashMap::new();
        for uid in uids {
            by_type
                .entry(uid.entity_type().as_str())
                .or_default()
                .push(uid.id());
        }

        let mut loaded = Vec::with_capacity(uids.len());
        for (entity_type, ids) in by_type {
            let Some(fetcher) = self.registry.get(entity_type) else {
                warn!(entity_type, "no fetcher registered for entity type");
                continue;
            };
            let owned_ids: Vec<String> = ids.into_iter().map(String::from).collect();
            let resolved = fetcher.fetch_batch(&owned_ids).await?;
            loaded.extend(resolved.into_values());
        }
        Ok(loaded)
    }

    #[instrument(skip(self))]
    async fn load_entity_with_parents(
        &self,
        uid: &EntityUid,
        config: StoreConfig,
    ) -> Result<(Vec<Entity>, ParentChain), AuthError> {
        let mut loaded = Vec::new();
        let mut chain_uids = Vec::new();
        let mut visited: HashSet<EntityUid> = HashSet::new();
        let mut frontier = vec![uid.clone()];
        visited.insert(uid.clone());

        let mut depth = 0usize;
        let mut truncated = false;

        while !frontier.is_empty() {
            if depth >= config.max_parent_chain_depth {
                truncated = !frontier.is_empty();
                break;
            }

            let mut next_frontier = Vec::new();
            for current in &frontier {
                let Some(fetcher) = self.registry.get(current.entity_type().as_str()) else {
                    continue;
                };
                let Some(entity) = fetcher.fetch(current.id()).await? else {
                    continue;
                };

                if current != uid {
                    chain_uids.push(current.clone());
                }

                for (parent_type, parent_id) in fetcher.parent_ids(&entity) {
                    if let Ok(parent_type) = kernel::EntityTypeName::new(parent_type) {
                        let parent_uid = EntityUid::new(parent_type, parent_id);
                        if visited.insert(parent_uid.clone()) {
                            next_frontier.push(parent_uid);
                        }
                    }
                }

                loaded.push(entity);
            }
            frontier = next_frontier;
            depth += 1;
        }

        Ok((
            loaded,
            ParentChain {
                uids: chain_uids,
                truncated,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::Fetcher;
    use kernel::AttributeValue;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex;

    struct MapFetcher {
        data: Mutex<StdHashMap<String, (Entity, Vec<(String, String)>)>>,
    }

    #[async_trait]
    impl Fetcher<String> for MapFetcher {
        async fn fetch(&self, id: &String) -> Result<Option<Entity>, AuthError> {
            Ok(self.data.lock().unwrap().get(id).map(|(e, _)| e.clone()))
        }

        fn parent_ids(&self, entity: &Entity) -> Vec<(String, String)> {
            self.data
                .lock()
                .unwrap()
                .get(entity.uid().id())
                .map(|(_, parents)| parents.clone())
                .unwrap_or_default()
        }
    }

    fn build_registry() -> FetcherRegistry {
        let mut folders = StdHashMap::new();
        folders.insert(
            "root".to_string(),
            (
                Entity::with_no_parents(EntityUid::of_type("Folder", "root").unwrap(), []),
                vec![],
            ),
        );
        folders.insert(
            "child".to_string(),
            (
                Entity::with_no_parents(EntityUid::of_type("Folder", "child").unwrap(), []),
                vec![("Folder".to_string(), "root".to_string())],
            ),
        );

        let mut documents = StdHashMap::new();
        documents.insert(
            "d1".to_string(),
            (
                Entity::with_no_parents(
                    EntityUid::of_type("Document", "d1").unwrap(),
                    [("name".to_string(), AttributeValue::string("doc"))],
                ),
                vec![("Folder".to_string(), "child".to_string())],
            ),
        );

        let mut registry = FetcherRegistry::new();
        registry.register::<_, String>("Folder", MapFetcher { data: Mutex::new(folders) });
        registry.register::<_, String>("Document", MapFetcher { data: Mutex::new(documents) });
        registry
    }

    #[tokio::test]
    async fn load_entity_with_parents_walks_the_full_chain() {
        let store = FetcherEntityStore::new(build_registry());
        let (entities, chain) = store
            .load_entity_with_parents(&EntityUid::of_type("Document", "d1").unwrap(), StoreConfig::default())
            .await
            .unwrap();

        assert_eq!(entities.len(), 3);
        assert!(!chain.truncated);
        assert_eq!(chain.uids.len(), 2);
    }

    #[tokio::test]
    async fn load_entity_with_parents_truncates_past_max_depth() {
        let store = FetcherEntityStore::new(build_registry());
        let config = StoreConfig { max_parent_chain_depth: 1 };
        let (entities, chain) = store
            .load_entity_with_parents(&EntityUid::of_type("Document", "d1").unwrap(), config)
            .await
            .unwrap();

        assert_eq!(entities.len(), 1);
        assert!(chain.truncated);
    }

    #[tokio::test]
    async fn cycle_in_parent_chain_does_not_hang() {
        let mut data = StdHashMap::new();
        data.insert(
            "a".to_string(),
            (
                Entity::with_no_parents(EntityUid::of_type("Folder", "a").unwrap(), []),
                vec![("Folder".to_string(), "b".to_string())],
            ),
        );
        data.insert(
            "b".to_string(),
            (
                Entity::with_no_parents(EntityUid::of_type("Folder", "b").unwrap(), []),
                vec![("Folder".to_string(), "a".to_string())],
            ),
        );
        let mut registry = FetcherRegistry::new();
        registry.register::<_, String>("Folder", MapFetcher { data: Mutex::new(data) });
        let store = FetcherEntityStore::new(registry);

        let (entities, chain) = store
            .load_entity_with_parents(&EntityUid::of_type("Folder", "a").unwrap(), StoreConfig::default())
            .await
            .unwrap();

        assert_eq!(entities.len(), 2);
        assert!(!chain.truncated);
    }

    #[tokio::test]
    async fn load_for_request_resolves_resource_and_parents() {
        let store = FetcherEntityStore::new(build_registry());
        let resource = ResourceRef::with_parents(
            kernel::EntityTypeName::new("Document").unwrap(),
            Some("d1".to_string()),
            vec![(kernel::EntityTypeName::new("Folder").unwrap(), "child".to_string())],
        );
        let entities = store.load_for_request(&resource).await.unwrap();
        assert_eq!(entities.len(), 2);
    }
}
