//! Fetcher registry (C2): mapping from entity-type name to a type-erased
//! fetcher that can load single/batch entities by native id.

use async_trait::async_trait;
use kernel::{AuthError, Entity};
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

/// An application-supplied loader for one entity type, generic over its
/// native id type.
#[async_trait]
pub trait Fetcher<Id>: Send + Sync
where
    Id: Eq + Hash + Clone + Send + Sync + 'static,
{
    async fn fetch(&self, id: &Id) -> Result<Option<Entity>, AuthError>;

    /// Default: maps `fetch` over `ids` concurrently. Implementations
    /// should override this to coalesce I/O round-trips.
    async fn fetch_batch(&self, ids: &[Id]) -> Result<HashMap<Id, Entity>, AuthError> {
        let futures = ids.iter().map(|id| async move {
            let entity = self.fetch(id).await?;
            Ok::<_, AuthError>(entity.map(|e| (id.clone(), e)))
        });
        let results: Vec<_> = futures::future::try_join_all(futures).await?;
        Ok(results.into_iter().flatten().collect())
    }

    /// Extracts the `(type, id)` pairs an already-fetched entity declares as
    /// its parents, used by §4.3's parent-chain traversal.
    fn parent_ids(&self, _entity: &Entity) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Type-erased view of a `Fetcher<Id>`, operating on string ids. The
/// `Id: FromStr + ToString` bound is the bijection `string <-> native-id`
/// that §9 calls "the erasure point".
#[async_trait]
pub(crate) trait ErasedFetcher: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Option<Entity>, AuthError>;
    async fn fetch_batch(&self, ids: &[String]) -> Result<HashMap<String, Entity>, AuthError>;
    fn parent_ids(&self, entity: &Entity) -> Vec<(String, String)>;
}

struct FetcherAdapter<F, Id> {
    inner: F,
    _marker: PhantomData<fn() -> Id>,
}

#[async_trait]
impl<F, Id> ErasedFetcher for FetcherAdapter<F, Id>
where
    F: Fetcher<Id>,
    Id: FromStr + ToString + Eq + Hash + Clone + Send + Sync + 'static,
{
    async fn fetch(&self, id: &str) -> Result<Option<Entity>, AuthError> {
        let Ok(native) = Id::from_str(id) else {
            return Ok(None);
        };
        self.inner.fetch(&native).await
    }

    async fn fetch_batch(&self, ids: &[String]) -> Result<HashMap<String, Entity>, AuthError> {
        let native_ids: Vec<Id> = ids.iter().filter_map(|s| Id::from_str(s).ok()).collect();
        let result = self.inner.fetch_batch(&native_ids).await?;
        Ok(result
            .into_iter()
            .map(|(id, entity)| (id.to_string(), entity))
            .collect())
    }

    fn parent_ids(&self, entity: &Entity) -> Vec<(String, String)> {
        self.inner.parent_ids(entity)
    }
}

/// Append-only mapping from Cedar entity-type name to a registered fetcher.
/// Looking up an unknown type is not an error — the store treats it as
/// "not found".
#[derive(Default)]
pub struct FetcherRegistry {
    fetchers: HashMap<String, Arc<dyn ErasedFetcher>>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Id>(&mut self, entity_type: impl Into<String>, fetcher: F)
    where
        F: Fetcher<Id> + 'static,
        Id: FromStr + ToString + Eq + Hash + Clone + Send + Sync + 'static,
    {
        self.fetchers.insert(
            entity_type.into(),
            Arc::new(FetcherAdapter {
                inner: fetcher,
                _marker: PhantomData,
            }),
        );
    }

    pub(crate) fn get(&self, entity_type: &str) -> Option<&Arc<dyn ErasedFetcher>> {
        self.fetchers.get(entity_type)
    }

    pub fn is_registered(&self, entity_type: &str) -> bool {
        self.fetchers.contains_key(entity_type)
    }
}
