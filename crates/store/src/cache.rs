//! Coalescing cache (C4): wraps an `EntityStore` with a `moka` async cache
//! so concurrent lookups of the same uid share one build.

use crate::entity_store::{EntityStore, ParentChain, StoreConfig};
use async_trait::async_trait;
use kernel::{AuthError, Entity, EntityUid};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_size: u64,
    pub ttl_after_write: Option<Duration>,
    pub ttl_after_access: Option<Duration>,
    pub cache_negatives: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            ttl_after_write: Some(Duration::from_secs(300)),
            ttl_after_access: None,
            cache_negatives: false,
        }
    }
}

/// `None` is only retained in the cache when `cache_negatives` is enabled;
/// otherwise the entry is evicted right after the coalesced build completes,
/// so concurrent misses still share one fetch but a later lookup re-fetches.
type CachedEntity = Option<Entity>;

/// Lightweight, cloneable error carried through `moka`'s `try_get_with`
/// (which requires `E: Clone`); the real `AuthError` is not `Clone` because
/// it can carry a boxed source error.
#[derive(Debug, Clone)]
struct FetchFailed(String);

pub struct CachingEntityStore<S: EntityStore> {
    inner: Arc<S>,
    cache: Cache<EntityUid, CachedEntity>,
    cache_negatives: bool,
}

impl<S: EntityStore + 'static> CachingEntityStore<S> {
    pub fn new(inner: Arc<S>, config: CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_size);
        if let Some(ttl) = config.ttl_after_write {
            builder = builder.time_to_live(ttl);
        }
        if let Some(tti) = config.ttl_after_access {
            builder = builder.time_to_idle(tti);
        }
        Self {
            inner,
            cache: builder.build(),
            cache_negatives: config.cache_negatives,
        }
    }

    pub fn invalidate(&self, uid: &EntityUid) {
        self.cache.invalidate(uid);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl<S: EntityStore + 'static> EntityStore for CachingEntityStore<S> {
    #[instrument(skip(self))]
    async fn load_entity(&self, uid: &EntityUid) -> Result<Option<Entity>, AuthError> {
        let inner = self.inner.clone();
        let uid_for_load = uid.clone();

        let result: Result<CachedEntity, Arc<FetchFailed>> = self
            .cache
            .try_get_with(uid.clone(), async move {
                inner
                    .load_entity(&uid_for_load)
                    .await
                    .map_err(|e| FetchFailed(e.to_string()))
            })
            .await;

        let entity = result.map_err(|e| {
            AuthError::authorization_failed_with("entity fetch failed", std::io::Error::other(e.0.clone()))
        })?;

        if entity.is_none() && !self.cache_negatives {
            self.cache.invalidate(uid).await;
        }
        Ok(entity)
    }

    #[instrument(skip(self, uids))]
    async fn load_entities(&self, uids: &[EntityUid]) -> Result<Vec<Entity>, AuthError> {
        let mut hits = Vec::new();
        let mut misses = Vec::new();
        for uid in uids {
            match self.cache.get(uid).await {
                Some(Some(entity)) => hits.push(entity),
                Some(None) => {}
                None => misses.push(uid.clone()),
            }
        }

        if misses.is_empty() {
            return Ok(hits);
        }

        let loaded = self.inner.load_entities(&misses).await?;
        for entity in &loaded {
            self.cache.insert(entity.uid().clone(), Some(entity.clone())).await;
        }
        if self.cache_negatives {
            let found: std::collections::HashSet<_> = loaded.iter().map(|e| e.uid().clone()).collect();
            for uid in &misses {
                if !found.contains(uid) {
                    self.cache.insert(uid.clone(), None).await;
                }
            }
        }

        hits.extend(loaded);
        Ok(hits)
    }

    async fn load_entity_with_parents(
        &self,
        uid: &EntityUid,
        config: StoreConfig,
    ) -> Result<(Vec<Entity>, ParentChain), AuthError> {
        self.inner.load_entity_with_parents(uid, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{Fetcher, FetcherRegistry};
    use crate::entity_store::FetcherEntityStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetcher<String> for CountingFetcher {
        async fn fetch(&self, id: &String) -> Result<Option<Entity>, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Entity::with_no_parents(
                EntityUid::of_type("User", id).unwrap(),
                [],
            )))
        }
    }

    #[tokio::test]
    async fn concurrent_lookups_of_same_uid_build_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = FetcherRegistry::new();
        registry.register::<_, String>("User", CountingFetcher { calls: calls.clone() });
        let inner = Arc::new(FetcherEntityStore::new(registry));
        let cached = Arc::new(CachingEntityStore::new(inner, CacheConfig::default()));

        let uid = EntityUid::of_type("User", "alice").unwrap();
        let futures = (0..8).map(|_| {
            let cached = cached.clone();
            let uid = uid.clone();
            tokio::spawn(async move { cached.load_entity(&uid).await.unwrap() })
        });
        for handle in futures {
            handle.await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn uncached_negatives_fall_through_every_time() {
        struct AlwaysMiss;
        #[async_trait]
        impl Fetcher<String> for AlwaysMiss {
            async fn fetch(&self, _id: &String) -> Result<Option<Entity>, AuthError> {
                Ok(None)
            }
        }
        let mut registry = FetcherRegistry::new();
        registry.register::<_, String>("User", AlwaysMiss);
        let inner = Arc::new(FetcherEntityStore::new(registry));
        let cached = CachingEntityStore::new(inner, CacheConfig::default());

        let uid = EntityUid::of_type("User", "ghost").unwrap();
        assert!(cached.load_entity(&uid).await.unwrap().is_none());
        assert_eq!(cached.entry_count(), 0);
    }
}
