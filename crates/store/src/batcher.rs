//! Request batcher (C5): accumulates `load_entity` calls inside a short
//! window and resolves them with one `load_entities` round-trip to the
//! wrapped store.

use crate::entity_store::{EntityStore, ParentChain, StoreConfig};
use async_trait::async_trait;
use dashmap::DashMap;
use kernel::{AuthError, Entity, EntityUid};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::instrument;

#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub window: Duration,
    pub max_batch_size: usize,
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(5),
            max_batch_size: 100,
            max_concurrent: 4,
        }
    }
}

type PendingReply = oneshot::Sender<Result<Option<Entity>, String>>;

struct Window {
    waiters: Mutex<Vec<(EntityUid, PendingReply)>>,
}

/// Single active window slot. A new one is created as soon as the previous
/// one is removed for flushing, so at most one window is open at a time.
const WINDOW_SLOT: u64 = 0;

/// Coalesces individual `load_entity` calls arriving within `config.window`
/// into batched `load_entities` calls against `inner`. Shutting down while
/// requests are in flight fails them rather than dropping them silently.
pub struct BatchingEntityStore<S: EntityStore> {
    inner: Arc<S>,
    config: BatchConfig,
    window: Arc<DashMap<u64, Arc<Window>>>,
    in_flight: Arc<tokio::sync::Semaphore>,
    shutting_down: Arc<AtomicBool>,
}

impl<S: EntityStore + 'static> BatchingEntityStore<S> {
    pub fn new(inner: Arc<S>, config: BatchConfig) -> Self {
        Self {
            inner,
            config,
            window: Arc::new(DashMap::new()),
            in_flight: Arc::new(tokio::sync::Semaphore::new(config.max_concurrent)),
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Rejects new work and waits for whatever is already queued to flush.
    /// Existing waiters receive an `AuthorizationFailed` error rather than
    /// being dropped.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let keys: Vec<u64> = self.window.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            if let Some((_, window)) = self.window.remove(&key) {
                let waiters = std::mem::take(&mut *window.waiters.lock().unwrap());
                for (_, reply) in waiters {
                    let _ = reply.send(Err("store is shutting down".to_string()));
                }
            }
        }
    }

    /// Schedules (or immediately triggers, when `delay` is `None`) a flush of
    /// `window`. Only removes the map entry if it is still exactly the
    /// `Window` instance passed in — guards against a later waiter having
    /// already replaced slot `key` with a fresh window by the time this runs,
    /// which would otherwise flush someone else's in-progress batch instead
    /// of (or as well as) this one.
    fn spawn_flush(&self, key: u64, window: Arc<Window>, delay: Option<Duration>) {
        let window_map = self.window.clone();
        let inner = self.inner.clone();
        let semaphore = self.in_flight.clone();
        let max_batch_size = self.config.max_batch_size;
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let Some((_, window)) = window_map.remove_if(&key, |_, w| Arc::ptr_eq(w, &window))
            else {
                return;
            };
            let waiters = std::mem::take(&mut *window.waiters.lock().unwrap());
            if waiters.is_empty() {
                return;
            }
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };
            flush_waiters(inner, waiters, max_batch_size).await;
        });
    }
}

async fn flush_waiters<S: EntityStore>(
    inner: Arc<S>,
    mut waiters: Vec<(EntityUid, PendingReply)>,
    max_batch_size: usize,
) {
    let chunk_size = max_batch_size.max(1);
    waiters.reverse();
    while !waiters.is_empty() {
        let take = chunk_size.min(waiters.len());
        let chunk: Vec<_> = waiters.split_off(waiters.len() - take);

        let uids: Vec<EntityUid> = chunk.iter().map(|(uid, _)| uid.clone()).collect();
        match inner.load_entities(&uids).await {
            Ok(entities) => {
                let by_uid: std::collections::HashMap<_, _> =
                    entities.into_iter().map(|e| (e.uid().clone(), e)).collect();
                for (uid, reply) in chunk {
                    let value = by_uid.get(&uid).cloned();
                    let _ = reply.send(Ok(value));
                }
            }
            Err(err) => {
                let message = err.to_string();
                for (_, reply) in chunk {
                    let _ = reply.send(Err(message.clone()));
                }
            }
        }
    }
}

#[async_trait]
impl<S: EntityStore + 'static> EntityStore for BatchingEntityStore<S> {
    #[instrument(skip(self))]
    async fn load_entity(&self, uid: &EntityUid) -> Result<Option<Entity>, AuthError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(AuthError::authorization_failed("store is shutting down"));
        }

        let (tx, rx) = oneshot::channel();

        // Hold the map entry for `WINDOW_SLOT` across the push so a
        // concurrently-running flush task (which also needs that entry's
        // lock to remove it) can never drain the window between us reading
        // it and us pushing into it — see `spawn_flush`'s `remove_if` guard
        // for the other half of this invariant.
        let to_flush = {
            let entry = self
                .window
                .entry(WINDOW_SLOT)
                .or_insert_with(|| Arc::new(Window { waiters: Mutex::new(Vec::new()) }));
            let window = entry.value().clone();
            let mut waiters = window.waiters.lock().unwrap();
            let is_first = waiters.is_empty();
            waiters.push((uid.clone(), tx));
            let reached_max_batch_size = waiters.len() >= self.config.max_batch_size;
            drop(waiters);

            if reached_max_batch_size {
                Some((window, None))
            } else if is_first {
                Some((window, Some(self.config.window)))
            } else {
                None
            }
        };
        if let Some((window, delay)) = to_flush {
            self.spawn_flush(WINDOW_SLOT, window, delay);
        }

        match rx.await {
            Ok(Ok(entity)) => Ok(entity),
            Ok(Err(message)) => Err(AuthError::authorization_failed(message)),
            Err(_) => Err(AuthError::authorization_failed("batch flush task dropped the reply")),
        }
    }

    async fn load_entity_with_parents(
        &self,
        uid: &EntityUid,
        config: StoreConfig,
    ) -> Result<(Vec<Entity>, ParentChain), AuthError> {
        self.inner.load_entity_with_parents(uid, config).await
    }
}
