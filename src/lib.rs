//! Application-embedded authorization runtime.
//!
//! This crate is the facade over the four libraries that make up the
//! pipeline: [`kernel`] (entity model, `AuthCheck` DSL), [`engine`] (the
//! Cedar adapter), [`store`] (fetcher registry, coalescing cache, request
//! batcher), and [`session`] (the per-request orchestrator). It re-exports
//! the pieces an embedding application needs and adds the ambient concerns
//! a deployed binary carries: configuration and logging setup, plus the
//! documented interceptor built-ins.

pub mod config;
pub mod interceptors;
pub mod logging;

pub use config::RuntimeConfig;
pub use engine::{CedarEngine, Engine, EngineError};
pub use kernel::{
    AttributeValue, AuthCheck, AuthError, AuthResponse, CedarPrincipal, CedarRequest, Decision,
    Entities, Entity, EntityTypeName, EntityUid, ResourceRef,
};
pub use session::{DeferredCheck, Interceptor, IsolatedChain, NoopInterceptor, Session, ThreadingChain};
pub use store::{
    BatchConfig, BatchingEntityStore, CacheConfig, CachingEntityStore, EntityStore,
    FetcherEntityStore, FetcherRegistry, StoreConfig,
};
