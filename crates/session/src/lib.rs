//! The session crate wires the kernel's `AuthCheck` DSL to a concrete
//! engine and entity store, producing the per-request orchestrator (C7)
//! along with its supporting pieces: deferred resource resolution (C8)
//! and the interceptor pipeline (C9).

pub mod deferred;
pub mod interceptor;
pub mod principal;
pub mod runner;

pub use deferred::DeferredCheck;
pub use interceptor::{Interceptor, IsolatedChain, NoopInterceptor, ThreadingChain};
pub use principal::PrincipalResolver;
pub use runner::Session;
