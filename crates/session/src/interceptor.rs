//! Interceptor pipeline (C9): side-effecting observers notified after every
//! executed check.

use async_trait::async_trait;
use kernel::{AuthError, AuthResponse};
use std::sync::Arc;

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn on_response(&self, response: &AuthResponse) -> Result<(), AuthError>;
}

#[async_trait]
impl<T: Interceptor + ?Sized> Interceptor for Arc<T> {
    async fn on_response(&self, response: &AuthResponse) -> Result<(), AuthError> {
        (**self).on_response(response).await
    }
}

/// The default interceptor: observes nothing.
pub struct NoopInterceptor;

#[async_trait]
impl Interceptor for NoopInterceptor {
    async fn on_response(&self, _response: &AuthResponse) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Runs every interceptor in order regardless of earlier failures. This is
/// what the session runner uses internally: a failing interceptor must
/// never suppress a sibling's notification.
pub struct IsolatedChain(Vec<Arc<dyn Interceptor>>);

impl IsolatedChain {
    pub fn new(chain: Vec<Arc<dyn Interceptor>>) -> Self {
        Self(chain)
    }
}

#[async_trait]
impl Interceptor for IsolatedChain {
    async fn on_response(&self, response: &AuthResponse) -> Result<(), AuthError> {
        for interceptor in &self.0 {
            let _ = interceptor.on_response(response).await;
        }
        Ok(())
    }
}

/// Alternate composition mode: threads the first error through the chain,
/// stopping at the first failing interceptor. Distinct from `IsolatedChain`
/// — most callers want the latter.
pub struct ThreadingChain(Vec<Arc<dyn Interceptor>>);

impl ThreadingChain {
    pub fn new(chain: Vec<Arc<dyn Interceptor>>) -> Self {
        Self(chain)
    }
}

#[async_trait]
impl Interceptor for ThreadingChain {
    async fn on_response(&self, response: &AuthResponse) -> Result<(), AuthError> {
        for interceptor in &self.0 {
            interceptor.on_response(response).await?;
        }
        Ok(())
    }
}
