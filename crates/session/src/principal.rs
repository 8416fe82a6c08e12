//! Principal resolution: the application-supplied bridge from the session's
//! principal type `P` to a fully-resolved `CedarPrincipal`.

use async_trait::async_trait;
use kernel::{AuthError, CedarPrincipal};
use std::sync::Arc;

#[async_trait]
pub trait PrincipalResolver<P>: Send + Sync {
    /// Returns `Unauthenticated` when `principal` does not correspond to a
    /// real entity.
    async fn resolve(&self, principal: &P) -> Result<CedarPrincipal, AuthError>;
}

#[async_trait]
impl<T, P> PrincipalResolver<P> for Arc<T>
where
    T: PrincipalResolver<P> + ?Sized,
    P: Send + Sync,
{
    async fn resolve(&self, principal: &P) -> Result<CedarPrincipal, AuthError> {
        (**self).resolve(principal).await
    }
}
