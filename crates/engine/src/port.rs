//! The narrow port other crates depend on (§4.6): the only interface over
//! the external Cedar evaluator. Kept as a trait so the session crate can
//! swap in a mock during tests.

use crate::error::EngineError;
use async_trait::async_trait;
use kernel::{CedarRequest, Decision, Entities, EntityUid};
use std::collections::HashSet;
use std::sync::Arc;

#[async_trait]
pub trait Engine: Send + Sync {
    async fn authorize(
        &self,
        request: &CedarRequest,
        entities: &Entities,
    ) -> Result<Decision, EngineError>;

    /// Order-preserving; `entities` is shared across every request.
    async fn authorize_batch(
        &self,
        requests: &[CedarRequest],
        entities: &Entities,
    ) -> Result<Vec<Decision>, EngineError>;

    /// Executes one request per candidate action and returns the subset
    /// that evaluated to allow.
    async fn allowed_actions(
        &self,
        principal: &EntityUid,
        resource: &EntityUid,
        action_type: &str,
        candidate_actions: &HashSet<String>,
        entities: &Entities,
    ) -> Result<HashSet<String>, EngineError>;
}

#[async_trait]
impl<T: Engine + ?Sized> Engine for Arc<T> {
    async fn authorize(
        &self,
        request: &CedarRequest,
        entities: &Entities,
    ) -> Result<Decision, EngineError> {
        (**self).authorize(request, entities).await
    }

    async fn authorize_batch(
        &self,
        requests: &[CedarRequest],
        entities: &Entities,
    ) -> Result<Vec<Decision>, EngineError> {
        (**self).authorize_batch(requests, entities).await
    }

    async fn allowed_actions(
        &self,
        principal: &EntityUid,
        resource: &EntityUid,
        action_type: &str,
        candidate_actions: &HashSet<String>,
        entities: &Entities,
    ) -> Result<HashSet<String>, EngineError> {
        (**self)
            .allowed_actions(principal, resource, action_type, candidate_actions, entities)
            .await
    }
}
