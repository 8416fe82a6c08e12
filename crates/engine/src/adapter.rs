//! `CedarEngine`: the one place in the whole workspace that holds a
//! `cedar_policy::Authorizer`.

use crate::error::EngineError;
use crate::policy::{PolicyDocument, SchemaSource};
use crate::port::Engine;
use crate::translate::{from_cedar_response, to_cedar_context, to_cedar_entities, to_cedar_euid};
use async_trait::async_trait;
use cedar_policy::{Authorizer, Policy, PolicyId, PolicySet, Request, Schema, Validator, ValidationMode};
use kernel::{CedarRequest, Decision, Entities, EntityUid};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::instrument;

pub struct CedarEngine {
    authorizer: Arc<Authorizer>,
    policies: Arc<RwLock<PolicySet>>,
    schema: Option<Arc<Schema>>,
}

impl CedarEngine {
    pub fn new() -> Self {
        Self {
            authorizer: Arc::new(Authorizer::new()),
            policies: Arc::new(RwLock::new(PolicySet::new())),
            schema: None,
        }
    }

    pub fn with_schema_source(source: SchemaSource) -> Result<Self, EngineError> {
        let schema = match source {
            SchemaSource::CedarDsl(text) => Schema::from_str(&text)
                .map_err(|e| EngineError::SchemaError(e.to_string()))?,
            SchemaSource::Json(text) => {
                Schema::from_json_str(&text).map_err(|e| EngineError::SchemaError(e.to_string()))?
            }
        };
        let mut engine = Self::new();
        engine.schema = Some(Arc::new(schema));
        Ok(engine)
    }

    /// Parses and swaps in an entirely new policy set, validating against
    /// the configured schema (if any). Returns the number of policies
    /// loaded.
    pub fn load_policies(&self, documents: &[PolicyDocument]) -> Result<usize, EngineError> {
        let mut set = PolicySet::new();
        for doc in documents {
            let policy = Policy::parse(Some(PolicyId::new(doc.id.clone())), &doc.content)
                .map_err(|e| EngineError::InvalidPolicy(format!("{}: {e}", doc.id)))?;
            set.add(policy)
                .map_err(|e| EngineError::InvalidPolicy(e.to_string()))?;
        }

        if let Some(schema) = &self.schema {
            let validator = Validator::new((**schema).clone());
            let result = validator.validate(&set, ValidationMode::default());
            if !result.validation_passed() {
                let messages: Vec<String> = result.validation_errors().map(|e| e.to_string()).collect();
                return Err(EngineError::SchemaError(messages.join("; ")));
            }
        }

        let count = set.policies().count();
        let mut guard = self
            .policies
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = set;
        Ok(count)
    }

    pub fn policy_count(&self) -> usize {
        self.policies
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .policies()
            .count()
    }

    fn build_request(request: &CedarRequest) -> Result<Request, EngineError> {
        let principal = to_cedar_euid(&request.principal)?;
        let action = to_cedar_euid(&request.action)?;
        let resource = to_cedar_euid(&request.resource)?;
        let context = to_cedar_context(&request.context)?;
        Request::new(principal, action, resource, context, None)
            .map_err(|e| EngineError::TranslationError(e.to_string()))
    }
}

impl Default for CedarEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for CedarEngine {
    #[instrument(skip_all)]
    async fn authorize(
        &self,
        request: &CedarRequest,
        entities: &Entities,
    ) -> Result<Decision, EngineError> {
        let cedar_request = Self::build_request(request)?;
        let cedar_entities = to_cedar_entities(entities)?;
        let authorizer = self.authorizer.clone();
        let policies = self.policies.clone();

        tokio::task::spawn_blocking(move || {
            let set = policies.read().unwrap_or_else(|p| p.into_inner()).clone();
            let response = authorizer.is_authorized(&cedar_request, &set, &cedar_entities);
            from_cedar_response(response)
        })
        .await
        .map_err(|e| EngineError::EvaluationFailed(e.to_string()))
    }

    #[instrument(skip_all)]
    async fn authorize_batch(
        &self,
        requests: &[CedarRequest],
        entities: &Entities,
    ) -> Result<Vec<Decision>, EngineError> {
        let cedar_requests = requests
            .iter()
            .map(Self::build_request)
            .collect::<Result<Vec<_>, _>>()?;
        let cedar_entities = to_cedar_entities(entities)?;
        let authorizer = self.authorizer.clone();
        let policies = self.policies.clone();

        tokio::task::spawn_blocking(move || {
            let set = policies.read().unwrap_or_else(|p| p.into_inner()).clone();
            cedar_requests
                .iter()
                .map(|req| from_cedar_response(authorizer.is_authorized(req, &set, &cedar_entities)))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| EngineError::EvaluationFailed(e.to_string()))
    }

    #[instrument(skip_all)]
    async fn allowed_actions(
        &self,
        principal: &EntityUid,
        resource: &EntityUid,
        action_type: &str,
        candidate_actions: &HashSet<String>,
        entities: &Entities,
    ) -> Result<HashSet<String>, EngineError> {
        let mut requests = Vec::with_capacity(candidate_actions.len());
        let mut ordered_candidates = Vec::with_capacity(candidate_actions.len());
        for candidate in candidate_actions {
            let action = EntityUid::of_type(action_type, candidate.clone())
                .map_err(|e| EngineError::TranslationError(e.to_string()))?;
            requests.push(CedarRequest {
                principal: principal.clone(),
                action,
                resource: resource.clone(),
                context: Default::default(),
            });
            ordered_candidates.push(candidate.clone());
        }

        let decisions = self.authorize_batch(&requests, entities).await?;
        Ok(ordered_candidates
            .into_iter()
            .zip(decisions)
            .filter_map(|(name, decision)| decision.allow.then_some(name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::{AttributeValue, Entity};
    use std::collections::HashMap;

    fn engine_with_owner_policy() -> CedarEngine {
        let engine = CedarEngine::new();
        engine
            .load_policies(&[PolicyDocument::new(
                "owner-read",
                "permit(principal, action, resource) when { resource.owner == principal };",
            )])
            .unwrap();
        engine
    }

    fn document_entities(owner: &str) -> Entities {
        let owner_uid = EntityUid::of_type("User", owner).unwrap();
        Entities::from_iter([
            Entity::with_no_parents(owner_uid.clone(), []),
            Entity::with_no_parents(
                EntityUid::of_type("Document", "d1").unwrap(),
                [(
                    "owner".to_string(),
                    AttributeValue::entity_ref(owner_uid),
                )],
            ),
        ])
    }

    #[tokio::test]
    async fn owner_is_allowed_to_read() {
        let engine = engine_with_owner_policy();
        let request = CedarRequest {
            principal: EntityUid::of_type("User", "alice").unwrap(),
            action: EntityUid::of_type("Action", "read").unwrap(),
            resource: EntityUid::of_type("Document", "d1").unwrap(),
            context: HashMap::new(),
        };
        let decision = engine.authorize(&request, &document_entities("alice")).await.unwrap();
        assert!(decision.allow);
    }

    #[tokio::test]
    async fn non_owner_is_denied() {
        let engine = engine_with_owner_policy();
        let request = CedarRequest {
            principal: EntityUid::of_type("User", "bob").unwrap(),
            action: EntityUid::of_type("Action", "read").unwrap(),
            resource: EntityUid::of_type("Document", "d1").unwrap(),
            context: HashMap::new(),
        };
        let decision = engine.authorize(&request, &document_entities("alice")).await.unwrap();
        assert!(!decision.allow);
    }

    #[tokio::test]
    async fn allowed_actions_returns_only_permitted_candidates() {
        let engine = engine_with_owner_policy();
        let candidates: HashSet<String> = ["read".to_string(), "delete".to_string()].into();
        let allowed = engine
            .allowed_actions(
                &EntityUid::of_type("User", "alice").unwrap(),
                &EntityUid::of_type("Document", "d1").unwrap(),
                "Action",
                &candidates,
                &document_entities("alice"),
            )
            .await
            .unwrap();
        assert_eq!(allowed, candidates);
    }
}
