//! Session runner (C7): the per-request orchestrator that resolves a
//! principal, assembles the entity graph, invokes the engine, and notifies
//! interceptors.

use crate::interceptor::{Interceptor, NoopInterceptor};
use crate::principal::PrincipalResolver;
use crate::deferred::DeferredCheck;
use engine::Engine;
use kernel::{
    AttributeValue, AuthCheck, AuthError, AuthResponse, CedarRequest, Decision, Entities,
    ResourceRef, Single,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use store::{EntityStore, StoreConfig};
use time::OffsetDateTime;

/// The outcome of evaluating one node of an `AuthCheck` tree before
/// interceptors run. `notify` is `false` for checks that never actually
/// executed (a skipped condition, a vacuous empty composite, or a losing
/// `AnyOf` branch) — only the response that decided the overall outcome is
/// ever handed to the interceptor chain.
struct Evaluated {
    response: AuthResponse,
    error: Option<AuthError>,
    notify: bool,
}

impl Evaluated {
    fn ok(response: AuthResponse, notify: bool) -> Self {
        Self { response, error: None, notify }
    }

    fn failed(response: AuthResponse, error: AuthError, notify: bool) -> Self {
        Self { response, error: Some(error), notify }
    }
}

/// Per-request orchestrator. Cheap to construct and discard; the engine and
/// store handles behind it are the long-lived, shared resources.
pub struct Session<P> {
    principal: P,
    session_context: HashMap<String, AttributeValue>,
    engine: Arc<dyn Engine>,
    store: Arc<dyn EntityStore>,
    resolver: Arc<dyn PrincipalResolver<P>>,
    interceptors: Arc<dyn Interceptor>,
    store_config: StoreConfig,
}

impl<P: Clone + Send + Sync + 'static> Session<P> {
    pub fn new(
        principal: P,
        engine: Arc<dyn Engine>,
        store: Arc<dyn EntityStore>,
        resolver: Arc<dyn PrincipalResolver<P>>,
    ) -> Self {
        Self {
            principal,
            session_context: HashMap::new(),
            engine,
            store,
            resolver,
            interceptors: Arc::new(NoopInterceptor),
            store_config: StoreConfig::default(),
        }
    }

    pub fn with_interceptors(mut self, interceptors: Arc<dyn Interceptor>) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn with_store_config(mut self, config: StoreConfig) -> Self {
        self.store_config = config;
        self
    }

    /// Returns a session whose session-level context is merged with `ctx`
    /// (new values override on key collision).
    pub fn with_context(mut self, context: HashMap<String, AttributeValue>) -> Self {
        self.session_context.extend(context);
        self
    }

    /// Evaluates `check`. `Ok` carries the full `AuthResponse`; `Err` is the
    /// `AuthError` that caused the denial or failure.
    pub async fn run(&self, check: AuthCheck<P>) -> Result<AuthResponse, AuthError> {
        let evaluated = self.eval(check).await;
        if evaluated.notify {
            let _ = self.interceptors.on_response(&evaluated.response).await;
        }
        match evaluated.error {
            None => Ok(evaluated.response),
            Some(err) => Err(err),
        }
    }

    /// Identical to `run`; kept as a separate name so call sites can make
    /// intent explicit ("this failure should propagate", as opposed to a
    /// call site that inspects the `Result` itself).
    pub async fn require(&self, check: AuthCheck<P>) -> Result<AuthResponse, AuthError> {
        self.run(check).await
    }

    /// Collapses to a boolean: denials and internal failures both read as
    /// `false`.
    pub async fn is_allowed(&self, check: AuthCheck<P>) -> bool {
        self.run(check).await.is_ok()
    }

    /// Resolves a deferred check (C8) and runs it.
    pub async fn run_deferred(&self, deferred: DeferredCheck<P>) -> Result<AuthResponse, AuthError> {
        let check = deferred.resolve(self.store.as_ref(), self.store_config).await;
        self.run(check).await
    }

    pub async fn is_allowed_deferred(&self, deferred: DeferredCheck<P>) -> bool {
        self.run_deferred(deferred).await.is_ok()
    }

    /// Sequential `run` over `checks`; results preserve input order. The
    /// reference implementation runs child checks one at a time — nothing
    /// in the semantics forbids a concurrent implementation provided order
    /// is preserved.
    pub async fn batch_run(&self, checks: Vec<AuthCheck<P>>) -> Vec<Result<AuthResponse, AuthError>> {
        let mut results = Vec::with_capacity(checks.len());
        for check in checks {
            results.push(self.run(check).await);
        }
        results
    }

    pub async fn batch_is_allowed(&self, checks: Vec<AuthCheck<P>>) -> Vec<bool> {
        self.batch_run(checks).await.into_iter().map(|r| r.is_ok()).collect()
    }

    /// Returns the sublist of `items` for which `to_check` produced an
    /// allowed check, preserving input order.
    pub async fn filter_allowed<T>(
        &self,
        items: Vec<T>,
        to_check: impl Fn(&T) -> AuthCheck<P>,
    ) -> Vec<T> {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let check = to_check(&item);
            if self.is_allowed(check).await {
                kept.push(item);
            }
        }
        kept
    }

    pub async fn allowed_actions(
        &self,
        resource: ResourceRef,
        action_type: &str,
        candidates: HashSet<String>,
    ) -> Result<HashSet<String>, AuthError> {
        self.allowed_actions_for(self.principal.clone(), resource, action_type, candidates)
            .await
    }

    pub async fn allowed_actions_for(
        &self,
        principal: P,
        resource: ResourceRef,
        action_type: &str,
        candidates: HashSet<String>,
    ) -> Result<HashSet<String>, AuthError> {
        let cedar_principal = self.resolver.resolve(&principal).await?;
        let resource_entities = self.store.load_for_request(&resource).await?;
        let entities = cedar_principal
            .entities
            .clone()
            .merge(Entities::from_iter(resource_entities));

        self.engine
            .allowed_actions(&cedar_principal.uid, &resource.uid(), action_type, &candidates, &entities)
            .await
            .map_err(AuthError::from)
    }

    fn eval<'a>(&'a self, check: AuthCheck<P>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Evaluated> + Send + 'a>> {
        Box::pin(async move {
            match check {
                AuthCheck::Single(single) => self.eval_single(single).await,
                AuthCheck::All(checks) => self.eval_all(checks).await,
                AuthCheck::AnyOf(checks) => self.eval_any_of(checks).await,
            }
        })
    }

    async fn eval_all(&self, checks: Vec<AuthCheck<P>>) -> Evaluated {
        if checks.is_empty() {
            return Evaluated::ok(vacuous_response(true), false);
        }
        let mut last = None;
        for check in checks {
            let evaluated = self.eval(check).await;
            let failed = evaluated.error.is_some();
            last = Some(evaluated);
            if failed {
                break;
            }
        }
        last.expect("checks is non-empty")
    }

    async fn eval_any_of(&self, checks: Vec<AuthCheck<P>>) -> Evaluated {
        if checks.is_empty() {
            return Evaluated::failed(
                vacuous_response(false),
                AuthError::unauthorized("None granted: ", None),
                false,
            );
        }

        let mut messages = Vec::new();
        for check in checks {
            let evaluated = self.eval(check).await;
            if evaluated.error.is_none() {
                return evaluated;
            }
            if let Some(err) = &evaluated.error {
                messages.push(err.to_string());
            }
        }

        Evaluated::failed(
            vacuous_response(false),
            AuthError::unauthorized(format!("None granted: {}", messages.join(", ")), None),
            true,
        )
    }

    async fn eval_single(&self, single: Single<P>) -> Evaluated {
        if let Some(condition) = &single.condition {
            if !condition.evaluate() {
                return Evaluated::ok(skip_response(&single), false);
            }
        }

        let timestamp = OffsetDateTime::now_utc();
        let started = Instant::now();

        let principal = single.principal.clone().unwrap_or_else(|| self.principal.clone());
        let cedar_principal = match self.resolver.resolve(&principal).await {
            Ok(p) => p,
            Err(err) => {
                let response = failure_response(&single, timestamp, started, Entities::empty(), &err);
                return Evaluated::failed(response, err, true);
            }
        };

        let resource_entities = match self.store.load_for_request(&single.resource).await {
            Ok(entities) => Entities::from_iter(entities),
            Err(err) => {
                let response = failure_response(
                    &single,
                    timestamp,
                    started,
                    cedar_principal.entities.clone(),
                    &err,
                );
                return Evaluated::failed(response, err, true);
            }
        };

        let mut context = self.session_context.clone();
        context.extend(single.context.clone());

        let entities = cedar_principal.entities.clone().merge(resource_entities);
        let cedar_request = CedarRequest {
            principal: cedar_principal.uid.clone(),
            action: single.action.clone(),
            resource: single.resource.uid(),
            context,
        };

        let decision = match self.engine.authorize(&cedar_request, &entities).await {
            Ok(decision) => decision,
            Err(engine_err) => {
                let auth_err = AuthError::from(engine_err);
                let response = failure_response(&single, timestamp, started, entities, &auth_err);
                return Evaluated::failed(response, auth_err, true);
            }
        };

        let response = AuthResponse {
            timestamp,
            duration_nanos: started.elapsed().as_nanos() as u64,
            principal: cedar_request.principal.clone(),
            principal_entities: cedar_principal.entities,
            action: cedar_request.action.clone(),
            resource: cedar_request.resource.clone(),
            context: cedar_request.context.clone(),
            entities,
            decision: decision.clone(),
            errors: decision.deny_reason().map(|r| vec![r.to_string()]).unwrap_or_default(),
        };

        if decision.allow {
            Evaluated::ok(response, true)
        } else {
            let err = AuthError::unauthorized(
                format!("action {} on {} was denied", single.action, single.resource.description()),
                decision.deny_reason().map(String::from),
            );
            Evaluated::failed(response, err, true)
        }
    }
}

fn skip_response<P>(single: &Single<P>) -> AuthResponse {
    AuthResponse {
        timestamp: OffsetDateTime::now_utc(),
        duration_nanos: 0,
        principal: kernel::EntityUid::of_type("Unknown", "__skipped__").unwrap(),
        principal_entities: Entities::empty(),
        action: single.action.clone(),
        resource: single.resource.uid(),
        context: single.context.clone(),
        entities: Entities::empty(),
        decision: Decision::allow(),
        errors: vec![],
    }
}

fn vacuous_response(allow: bool) -> AuthResponse {
    let placeholder = kernel::EntityUid::of_type("System", "composite-check").unwrap();
    AuthResponse {
        timestamp: OffsetDateTime::now_utc(),
        duration_nanos: 0,
        principal: placeholder.clone(),
        principal_entities: Entities::empty(),
        action: placeholder.clone(),
        resource: placeholder,
        context: HashMap::new(),
        entities: Entities::empty(),
        decision: if allow { Decision::allow() } else { Decision::deny() },
        errors: vec![],
    }
}

fn failure_response<P>(
    single: &Single<P>,
    timestamp: OffsetDateTime,
    started: Instant,
    entities: Entities,
    error: &AuthError,
) -> AuthResponse {
    let placeholder = kernel::EntityUid::of_type("Unknown", "__unresolved__").unwrap();
    AuthResponse {
        timestamp,
        duration_nanos: started.elapsed().as_nanos() as u64,
        principal: placeholder,
        principal_entities: Entities::empty(),
        action: single.action.clone(),
        resource: single.resource.uid(),
        context: single.context.clone(),
        entities,
        decision: Decision::deny(),
        errors: vec![error.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::IsolatedChain;
    use async_trait::async_trait;
    use engine::EngineError;
    use kernel::{CedarPrincipal, Entity, EntityUid};
    use std::collections::HashSet as StdHashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use store::{ParentChain, StoreConfig};

    struct AllowAllEngine {
        allow: bool,
    }

    #[async_trait]
    impl Engine for AllowAllEngine {
        async fn authorize(&self, _request: &CedarRequest, _entities: &Entities) -> Result<Decision, EngineError> {
            Ok(if self.allow { Decision::allow() } else { Decision::deny() })
        }

        async fn authorize_batch(
            &self,
            requests: &[CedarRequest],
            _entities: &Entities,
        ) -> Result<Vec<Decision>, EngineError> {
            Ok(requests.iter().map(|_| if self.allow { Decision::allow() } else { Decision::deny() }).collect())
        }

        async fn allowed_actions(
            &self,
            _principal: &EntityUid,
            _resource: &EntityUid,
            _action_type: &str,
            candidates: &StdHashSet<String>,
            _entities: &Entities,
        ) -> Result<StdHashSet<String>, EngineError> {
            Ok(if self.allow { candidates.clone() } else { StdHashSet::new() })
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl EntityStore for EmptyStore {
        async fn load_entity(&self, _uid: &EntityUid) -> Result<Option<Entity>, AuthError> {
            Ok(None)
        }

        async fn load_entity_with_parents(
            &self,
            _uid: &EntityUid,
            _config: StoreConfig,
        ) -> Result<(Vec<Entity>, ParentChain), AuthError> {
            Ok((vec![], ParentChain::default()))
        }
    }

    struct FixedResolver;

    #[async_trait]
    impl PrincipalResolver<String> for FixedResolver {
        async fn resolve(&self, principal: &String) -> Result<CedarPrincipal, AuthError> {
            let uid = EntityUid::of_type("User", principal.clone()).unwrap();
            Ok(CedarPrincipal::single(Entity::with_no_parents(uid, [])))
        }
    }

    fn session(allow: bool) -> Session<String> {
        Session::new(
            "alice".to_string(),
            Arc::new(AllowAllEngine { allow }),
            Arc::new(EmptyStore),
            Arc::new(FixedResolver),
        )
    }

    fn leaf(id: &str) -> AuthCheck<String> {
        AuthCheck::single(
            EntityUid::of_type("Action", id).unwrap(),
            ResourceRef::collection(kernel::EntityTypeName::new("Document").unwrap()),
        )
    }

    #[tokio::test]
    async fn condition_short_circuit_never_touches_store_or_engine() {
        let session = session(false);
        let check = leaf("read").when(|| false);
        let response = session.run(check).await.unwrap();
        assert!(response.is_allowed());
    }

    #[tokio::test]
    async fn empty_all_is_vacuously_allowed() {
        let session = session(false);
        let response = session.run(AuthCheck::all(vec![])).await.unwrap();
        assert!(response.is_allowed());
    }

    #[tokio::test]
    async fn empty_any_of_is_denied() {
        let session = session(true);
        let err = session.run(AuthCheck::any_of(vec![])).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn allowed_engine_grants_single_check() {
        let session = session(true);
        assert!(session.is_allowed(leaf("read")).await);
    }

    #[tokio::test]
    async fn denying_engine_rejects_single_check() {
        let session = session(false);
        assert!(!session.is_allowed(leaf("read")).await);
    }

    struct ActionGatedEngine {
        allowed_action: &'static str,
    }

    #[async_trait]
    impl Engine for ActionGatedEngine {
        async fn authorize(&self, request: &CedarRequest, _entities: &Entities) -> Result<Decision, EngineError> {
            Ok(if request.action.id() == self.allowed_action { Decision::allow() } else { Decision::deny() })
        }

        async fn authorize_batch(
            &self,
            requests: &[CedarRequest],
            entities: &Entities,
        ) -> Result<Vec<Decision>, EngineError> {
            let mut out = Vec::with_capacity(requests.len());
            for request in requests {
                out.push(self.authorize(request, entities).await?);
            }
            Ok(out)
        }

        async fn allowed_actions(
            &self,
            _principal: &EntityUid,
            _resource: &EntityUid,
            _action_type: &str,
            candidates: &StdHashSet<String>,
            _entities: &Entities,
        ) -> Result<StdHashSet<String>, EngineError> {
            Ok(candidates.iter().filter(|c| c.as_str() == self.allowed_action).cloned().collect())
        }
    }

    #[tokio::test]
    async fn any_of_falls_back_to_a_later_allowing_branch() {
        let session = Session::new(
            "alice".to_string(),
            Arc::new(ActionGatedEngine { allowed_action: "override" }),
            Arc::new(EmptyStore),
            Arc::new(FixedResolver),
        );
        let check = leaf("edit") | leaf("override");
        let response = session.run(check).await.unwrap();
        assert!(response.is_allowed());
        assert_eq!(response.action.id(), "override");
    }

    #[tokio::test]
    async fn failing_interceptor_does_not_change_the_decision() {
        let calls = Arc::new(AtomicUsize::new(0));
        struct Boom(Arc<AtomicUsize>);
        #[async_trait]
        impl Interceptor for Boom {
            async fn on_response(&self, _response: &AuthResponse) -> Result<(), AuthError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(AuthError::authorization_failed("boom"))
            }
        }
        let session = session(true).with_interceptors(Arc::new(IsolatedChain::new(vec![Arc::new(Boom(calls.clone()))])));
        let response = session.run(leaf("read")).await.unwrap();
        assert!(response.is_allowed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
