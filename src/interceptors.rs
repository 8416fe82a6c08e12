//! Documented interceptor built-ins: an audit record emitter and a tracing
//! span tagger. Neither is part of the core pipeline — both are ordinary
//! consumers of the `Interceptor` port, kept here as the application-facing
//! surface.

use async_trait::async_trait;
use kernel::{AuthError, AuthResponse};
use session::Interceptor;
use tracing::{info, warn};

/// Emits one structured log line per decision, suitable for shipping to an
/// audit sink via the logging backend already configured.
pub struct AuditInterceptor;

#[async_trait]
impl Interceptor for AuditInterceptor {
    async fn on_response(&self, response: &AuthResponse) -> Result<(), AuthError> {
        info!(
            target: "authz::audit",
            principal = %response.principal,
            action = %response.action,
            resource = %response.resource,
            allow = response.decision.allow,
            duration_ms = response.duration_nanos / 1_000_000,
            "authorization decision"
        );
        Ok(())
    }
}

/// Tags the current span with the semantic fields a reader would expect to
/// find on an authorization check: principal/action/resource types, the
/// decision, and how long it took.
pub struct TracingInterceptor;

#[async_trait]
impl Interceptor for TracingInterceptor {
    async fn on_response(&self, response: &AuthResponse) -> Result<(), AuthError> {
        let span = tracing::info_span!(
            "authorization_check",
            principal.r#type = %response.principal.entity_type(),
            action.name = %response.action.id(),
            resource.r#type = %response.resource.entity_type(),
            decision = response.decision.allow,
            duration_ms = response.duration_nanos / 1_000_000,
        );
        let _entered = span.enter();
        if !response.decision.allow {
            warn!(deny_reason = ?response.decision.deny_reason(), "check denied");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::{Decision, Entities, EntityUid};

    fn sample_response(allow: bool) -> AuthResponse {
        AuthResponse {
            timestamp: time::OffsetDateTime::UNIX_EPOCH,
            duration_nanos: 2_000_000,
            principal: EntityUid::of_type("User", "alice").unwrap(),
            principal_entities: Entities::empty(),
            action: EntityUid::of_type("Action", "read").unwrap(),
            resource: EntityUid::of_type("Document", "d1").unwrap(),
            context: Default::default(),
            entities: Entities::empty(),
            decision: if allow { Decision::allow() } else { Decision::deny() },
            errors: vec![],
        }
    }

    #[tokio::test]
    async fn audit_interceptor_never_fails() {
        let interceptor = AuditInterceptor;
        assert!(interceptor.on_response(&sample_response(true)).await.is_ok());
        assert!(interceptor.on_response(&sample_response(false)).await.is_ok());
    }

    #[tokio::test]
    async fn tracing_interceptor_never_fails() {
        let interceptor = TracingInterceptor;
        assert!(interceptor.on_response(&sample_response(true)).await.is_ok());
        assert!(interceptor.on_response(&sample_response(false)).await.is_ok());
    }
}
