//! Error taxonomy (four semantic kinds; see the session crate for where
//! each one is actually raised).

use thiserror::Error;

/// All errors the runtime surfaces to a caller of `run`.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Cedar evaluated to deny, or a composed check had no satisfying
    /// branch.
    #[error("unauthorized: {message}")]
    Unauthorized {
        message: String,
        deny_reason: Option<String>,
    },

    /// The principal resolver returned "no such principal".
    #[error("unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// Internal error: a fetcher failed, the engine errored, or principal
    /// resolution raised.
    #[error("authorization failed: {message}")]
    AuthorizationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid schema/policy at load time, or an invalid entity-uid
    /// literal. Raised at construction, never at request time.
    #[error("configuration error: {message}")]
    ConfigurationError { message: String },
}

impl AuthError {
    pub fn unauthorized(message: impl Into<String>, deny_reason: Option<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            deny_reason,
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    pub fn authorization_failed(message: impl Into<String>) -> Self {
        Self::AuthorizationFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn authorization_failed_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::AuthorizationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
