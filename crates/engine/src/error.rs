//! Errors raised by the engine adapter.

use thiserror::Error;

/// Errors that can occur while translating to/from Cedar's native types or
/// while evaluating a request.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("translation error: {0}")]
    TranslationError(String),

    #[error("evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("invalid policy syntax: {0}")]
    InvalidPolicy(String),

    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl From<EngineError> for kernel::AuthError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidPolicy(message)
            | EngineError::SchemaError(message)
            | EngineError::ConfigurationError(message) => {
                kernel::AuthError::configuration_error(message)
            }
            EngineError::TranslationError(message) | EngineError::EvaluationFailed(message) => {
                kernel::AuthError::authorization_failed(message)
            }
        }
    }
}
