//! Engine error types.

use crate::config::ConfigError;
use thiserror::Error;

/// Boxed error carried across engine boundaries: transition bodies,
/// callbacks, and collaborator writes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from the transition engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown transition '{name}' on field '{field}'")]
    UnknownTransition { field: String, name: String },

    #[error("transition '{name}' not allowed from state '{state}': {}", match .guard {
        Some(g) => format!("guard '{g}' failed"),
        None => "no source pattern matches".to_string(),
    })]
    TransitionNotAllowed {
        name: String,
        state: String,
        guard: Option<String>,
    },

    #[error("transition '{name}' resolved to '{resolved}', outside its declared target set")]
    InvalidResolvedState { name: String, resolved: String },

    #[error("concurrent transition on field '{field}': committed state '{actual}', attempt read '{expected}'")]
    ConcurrentTransition {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("transition '{name}' body failed: {source}")]
    BodyFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("on_success callback of '{name}' failed: {source}")]
    CallbackFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("commit failed for transition '{name}': {source}")]
    CommitFailed {
        name: String,
        #[source]
        source: ScopeError,
    },

    #[error("state field '{field}' is protected; assign through a transition")]
    ProtectedField { field: String },

    #[error("duplicate transition name '{name}'")]
    DuplicateTransitionName { name: String },

    #[error("invalid transition definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("invalid state field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Returns whether this error indicates the attempt can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConcurrentTransition { .. })
    }

    /// Returns a stable machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::UnknownTransition { .. } => "UNKNOWN_TRANSITION",
            EngineError::TransitionNotAllowed { .. } => "TRANSITION_NOT_ALLOWED",
            EngineError::InvalidResolvedState { .. } => "INVALID_RESOLVED_STATE",
            EngineError::ConcurrentTransition { .. } => "CONFLICT",
            EngineError::BodyFailed { .. } => "BODY_FAILED",
            EngineError::CallbackFailed { .. } => "CALLBACK_FAILED",
            EngineError::CommitFailed { .. } => "COMMIT_FAILED",
            EngineError::ProtectedField { .. } => "PROTECTED_FIELD",
            EngineError::DuplicateTransitionName { .. } => "DUPLICATE_TRANSITION",
            EngineError::InvalidDefinition { .. } => "BAD_DEFINITION",
            EngineError::InvalidField { .. } => "BAD_DEFINITION",
            EngineError::Config(_) => "BAD_CONFIG",
        }
    }
}

/// Error surfaced by a unit-of-work commit.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ScopeError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ScopeError {
    pub fn new(message: impl Into<String>) -> Self {
        ScopeError {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: BoxError) -> Self {
        ScopeError {
            message: message.into(),
            source: Some(source),
        }
    }
}
