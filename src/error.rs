//! Error types for the dispatch core.

use thiserror::Error;

/// Route registration failures. Raised at worker start, never per request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("unknown HTTP method: {0:?}")]
    UnknownMethod(String),

    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route pattern {pattern:?} declares variable {name:?} more than once")]
    DuplicateVariable { pattern: String, name: String },

    #[error("invalid constraint for variable {name:?}: {reason}")]
    InvalidConstraint { name: String, reason: String },

    #[error("route declaration {0:?} must be \"METHODS /path\" or \"METHODS\"")]
    InvalidDeclaration(String),

    #[error("member {member:?} has several declarations, so each needs an explicit path")]
    AmbiguousDerivedPath { member: String },
}

/// ClientInputError: a handler input is missing or malformed.
///
/// Answered with 400 without running the handler body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("missing required parameter {0:?}")]
    Missing(String),

    #[error("parameter {name:?} cannot be bound as {expected}")]
    Mismatch { name: String, expected: &'static str },

    #[error("parameter {name:?} has invalid value {value:?}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Failures that reach the failure boundary and produce a 500.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// SerializationError: the handler's return value could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HandlerFault: the handler or its pre-route hook returned an error.
    #[error("{0:?}")]
    Handler(anyhow::Error),

    /// ProgrammingMisuse: the handler returned a shape with no response meaning.
    #[error("handler returned an unsupported value: {0}")]
    Misuse(String),

    /// HandlerFault raised as a panic.
    #[error("handler panicked: {0}")]
    Panic(String),
}

/// Session store failures.
#[derive(Debug, Clone, Error)]
#[error("session store error: {message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    /// Create a new store error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Configuration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown environment {0:?}, expected development, testing, upstream or production")]
    UnknownEnvironment(String),

    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),
}
