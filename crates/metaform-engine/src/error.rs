//! Error types for the engine
//!
//! Errors fall into four groups:
//! - configuration mistakes, fatal for the affected entity
//! - field-scoped validation failures, never sent to the network
//! - fetch failures (list, fetch-one), recoverable by retrying
//! - mutation failures, shown to the user with the form kept intact

use crate::state::FormState;
use metaform_meta::{MetadataError, Operation, ValidationErrors};
use metaform_transport::TransportError;

/// Main engine error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Bad metadata or missing runtime binding
    #[error("configuration error: {0}")]
    Configuration(String),

    /// One or more fields failed validation
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// List or record fetch failed
    #[error("fetch failed: {message}")]
    Fetch {
        /// Human-readable reason
        message: String,
        /// Whether retrying might help
        retryable: bool,
    },

    /// Create, update or delete failed
    #[error("{message}")]
    Mutation {
        /// HTTP status, when the server answered
        status: Option<u16>,
        /// User-visible message
        message: String,
    },

    /// Form lifecycle violation
    #[error("invalid form transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: FormState,
        /// Requested state
        to: FormState,
    },

    /// Entity does not allow the operation
    #[error("entity '{entity}' does not allow {operation}")]
    OperationNotAllowed {
        /// Entity name
        entity: String,
        /// Refused operation
        operation: Operation,
    },

    /// A submit or delete is already in flight
    #[error("another request is already in flight")]
    Busy,

    /// Operation needs an open form
    #[error("no form is open")]
    NoOpenForm,

    /// Confirmation without a pending delete
    #[error("no delete is awaiting confirmation")]
    NoPendingDelete,

    /// Field name not part of the entity
    #[error("unknown field '{0}'")]
    UnknownField(String),
}

impl EngineError {
    /// Configuration error with message
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Fetch error from a transport failure
    #[must_use]
    pub fn fetch(err: &TransportError) -> Self {
        Self::Fetch {
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    /// Mutation error, preferring the server's message over `fallback`
    #[must_use]
    pub fn mutation(err: &TransportError, fallback: &str) -> Self {
        let status = match err {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        };
        Self::Mutation {
            status,
            message: err.server_message().unwrap_or(fallback).to_string(),
        }
    }

    /// Whether the user can recover by correcting input or retrying
    #[must_use]
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Fetch { .. } | Self::Mutation { .. } | Self::Busy
        )
    }

    /// Message suitable for a notice or form banner
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(errors) if errors.len() == 1 => errors
                .iter()
                .next()
                .map_or_else(|| self.to_string(), |(_, message)| message.to_string()),
            Self::Validation(errors) => format!("Please correct {} fields", errors.len()),
            Self::Mutation { message, .. } => message.clone(),
            Self::Fetch { .. } => "Could not load data. Please retry.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<MetadataError> for EngineError {
    fn from(err: MetadataError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
