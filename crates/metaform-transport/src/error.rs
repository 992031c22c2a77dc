//! Transport errors

use serde_json::Value;

/// Errors raised by a [`Transport`](crate::Transport)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Server answered with a non-success status
    #[error("http {status}{}", message_suffix(.message))]
    Status {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body, if any
        message: Option<String>,
    },

    /// Request never completed (connection, DNS, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// Response body was not valid JSON
    #[error("decode error: {0}")]
    Decode(String),

    /// Response JSON did not have the expected shape
    #[error("unexpected response shape: {0}")]
    Envelope(String),
}

impl TransportError {
    /// Status error with a server message
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: Some(message.into()),
        }
    }

    /// Status error built from a response body
    ///
    /// The server message is taken from a top-level `message` or `error`
    /// string when present.
    #[must_use]
    pub fn from_body(status: u16, body: &Value) -> Self {
        let message = ["message", "error"]
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_str))
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string);
        Self::Status { status, message }
    }

    /// Message the server supplied for this failure
    #[inline]
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Whether re-issuing the same request might succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Decode(_) | Self::Envelope(_) => false,
        }
    }
}

fn message_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_message_from_body() {
        let err = TransportError::from_body(422, &json!({"message": "Account number taken"}));
        assert_eq!(err.server_message(), Some("Account number taken"));
        assert_eq!(err.to_string(), "http 422: Account number taken");

        let err = TransportError::from_body(400, &json!({"error": "bad request"}));
        assert_eq!(err.server_message(), Some("bad request"));

        let err = TransportError::from_body(500, &json!({"detail": 1}));
        assert_eq!(err.server_message(), None);
        assert_eq!(err.to_string(), "http 500");
    }

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Network("reset".into()).is_retryable());
        assert!(TransportError::from_body(503, &Value::Null).is_retryable());
        assert!(TransportError::from_body(429, &Value::Null).is_retryable());
        assert!(!TransportError::from_body(404, &Value::Null).is_retryable());
        assert!(!TransportError::Decode("eof".into()).is_retryable());
    }
}
