//! Error types for option resolution

use metaform_transport::TransportError;

/// Errors surfaced by an [`OptionResolver`](crate::OptionResolver)
///
/// Kept as owned strings so the last error can be stored and displayed next
/// to the control.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Search request failed
    #[error("could not load options from {endpoint}: {message}")]
    Fetch {
        /// Endpoint that was searched
        endpoint: String,
        /// Human-readable reason
        message: String,
        /// Whether retrying might help
        retryable: bool,
    },

    /// The control closed before the search settled
    #[error("search cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Fetch error from a transport failure
    #[must_use]
    pub fn fetch(endpoint: impl Into<String>, err: &TransportError) -> Self {
        Self::Fetch {
            endpoint: endpoint.into(),
            message: err
                .server_message()
                .map_or_else(|| err.to_string(), str::to_string),
            retryable: err.is_retryable(),
        }
    }

    /// Whether retrying might help
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { retryable: true, .. })
    }
}

/// Result type alias for resolver operations
pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_prefers_server_message() {
        let err = ResolveError::fetch("/banks", &TransportError::status(503, "maintenance"));
        assert_eq!(err.to_string(), "could not load options from /banks: maintenance");
        assert!(err.is_retryable());

        let err = ResolveError::fetch("/banks", &TransportError::Decode("eof".into()));
        assert!(!err.is_retryable());
    }
}
