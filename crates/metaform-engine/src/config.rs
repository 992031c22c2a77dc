//! Engine configuration
//!
//! Loaded from TOML; every key is optional:
//!
//! ```toml
//! debounce_ms = 300
//! min_query_len = 2
//! search_param = "q"
//! update_method = "put"
//! envelope = "data"
//! generic_error_message = "Something went wrong"
//! ```

use crate::error::EngineError;
use metaform_resolve::ResolverConfig;
use metaform_transport::{EnvelopeShape, Method};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// HTTP method used for updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    /// `PATCH <endpoint>/<id>`
    #[default]
    Patch,
    /// `PUT <endpoint>/<id>`
    Put,
}

impl From<UpdateMethod> for Method {
    fn from(method: UpdateMethod) -> Self {
        match method {
            UpdateMethod::Patch => Method::Patch,
            UpdateMethod::Put => Method::Put,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Search debounce window in milliseconds
    pub debounce_ms: u64,
    /// Minimum search length in characters
    pub min_query_len: usize,
    /// Query parameter carrying search text
    pub search_param: String,
    /// Method used for updates
    pub update_method: UpdateMethod,
    /// Shape of list responses
    pub envelope: EnvelopeShape,
    /// Message shown when a failed mutation carries no server message
    pub generic_error_message: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            min_query_len: 2,
            search_param: "search".to_string(),
            update_method: UpdateMethod::Patch,
            envelope: EnvelopeShape::Auto,
            generic_error_message: "The request could not be completed. Please try again."
                .to_string(),
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With debounce window
    #[inline]
    #[must_use]
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// With minimum search length
    #[inline]
    #[must_use]
    pub fn with_min_query_len(mut self, len: usize) -> Self {
        self.min_query_len = len;
        self
    }

    /// With search parameter name
    #[inline]
    #[must_use]
    pub fn with_search_param(mut self, param: impl Into<String>) -> Self {
        self.search_param = param.into();
        self
    }

    /// With update method
    #[inline]
    #[must_use]
    pub fn with_update_method(mut self, method: UpdateMethod) -> Self {
        self.update_method = method;
        self
    }

    /// With list envelope shape
    #[inline]
    #[must_use]
    pub fn with_envelope(mut self, envelope: EnvelopeShape) -> Self {
        self.envelope = envelope;
        self
    }

    /// With generic mutation error message
    #[inline]
    #[must_use]
    pub fn with_generic_error_message(mut self, message: impl Into<String>) -> Self {
        self.generic_error_message = message.into();
        self
    }

    /// Parse TOML
    pub fn from_toml_str(source: &str) -> Result<Self, EngineError> {
        toml::from_str(source).map_err(|e| EngineError::configuration(format!("invalid config: {e}")))
    }

    /// Load a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            EngineError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Debounce window
    #[inline]
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Resolver settings derived from this configuration
    #[must_use]
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::new()
            .with_debounce(self.debounce())
            .with_min_query_len(self.min_query_len)
            .with_search_param(self.search_param.clone())
            .with_envelope(self.envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.min_query_len, 2);
        assert_eq!(config.update_method, UpdateMethod::Patch);
        assert_eq!(config.resolver_config(), ResolverConfig::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            "debounce_ms = 250\nupdate_method = \"put\"\nenvelope = \"items\"\n",
        )
        .unwrap();
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(Method::from(config.update_method), Method::Put);
        assert_eq!(config.envelope, EnvelopeShape::Items);
        assert_eq!(config.search_param, "search");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("debounce = 3").unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn builder_methods() {
        let config = EngineConfig::new()
            .with_debounce_ms(0)
            .with_min_query_len(1)
            .with_search_param("q")
            .with_generic_error_message("Oops");
        assert_eq!(config.resolver_config().search_param, "q");
        assert_eq!(config.generic_error_message, "Oops");
    }
}
