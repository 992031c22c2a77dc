//! Error types for entity metadata
//!
//! Every variant describes a definition mistake. Metadata is validated once
//! when it is built or loaded, so these errors surface at construction time
//! and never during form use.

use std::path::PathBuf;

/// Errors raised while building or loading entity metadata
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Entity declared without a name
    #[error("entity name must not be empty")]
    MissingName,

    /// Entity declared without an API endpoint
    #[error("entity '{entity}' has no api endpoint")]
    MissingEndpoint { entity: String },

    /// Field declared without a name
    #[error("entity '{entity}' declares a field with an empty name")]
    EmptyFieldName { entity: String },

    /// Two fields share a name within one entity or nested object
    #[error("duplicate field '{field}' in entity '{entity}'")]
    DuplicateField { entity: String, field: String },

    /// A section name is declared twice
    #[error("duplicate section '{section}' in entity '{entity}'")]
    DuplicateSection { entity: String, section: String },

    /// A field points at a section the entity never declared
    #[error("field '{field}' uses undeclared section '{section}'")]
    UnknownSection { field: String, section: String },

    /// Field kind tag not recognised
    #[error("unknown field kind '{kind}' on field '{field}'")]
    UnknownKind { field: String, kind: String },

    /// Regex validation rule does not compile
    #[error("field '{field}' has invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },

    /// Numeric range with min above max
    #[error("field '{field}' has invalid range: min {min} > max {max}")]
    InvalidRange { field: String, min: f64, max: f64 },

    /// Enum field without options
    #[error("enum field '{field}' declares no options")]
    EmptyEnum { field: String },

    /// Reference kind without a reference block (catalog files only)
    #[error("reference field '{field}' is missing its reference configuration")]
    MissingReferenceConfig { field: String },

    /// Reference without a list endpoint
    #[error("reference field '{field}' has no endpoint")]
    MissingReferenceEndpoint { field: String },

    /// Inline create enabled without target metadata
    #[error("reference field '{field}' allows inline create but has no target entity")]
    MissingCreateTarget { field: String },

    /// Catalog reference target not declared (or declared later)
    #[error("field '{field}' references unknown entity '{target}'")]
    UnknownTarget { field: String, target: String },

    /// Entity name repeated within a catalog
    #[error("entity '{0}' is defined more than once")]
    DuplicateEntity(String),

    /// Catalog document could not be parsed
    #[error("catalog parse error: {0}")]
    Parse(String),

    /// Catalog file extension not supported
    #[error("unsupported catalog format: '{0}'")]
    UnsupportedFormat(String),

    /// IO error reading a catalog file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MetadataError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for MetadataError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for metadata operations
pub type MetadataResult<T> = Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_field_display() {
        let err = MetadataError::DuplicateField {
            entity: "Bank".to_string(),
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate field 'name' in entity 'Bank'");
    }

    #[test]
    fn json_error_converts_to_parse() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let meta_err: MetadataError = err.into();
        assert!(matches!(meta_err, MetadataError::Parse(_)));
    }
}
