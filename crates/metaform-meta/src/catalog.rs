//! Entity catalogs loaded from JSON or YAML
//!
//! A catalog document lists entities in dependency order. Reference fields
//! name their target entity, which must be declared earlier in the same
//! document:
//!
//! ```yaml
//! entities:
//!   - name: Bank
//!     endpoint: /banks
//!     fields:
//!       - { name: name, kind: text, required: true }
//!   - name: Bank Account
//!     endpoint: /employeebankaccounts
//!     fields:
//!       - name: bank
//!         kind: reference
//!         reference: { endpoint: /banks, label: name, target: Bank, allowCreate: true }
//! ```

use crate::entity::{EntityMetadata, Operation};
use crate::error::MetadataError;
use crate::field::{EnumOption, FieldDescriptor, FieldKind, ReferenceConfig, TableDisplay};
use crate::projection::Projection;
use crate::validation::Validation;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Named collection of entity metadata
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: IndexMap<String, Arc<EntityMetadata>>,
}

impl Catalog {
    /// Empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON catalog document
    pub fn from_json_str(source: &str) -> Result<Self, MetadataError> {
        let raw: RawCatalog = serde_json::from_str(source)?;
        Self::from_raw(raw)
    }

    /// Parse a YAML catalog document
    pub fn from_yaml_str(source: &str) -> Result<Self, MetadataError> {
        let raw: RawCatalog = serde_yaml::from_str(source)?;
        Self::from_raw(raw)
    }

    /// Load a catalog file, choosing the format by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|e| MetadataError::io_error(path, e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&source),
            Some("yaml" | "yml") => Self::from_yaml_str(&source),
            other => Err(MetadataError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// Register already-built metadata
    pub fn insert(&mut self, metadata: Arc<EntityMetadata>) -> Result<(), MetadataError> {
        let name = metadata.name().to_string();
        if self.entities.contains_key(&name) {
            return Err(MetadataError::DuplicateEntity(name));
        }
        self.entities.insert(name, metadata);
        Ok(())
    }

    /// Entity by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<EntityMetadata>> {
        self.entities.get(name).cloned()
    }

    /// Entity names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Number of entities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the catalog is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn from_raw(raw: RawCatalog) -> Result<Self, MetadataError> {
        let mut catalog = Self::new();
        for entity in raw.entities {
            let metadata = entity.into_metadata(&catalog)?;
            catalog.insert(Arc::new(metadata))?;
        }
        Ok(catalog)
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    entities: Vec<RawEntity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntity {
    name: String,
    #[serde(alias = "apiEndpoint")]
    endpoint: String,
    #[serde(default)]
    operations: Option<Vec<Operation>>,
    #[serde(default)]
    sections: Vec<String>,
    #[serde(default)]
    fields: Vec<RawField>,
}

impl RawEntity {
    fn into_metadata(self, catalog: &Catalog) -> Result<EntityMetadata, MetadataError> {
        let mut builder = EntityMetadata::builder(self.name, self.endpoint);
        if let Some(operations) = self.operations {
            builder = builder.operations(operations);
        }
        for section in self.sections {
            builder = builder.section(section);
        }
        for field in self.fields {
            builder = builder.field(field.into_descriptor(catalog)?);
        }
        builder.build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    name: String,
    kind: String,
    #[serde(default)]
    required: bool,
    label: Option<String>,
    placeholder: Option<String>,
    help_text: Option<String>,
    section: Option<String>,
    validation: Option<RawValidation>,
    table: Option<RawTable>,
    default: Option<Value>,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    options: Vec<RawOption>,
    reference: Option<RawReference>,
    #[serde(default)]
    fields: Vec<RawField>,
}

impl RawField {
    fn into_descriptor(self, catalog: &Catalog) -> Result<FieldDescriptor, MetadataError> {
        let kind = match self.kind.as_str() {
            "text" => FieldKind::Text,
            "longText" => FieldKind::LongText,
            "markdown" => FieldKind::Markdown,
            "number" => FieldKind::Number,
            "boolean" => FieldKind::Boolean,
            "date" => FieldKind::Date,
            "dateTime" => FieldKind::DateTime,
            "enum" => FieldKind::Enum(self.options.into_iter().map(RawOption::into_option).collect()),
            "reference" | "referenceList" => {
                let raw = self.reference.ok_or_else(|| MetadataError::MissingReferenceConfig {
                    field: self.name.clone(),
                })?;
                let config = raw.into_config(&self.name, catalog)?;
                if self.kind == "reference" {
                    FieldKind::Reference(config)
                } else {
                    FieldKind::ReferenceList(config)
                }
            }
            "nestedObject" => FieldKind::NestedObject(
                self.fields
                    .into_iter()
                    .map(|f| f.into_descriptor(catalog))
                    .collect::<Result<_, _>>()?,
            ),
            other => {
                return Err(MetadataError::UnknownKind {
                    field: self.name,
                    kind: other.to_string(),
                })
            }
        };

        let mut field = FieldDescriptor::new(self.name, kind);
        field.required = self.required;
        field.label = self.label;
        field.placeholder = self.placeholder;
        field.help_text = self.help_text;
        field.section = self.section;
        field.default = self.default;
        field.read_only = self.read_only;
        if let Some(validation) = self.validation {
            field.validation = validation.into_validation();
        }
        if let Some(table) = self.table {
            field = match table.path {
                Some(path) => field.column_with(TableDisplay::new(table.header, path)),
                None => field.column(table.header),
            };
            if let Some(accessor) = table.accessor {
                field.table_display = field.table_display.map(|d| d.with_accessor(accessor));
            }
        }
        Ok(field)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValidation {
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<String>,
    min: Option<f64>,
    max: Option<f64>,
    message: Option<String>,
}

impl RawValidation {
    fn into_validation(self) -> Validation {
        let mut validation = Validation::new();
        if let Some(min) = self.min_length {
            validation = validation.min_length(min);
        }
        if let Some(max) = self.max_length {
            validation = validation.max_length(max);
        }
        if let Some(pattern) = &self.pattern {
            validation = validation.pattern(pattern);
        }
        if self.min.is_some() || self.max.is_some() {
            validation = validation.range(self.min, self.max);
        }
        if let Some(message) = self.message {
            validation = validation.with_message(message);
        }
        validation
    }
}

#[derive(Debug, Deserialize)]
struct RawTable {
    header: String,
    path: Option<String>,
    accessor: Option<Projection>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOption {
    Plain(String),
    Labeled { value: String, label: Option<String> },
}

impl RawOption {
    fn into_option(self) -> EnumOption {
        match self {
            Self::Plain(value) => EnumOption::plain(value),
            Self::Labeled {
                value,
                label: Some(label),
            } => EnumOption::new(value, label),
            Self::Labeled { value, label: None } => EnumOption::plain(value),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReference {
    endpoint: String,
    label: Option<Projection>,
    value: Option<Projection>,
    #[serde(default)]
    allow_create: bool,
    target: Option<String>,
}

impl RawReference {
    fn into_config(self, field: &str, catalog: &Catalog) -> Result<ReferenceConfig, MetadataError> {
        let mut config = ReferenceConfig::new(self.endpoint);
        if let Some(label) = self.label {
            config = config.with_label(label);
        }
        if let Some(value) = self.value {
            config = config.with_value(value);
        }
        if let Some(target) = self.target {
            let metadata = catalog.get(&target).ok_or_else(|| MetadataError::UnknownTarget {
                field: field.to_string(),
                target,
            })?;
            config = config.with_target(metadata);
        }
        config.allow_create = self.allow_create;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
entities:
  - name: Bank
    endpoint: /banks
    fields:
      - { name: name, kind: text, required: true, table: { header: Name } }
  - name: Bank Account
    endpoint: /employeebankaccounts
    operations: [create, read, update]
    sections: [Details]
    fields:
      - name: accountNumber
        kind: text
        required: true
        section: Details
        validation: { minLength: 4, pattern: "^[0-9]+$", message: "Digits only" }
        table: { header: Account }
      - name: type
        kind: enum
        options: [SAVINGS, { value: CURRENT, label: Current account }]
      - name: bank
        kind: reference
        required: true
        reference: { endpoint: /banks, label: name, target: Bank, allowCreate: true }
        table: { header: Bank }
"#;

    #[test]
    fn loads_yaml_catalog() {
        let catalog = Catalog::from_yaml_str(YAML).unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["Bank", "Bank Account"]);

        let account = catalog.get("Bank Account").unwrap();
        assert!(!account.allows(Operation::Delete));

        let bank = account.field("bank").unwrap();
        let config = bank.kind.reference_config().unwrap();
        assert!(config.allow_create);
        assert_eq!(config.target.as_ref().unwrap().name(), "Bank");
        assert_eq!(bank.table_display.as_ref().unwrap().path, "bank.name");

        let kind = &account.field("type").unwrap().kind;
        match kind {
            FieldKind::Enum(options) => assert_eq!(options[1].label, "Current account"),
            other => panic!("expected enum, got {other:?}"),
        }
    }

    #[test]
    fn validation_from_catalog() {
        let catalog = Catalog::from_yaml_str(YAML).unwrap();
        let account = catalog.get("Bank Account").unwrap();
        let field = account.field("accountNumber").unwrap();
        let errors = field.validate(&serde_json::json!("12ab")).unwrap_err();
        assert_eq!(errors.get("accountNumber"), Some("Digits only"));
    }

    #[test]
    fn unknown_kind_is_configuration_error() {
        let json = r#"{"entities":[{"name":"E","endpoint":"/e","fields":[{"name":"a","kind":"colour"}]}]}"#;
        let err = Catalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, MetadataError::UnknownKind { kind, .. } if kind == "colour"));
    }

    #[test]
    fn forward_target_is_rejected() {
        let json = r#"{"entities":[
            {"name":"A","endpoint":"/a","fields":[
                {"name":"b","kind":"reference","reference":{"endpoint":"/b","target":"B"}}]},
            {"name":"B","endpoint":"/b"}]}"#;
        let err = Catalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, MetadataError::UnknownTarget { target, .. } if target == "B"));
    }

    #[test]
    fn reference_without_block_is_rejected() {
        let json = r#"{"entities":[{"name":"A","endpoint":"/a","fields":[{"name":"b","kind":"referenceList"}]}]}"#;
        assert!(matches!(
            Catalog::from_json_str(json),
            Err(MetadataError::MissingReferenceConfig { .. })
        ));
    }

    #[test]
    fn duplicate_entity_is_rejected() {
        let json = r#"{"entities":[{"name":"A","endpoint":"/a"},{"name":"A","endpoint":"/a2"}]}"#;
        assert!(matches!(
            Catalog::from_json_str(json),
            Err(MetadataError::DuplicateEntity(name)) if name == "A"
        ));
    }
}
