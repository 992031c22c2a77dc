//! Field descriptors
//!
//! A [`FieldDescriptor`] describes one attribute of an entity: its semantic
//! [`FieldKind`], display hints, validation and optional table column.
//! Kind-specific configuration lives inside the kind itself, so a reference
//! configuration can only exist on reference fields.

use crate::entity::EntityMetadata;
use crate::path::{display_at, identifier, is_blank};
use crate::projection::Projection;
use crate::validation::{as_number, Validation, ValidationErrors};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Key under which placeholder records carry their display hint label
pub const HINT_LABEL_KEY: &str = "$label";

/// Option of an enum field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    /// Stored value
    pub value: String,
    /// Display label
    pub label: String,
}

impl EnumOption {
    /// Option with separate value and label
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Option whose label equals its value
    #[inline]
    #[must_use]
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

/// Semantic kind of a field
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Single-line text
    Text,
    /// Multi-line text
    LongText,
    /// Markdown text
    Markdown,
    /// Number (integer or decimal)
    Number,
    /// Boolean flag
    Boolean,
    /// Calendar date (`YYYY-MM-DD`)
    Date,
    /// Date and time (RFC 3339 or `YYYY-MM-DDTHH:MM[:SS]`)
    DateTime,
    /// One of a fixed set of options
    Enum(Vec<EnumOption>),
    /// Identifier of another entity's record
    Reference(ReferenceConfig),
    /// Ordered identifiers of other entities' records
    ReferenceList(ReferenceConfig),
    /// Embedded object with its own fields
    NestedObject(Vec<FieldDescriptor>),
}

impl FieldKind {
    /// Tags accepted in catalog files
    pub const TAGS: &'static [&'static str] = &[
        "text",
        "longText",
        "markdown",
        "number",
        "boolean",
        "date",
        "dateTime",
        "enum",
        "reference",
        "referenceList",
        "nestedObject",
    ];

    /// Tag of this kind
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::LongText => "longText",
            Self::Markdown => "markdown",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Enum(_) => "enum",
            Self::Reference(_) => "reference",
            Self::ReferenceList(_) => "referenceList",
            Self::NestedObject(_) => "nestedObject",
        }
    }

    /// Reference configuration, for reference kinds
    #[inline]
    #[must_use]
    pub fn reference_config(&self) -> Option<&ReferenceConfig> {
        match self {
            Self::Reference(config) | Self::ReferenceList(config) => Some(config),
            _ => None,
        }
    }

    /// Whether this is a reference or reference list
    #[inline]
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.reference_config().is_some()
    }

    /// Whether values of this kind are lists of identifiers
    #[inline]
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::ReferenceList(_))
    }

    /// Value a new record starts with when no default is configured
    #[must_use]
    pub fn empty_value(&self) -> Value {
        match self {
            Self::Boolean => Value::Bool(false),
            Self::ReferenceList(_) => Value::Array(Vec::new()),
            Self::NestedObject(fields) => Value::Object(default_object(fields)),
            _ => Value::Null,
        }
    }
}

/// How a reference field finds and displays its target records
#[derive(Clone)]
pub struct ReferenceConfig {
    /// Remote list endpoint of the target entity (`/banks`)
    pub endpoint: String,
    /// Label projection for display
    pub label: Projection,
    /// Value projection yielding the identifier
    pub value: Projection,
    /// Whether a new target record may be created inline
    pub allow_create: bool,
    /// Target entity, required when `allow_create` is set
    pub target: Option<Arc<EntityMetadata>>,
}

impl ReferenceConfig {
    /// Configuration labelling by `name` and identifying by `id`
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            label: Projection::path("name"),
            value: Projection::path("id"),
            allow_create: false,
            target: None,
        }
    }

    /// With label projection
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: Projection) -> Self {
        self.label = label;
        self
    }

    /// With value projection
    #[inline]
    #[must_use]
    pub fn with_value(mut self, value: Projection) -> Self {
        self.value = value;
        self
    }

    /// With target entity (needed for inline create)
    #[inline]
    #[must_use]
    pub fn with_target(mut self, target: Arc<EntityMetadata>) -> Self {
        self.target = Some(target);
        self
    }

    /// Allow inline creation of target records
    #[inline]
    #[must_use]
    pub fn allow_create(mut self, target: Arc<EntityMetadata>) -> Self {
        self.allow_create = true;
        self.target = Some(target);
        self
    }

    /// Identifier of a target record
    #[inline]
    #[must_use]
    pub fn id_of(&self, record: &Value) -> Option<String> {
        self.value.project_id(record)
    }

    /// Display label of a target record
    ///
    /// Placeholder records built from display hints carry their label under
    /// [`HINT_LABEL_KEY`]; everything else goes through the label projection,
    /// falling back to the identifier.
    #[must_use]
    pub fn label_of(&self, record: &Value) -> String {
        if let Some(hint) = record.get(HINT_LABEL_KEY).and_then(Value::as_str) {
            return hint.to_string();
        }
        self.label
            .project(record)
            .or_else(|| self.id_of(record))
            .unwrap_or_default()
    }

    /// Key that holds the identifier in target records
    ///
    /// The value projection's path when it is a single segment, `id` otherwise.
    #[must_use]
    pub fn id_key(&self) -> &str {
        match self.value.as_path() {
            Some(path) if !path.contains('.') => path,
            _ => "id",
        }
    }

    /// Minimal record carrying only an identifier and a hint label
    #[must_use]
    pub fn placeholder(&self, id: &str, label: &str) -> Value {
        let mut record = Map::new();
        record.insert(self.id_key().to_string(), Value::String(id.to_string()));
        record.insert(HINT_LABEL_KEY.to_string(), Value::String(label.to_string()));
        Value::Object(record)
    }

    /// Whether a record is a hint placeholder
    #[inline]
    #[must_use]
    pub fn is_placeholder(record: &Value) -> bool {
        record.get(HINT_LABEL_KEY).is_some()
    }
}

impl fmt::Debug for ReferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceConfig")
            .field("endpoint", &self.endpoint)
            .field("label", &self.label)
            .field("value", &self.value)
            .field("allow_create", &self.allow_create)
            .field("target", &self.target.as_ref().map(|t| t.name()))
            .finish()
    }
}

/// Table column hint
#[derive(Debug, Clone)]
pub struct TableDisplay {
    /// Column header
    pub header: String,
    /// Dotted accessor path into the row (`bank.name`)
    pub path: String,
    /// Optional composite accessor, used instead of `path` when set
    pub accessor: Option<Projection>,
}

impl TableDisplay {
    /// Column reading `path`
    #[inline]
    #[must_use]
    pub fn new(header: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            path: path.into(),
            accessor: None,
        }
    }

    /// With composite accessor
    #[inline]
    #[must_use]
    pub fn with_accessor(mut self, accessor: Projection) -> Self {
        self.accessor = Some(accessor);
        self
    }

    /// Cell text for one row
    #[must_use]
    pub fn cell(&self, row: &Value) -> String {
        match &self.accessor {
            Some(accessor) => accessor.project(row).unwrap_or_default(),
            None => display_at(row, &self.path),
        }
    }
}

/// Declarative description of one entity attribute
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Identifier, unique within the entity
    pub name: String,
    /// Semantic kind
    pub kind: FieldKind,
    /// Whether a value must be present
    pub required: bool,
    /// Display label; defaults to the name
    pub label: Option<String>,
    /// Input placeholder
    pub placeholder: Option<String>,
    /// Help text shown with the control
    pub help_text: Option<String>,
    /// Section used for grouping
    pub section: Option<String>,
    /// Constraint set
    pub validation: Validation,
    /// Table column hint
    pub table_display: Option<TableDisplay>,
    /// Value used when a create form opens
    pub default: Option<Value>,
    /// Displayed only, never sent in mutations
    pub read_only: bool,
}

impl FieldDescriptor {
    /// Field of any kind
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            label: None,
            placeholder: None,
            help_text: None,
            section: None,
            validation: Validation::default(),
            table_display: None,
            default: None,
            read_only: false,
        }
    }

    /// Text field
    #[inline]
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Long text field
    #[inline]
    #[must_use]
    pub fn long_text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::LongText)
    }

    /// Markdown field
    #[inline]
    #[must_use]
    pub fn markdown(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Markdown)
    }

    /// Number field
    #[inline]
    #[must_use]
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    /// Boolean field
    #[inline]
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Date field
    #[inline]
    #[must_use]
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    /// Date-time field
    #[inline]
    #[must_use]
    pub fn date_time(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    /// Enum field
    #[inline]
    #[must_use]
    pub fn enumeration(name: impl Into<String>, options: Vec<EnumOption>) -> Self {
        Self::new(name, FieldKind::Enum(options))
    }

    /// Single reference field
    #[inline]
    #[must_use]
    pub fn reference(name: impl Into<String>, config: ReferenceConfig) -> Self {
        Self::new(name, FieldKind::Reference(config))
    }

    /// Reference list field
    #[inline]
    #[must_use]
    pub fn reference_list(name: impl Into<String>, config: ReferenceConfig) -> Self {
        Self::new(name, FieldKind::ReferenceList(config))
    }

    /// Nested object field
    #[inline]
    #[must_use]
    pub fn nested(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self::new(name, FieldKind::NestedObject(fields))
    }

    /// Mark required
    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// With label
    #[inline]
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// With placeholder
    #[inline]
    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// With help text
    #[inline]
    #[must_use]
    pub fn help_text(mut self, help: impl Into<String>) -> Self {
        self.help_text = Some(help.into());
        self
    }

    /// In section
    #[inline]
    #[must_use]
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// With validation
    #[inline]
    #[must_use]
    pub fn validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    /// Show as a table column reading this field
    ///
    /// Reference columns read the label path of the embedded relation object
    /// (`bank.name`) when the label projection is a path.
    #[must_use]
    pub fn column(mut self, header: impl Into<String>) -> Self {
        let path = match self.kind.reference_config().and_then(|c| c.label.as_path()) {
            Some(label_path) => format!("{}.{label_path}", self.name),
            None => self.name.clone(),
        };
        self.table_display = Some(TableDisplay::new(header, path));
        self
    }

    /// Show as a table column with an explicit hint
    #[inline]
    #[must_use]
    pub fn column_with(mut self, display: TableDisplay) -> Self {
        self.table_display = Some(display);
        self
    }

    /// With default value
    #[inline]
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Mark read-only
    #[inline]
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Label, or the name when no label is set
    #[inline]
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Value a create form starts with
    #[must_use]
    pub fn initial_value(&self) -> Value {
        self.default.clone().unwrap_or_else(|| self.kind.empty_value())
    }

    /// Validate a value for this field
    pub fn validate(&self, value: &Value) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.validate_into("", value, &mut errors);
        errors.into_result()
    }

    /// Validate a value, recording errors under `prefix.name`
    pub fn validate_into(&self, prefix: &str, value: &Value, errors: &mut ValidationErrors) {
        let key = if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{prefix}.{}", self.name)
        };

        if is_blank(value) {
            if self.required {
                errors.insert(key, format!("{} is required", self.display_label()));
            }
            return;
        }

        if let FieldKind::NestedObject(fields) = &self.kind {
            let Some(object) = value.as_object() else {
                errors.insert(key, "must be an object");
                return;
            };
            for field in fields {
                let nested = object.get(&field.name).unwrap_or(&Value::Null);
                field.validate_into(&key, nested, errors);
            }
            return;
        }

        if let Err(message) = check_kind(&self.kind, value) {
            errors.insert(key, message);
            return;
        }

        if let Err(message) = self.validation.check(value) {
            errors.insert(key, message);
        }
    }
}

fn check_kind(kind: &FieldKind, value: &Value) -> Result<(), String> {
    let ok = match kind {
        FieldKind::Text | FieldKind::LongText | FieldKind::Markdown => value.is_string(),
        FieldKind::Number => as_number(value).is_some(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::Date => value
            .as_str()
            .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        FieldKind::DateTime => value.as_str().is_some_and(parses_date_time),
        FieldKind::Enum(options) => value
            .as_str()
            .is_some_and(|s| options.iter().any(|o| o.value == s)),
        FieldKind::Reference(_) => identifier(value).is_some(),
        FieldKind::ReferenceList(_) => value
            .as_array()
            .is_some_and(|items| items.iter().all(|i| identifier(i).is_some())),
        FieldKind::NestedObject(_) => value.is_object(),
    };

    if ok {
        return Ok(());
    }
    Err(match kind {
        FieldKind::Text | FieldKind::LongText | FieldKind::Markdown => "must be text",
        FieldKind::Number => "must be a number",
        FieldKind::Boolean => "must be true or false",
        FieldKind::Date => "must be a date (YYYY-MM-DD)",
        FieldKind::DateTime => "must be a date and time",
        FieldKind::Enum(_) => "is not one of the allowed options",
        FieldKind::Reference(_) => "must reference a record",
        FieldKind::ReferenceList(_) => "must reference records",
        FieldKind::NestedObject(_) => "must be an object",
    }
    .to_string())
}

fn parses_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok()
}

pub(crate) fn default_object(fields: &[FieldDescriptor]) -> Map<String, Value> {
    fields
        .iter()
        .map(|f| (f.name.clone(), f.initial_value()))
        .collect()
}
