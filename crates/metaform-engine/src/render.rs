//! Generic field renderer
//!
//! Rendering is headless: a [`FieldDescriptor`] plus its current value and a
//! [`Mode`] become a [`RenderedField`], a plain-data control description that
//! a host UI paints. Dispatch is an exhaustive match on [`FieldKind`], so a
//! new kind cannot be added without deciding how it renders.

use crate::error::EngineError;
use crate::state::FormMode;
use metaform_meta::path::display_string;
use metaform_meta::{EnumOption, FieldDescriptor, FieldKind, ValidationErrors};
use metaform_resolve::ReferenceField;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Whether controls accept input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Editable controls
    Edit,
    /// Read-only display text
    View,
}

/// Option of a reference picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionItem {
    /// Normalized identifier
    pub id: String,
    /// Display label
    pub label: String,
}

/// Reference picker state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencePicker {
    /// Whether several records can be selected
    pub multiple: bool,
    /// Selected records that could be resolved, in value order
    pub selected: Vec<OptionItem>,
    /// Options to offer (fetched options plus the selection)
    pub options: Vec<OptionItem>,
    /// Current search text
    pub query: String,
    /// Whether a search is pending
    pub loading: bool,
    /// Last search error
    pub search_error: Option<String>,
    /// Whether inline creation of a target record is offered
    pub can_create: bool,
}

/// Concrete control for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Control {
    /// Single- or multi-line text input
    TextInput {
        /// Current text
        value: String,
        /// Multi-line editor
        multiline: bool,
        /// Markdown editor
        markdown: bool,
    },
    /// Numeric input
    NumberInput {
        /// Current text
        value: String,
    },
    /// Checkbox
    Checkbox {
        /// Current state
        checked: bool,
    },
    /// Date or date-time picker
    DateInput {
        /// Current text
        value: String,
        /// Includes a time part
        with_time: bool,
    },
    /// Fixed option select
    Select {
        /// Selected option value
        value: Option<String>,
        /// Available options
        options: Vec<EnumOption>,
    },
    /// Search-driven reference picker
    Reference(ReferencePicker),
    /// Nested object fields
    Group {
        /// Rendered nested fields
        fields: Vec<RenderedField>,
    },
    /// Read-only text
    Display {
        /// Text to show
        text: String,
    },
}

/// One rendered field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedField {
    /// Field path (`address.city` for nested fields)
    pub name: String,
    /// Label
    pub label: String,
    /// Input placeholder
    pub placeholder: Option<String>,
    /// Help text
    pub help_text: Option<String>,
    /// Whether a value is required
    pub required: bool,
    /// Validation error attached to this field
    pub error: Option<String>,
    /// Control to paint
    pub control: Control,
}

/// Fields of one section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSection {
    /// Section title, `None` for fields outside any section
    pub title: Option<String>,
    /// Fields in declaration order
    pub fields: Vec<RenderedField>,
}

/// Fully rendered form
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedForm {
    /// Form instance identifier
    pub instance: String,
    /// Entity name
    pub entity: String,
    /// Purpose the form was opened for
    pub mode: FormMode,
    /// Whether a mutation is in flight
    pub submitting: bool,
    /// Sections in order
    pub sections: Vec<RenderedSection>,
    /// Form-level error (failed mutation)
    pub form_error: Option<String>,
    /// Nested create form for a reference field, when open
    pub inline: Option<Box<RenderedForm>>,
    /// Reference field the nested create form fills
    pub inline_field: Option<String>,
}

impl RenderedForm {
    /// Find a rendered field by path
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&RenderedField> {
        fn find<'a>(fields: &'a [RenderedField], name: &str) -> Option<&'a RenderedField> {
            fields.iter().find_map(|field| {
                if field.name == name {
                    return Some(field);
                }
                match &field.control {
                    Control::Group { fields } => find(fields, name),
                    _ => None,
                }
            })
        }
        self.sections.iter().find_map(|section| find(&section.fields, name))
    }
}

/// Renders fields against the runtime state of one form
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    bindings: &'a HashMap<String, ReferenceField>,
    errors: &'a ValidationErrors,
}

impl<'a> Renderer<'a> {
    /// Renderer using reference bindings keyed by field path
    #[must_use]
    pub fn new(bindings: &'a HashMap<String, ReferenceField>, errors: &'a ValidationErrors) -> Self {
        Self { bindings, errors }
    }

    /// Render a top-level field
    ///
    /// # Errors
    /// [`EngineError::Configuration`] when a reference field has no binding.
    pub fn render(
        &self,
        field: &FieldDescriptor,
        value: &Value,
        mode: Mode,
    ) -> Result<RenderedField, EngineError> {
        self.render_at("", field, value, mode)
    }

    fn render_at(
        &self,
        prefix: &str,
        field: &FieldDescriptor,
        value: &Value,
        mode: Mode,
    ) -> Result<RenderedField, EngineError> {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };
        let mode = if field.read_only { Mode::View } else { mode };
        let control = self.control(&path, field, value, mode)?;

        Ok(RenderedField {
            label: field.display_label().to_string(),
            placeholder: field.placeholder.clone(),
            help_text: field.help_text.clone(),
            required: field.required,
            error: self.errors.get(&path).map(str::to_string),
            control,
            name: path,
        })
    }

    fn control(
        &self,
        path: &str,
        field: &FieldDescriptor,
        value: &Value,
        mode: Mode,
    ) -> Result<Control, EngineError> {
        let control = match (&field.kind, mode) {
            (FieldKind::Text, Mode::Edit) => text_input(value, false, false),
            (FieldKind::LongText, Mode::Edit) => text_input(value, true, false),
            (FieldKind::Markdown, Mode::Edit) => text_input(value, true, true),
            (FieldKind::Number, Mode::Edit) => Control::NumberInput {
                value: display_string(value),
            },
            (FieldKind::Boolean, Mode::Edit) => Control::Checkbox {
                checked: value.as_bool().unwrap_or(false),
            },
            (FieldKind::Date, Mode::Edit) => Control::DateInput {
                value: display_string(value),
                with_time: false,
            },
            (FieldKind::DateTime, Mode::Edit) => Control::DateInput {
                value: display_string(value),
                with_time: true,
            },
            (FieldKind::Enum(options), Mode::Edit) => Control::Select {
                value: value.as_str().map(str::to_string),
                options: options.clone(),
            },
            (FieldKind::Reference(_) | FieldKind::ReferenceList(_), Mode::Edit) => {
                Control::Reference(picker(self.binding(path)?, value))
            }
            (FieldKind::Reference(_) | FieldKind::ReferenceList(_), Mode::View) => Control::Display {
                text: self.binding(path)?.labels(value).join(", "),
            },
            (FieldKind::NestedObject(fields), mode) => Control::Group {
                fields: fields
                    .iter()
                    .map(|nested| {
                        let nested_value = value.get(&nested.name).unwrap_or(&Value::Null);
                        self.render_at(path, nested, nested_value, mode)
                    })
                    .collect::<Result<_, _>>()?,
            },
            (FieldKind::Boolean, Mode::View) => Control::Display {
                text: match value.as_bool() {
                    Some(true) => "Yes".to_string(),
                    Some(false) => "No".to_string(),
                    None => String::new(),
                },
            },
            (FieldKind::Enum(options), Mode::View) => Control::Display {
                text: value
                    .as_str()
                    .and_then(|v| options.iter().find(|o| o.value == v))
                    .map_or_else(|| display_string(value), |o| o.label.clone()),
            },
            (
                FieldKind::Text
                | FieldKind::LongText
                | FieldKind::Markdown
                | FieldKind::Number
                | FieldKind::Date
                | FieldKind::DateTime,
                Mode::View,
            ) => Control::Display {
                text: display_string(value),
            },
        };
        Ok(control)
    }

    fn binding(&self, path: &str) -> Result<&ReferenceField, EngineError> {
        self.bindings.get(path).ok_or_else(|| {
            EngineError::configuration(format!("reference field '{path}' has no runtime binding"))
        })
    }
}

fn text_input(value: &Value, multiline: bool, markdown: bool) -> Control {
    Control::TextInput {
        value: display_string(value),
        multiline,
        markdown,
    }
}

fn picker(binding: &ReferenceField, value: &Value) -> ReferencePicker {
    let config = binding.config();
    let items = |records: Vec<Value>| -> Vec<OptionItem> {
        records
            .iter()
            .filter_map(|record| {
                config.id_of(record).map(|id| OptionItem {
                    id,
                    label: config.label_of(record),
                })
            })
            .collect()
    };
    let resolver = binding.resolver();

    ReferencePicker {
        multiple: binding.is_multiple(),
        selected: items(binding.resolve(value)),
        options: items(binding.offered(value)),
        query: resolver.query(),
        loading: resolver.is_loading(),
        search_error: resolver.last_error().map(|e| e.to_string()),
        can_create: config.allow_create && config.target.is_some(),
    }
}
