//! Form instances
//!
//! A [`Form`] is one opening of one entity's form: its record, the runtime
//! bindings of its reference fields (keyed by field path, so references
//! inside nested objects get their own), field-scoped errors and an optional
//! nested create form for a reference target.
//!
//! Each form carries a fresh [`Ulid`] so asynchronous results can tell
//! whether the form they were started for is still the one on screen.

use crate::error::EngineError;
use crate::record::{FormRecord, RelationSeed};
use crate::render::{Mode, RenderedForm, RenderedSection, Renderer};
use crate::state::FormMode;
use metaform_meta::{EntityMetadata, FieldDescriptor, FieldKind, ValidationErrors};
use metaform_resolve::{DisplayHint, ReferenceField, ResolverConfig};
use metaform_transport::Transport;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use ulid::Ulid;

/// Hook notified when field values change
///
/// Listeners may derive other values from the change through the mutable
/// record. Both methods default to no-ops.
pub trait FieldListener: Send + Sync {
    /// A field value changed (typed or selected)
    fn on_change(&self, _field: &str, _value: &Value, _record: &mut FormRecord) {}

    /// A reference option was selected
    fn on_select(&self, _field: &str, _selected: &Value) {}
}

/// Nested create form for a reference field's target entity
#[derive(Debug)]
pub struct InlineCreate {
    field: String,
    form: Box<Form>,
    submitting: bool,
}

impl InlineCreate {
    /// Reference field that receives the created record
    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    #[must_use]
    pub fn form(&self) -> &Form {
        &self.form
    }

    #[inline]
    pub fn form_mut(&mut self) -> &mut Form {
        &mut self.form
    }

    #[inline]
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub(crate) fn set_submitting(&mut self, submitting: bool) {
        self.submitting = submitting;
    }
}

/// One open form
pub struct Form {
    instance: Ulid,
    meta: Arc<EntityMetadata>,
    mode: FormMode,
    record: FormRecord,
    bindings: HashMap<String, ReferenceField>,
    errors: ValidationErrors,
    form_error: Option<String>,
    inline: Option<InlineCreate>,
    transport: Arc<dyn Transport>,
    resolver_config: ResolverConfig,
}

impl Form {
    /// Open a form over `record`, binding every reference field
    #[must_use]
    pub fn open(
        meta: Arc<EntityMetadata>,
        mode: FormMode,
        record: FormRecord,
        transport: Arc<dyn Transport>,
        resolver_config: ResolverConfig,
    ) -> Self {
        let mut bindings = HashMap::new();
        bind_fields(meta.fields(), "", &transport, &resolver_config, &mut bindings);
        let instance = Ulid::new();
        debug!(entity = meta.name(), %instance, ?mode, references = bindings.len(), "form opened");

        Self {
            instance,
            meta,
            mode,
            record,
            bindings,
            errors: ValidationErrors::new(),
            form_error: None,
            inline: None,
            transport,
            resolver_config,
        }
    }

    #[inline]
    #[must_use]
    pub fn instance(&self) -> Ulid {
        self.instance
    }

    #[inline]
    #[must_use]
    pub fn meta(&self) -> &Arc<EntityMetadata> {
        &self.meta
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> FormMode {
        self.mode
    }

    #[inline]
    #[must_use]
    pub fn record(&self) -> &FormRecord {
        &self.record
    }

    #[inline]
    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    #[inline]
    #[must_use]
    pub fn form_error(&self) -> Option<&str> {
        self.form_error.as_deref()
    }

    pub fn set_form_error(&mut self, message: Option<String>) {
        self.form_error = message;
    }

    /// Switch a view form to editing, keeping bindings and caches
    pub(crate) fn promote_to_edit(&mut self) {
        self.mode = FormMode::Edit;
    }

    /// Runtime binding of a reference field
    ///
    /// # Errors
    /// [`EngineError::UnknownField`] when `path` names no reference field.
    pub fn binding(&self, path: &str) -> Result<&ReferenceField, EngineError> {
        self.bindings
            .get(path)
            .ok_or_else(|| EngineError::UnknownField(path.to_string()))
    }

    /// Descriptor at a dotted path
    #[must_use]
    pub fn descriptor(&self, path: &str) -> Option<&FieldDescriptor> {
        let mut segments = path.split('.');
        let mut field = self.meta.field(segments.next()?)?;
        for name in segments {
            let FieldKind::NestedObject(nested) = &field.kind else {
                return None;
            };
            field = nested.iter().find(|f| f.name == name)?;
        }
        Some(field)
    }

    /// Write embedded relation records into their fields' caches
    pub fn seed(&self, seeds: &[RelationSeed]) {
        for seed in seeds {
            if let Some(binding) = self.bindings.get(&seed.field) {
                let written = binding.seed(&seed.records);
                debug!(field = %seed.field, written, "reference cache seeded");
            }
        }
    }

    /// Register display hints for a reference field
    ///
    /// # Errors
    /// [`EngineError::UnknownField`] when `path` names no reference field.
    pub fn add_hints(&mut self, path: &str, hints: Vec<DisplayHint>) -> Result<(), EngineError> {
        let binding = self
            .bindings
            .get_mut(path)
            .ok_or_else(|| EngineError::UnknownField(path.to_string()))?;
        binding.add_hints(hints);
        Ok(())
    }

    /// Change a field value
    ///
    /// Clears the field's validation error and notifies listeners.
    ///
    /// # Errors
    /// - [`EngineError::UnknownField`] for paths outside the entity
    /// - [`EngineError::Configuration`] for read-only fields
    pub fn set_value(
        &mut self,
        path: &str,
        value: Value,
        listeners: &[Arc<dyn FieldListener>],
    ) -> Result<(), EngineError> {
        let field = self
            .descriptor(path)
            .ok_or_else(|| EngineError::UnknownField(path.to_string()))?;
        if field.read_only {
            return Err(EngineError::configuration(format!("field '{path}' is read-only")));
        }
        self.record.set_path(path, value);
        self.errors.clear_field(path);

        let current = self.record.get_path(path).clone();
        for listener in listeners {
            listener.on_change(path, &current, &mut self.record);
        }
        Ok(())
    }

    /// Select a reference option
    ///
    /// The record enters the field's cache before the value changes, so the
    /// selection is displayable immediately.
    ///
    /// # Errors
    /// [`EngineError::Configuration`] when the record has no identifier.
    pub fn select(
        &mut self,
        path: &str,
        selected: &Value,
        listeners: &[Arc<dyn FieldListener>],
    ) -> Result<Value, EngineError> {
        let binding = self.binding(path)?;
        let value = binding
            .select(self.record.get_path(path), selected)
            .ok_or_else(|| {
                EngineError::configuration(format!("selected record for '{path}' has no identifier"))
            })?;
        for listener in listeners {
            listener.on_select(path, selected);
        }
        self.set_value(path, value.clone(), listeners)?;
        Ok(value)
    }

    /// Remove an identifier from a reference field
    ///
    /// # Errors
    /// [`EngineError::UnknownField`] when `path` names no reference field.
    pub fn deselect(
        &mut self,
        path: &str,
        id: &str,
        listeners: &[Arc<dyn FieldListener>],
    ) -> Result<(), EngineError> {
        let value = self.binding(path)?.deselect(self.record.get_path(path), id);
        self.set_value(path, value, listeners)
    }

    /// Validate the whole record, keeping the errors for display
    ///
    /// # Errors
    /// [`EngineError::Validation`] with every field-scoped error.
    pub fn validate(&mut self) -> Result<(), EngineError> {
        match self.record.validate(&self.meta) {
            Ok(()) => {
                self.errors = ValidationErrors::new();
                Ok(())
            }
            Err(errors) => {
                self.errors = errors.clone();
                Err(EngineError::Validation(errors))
            }
        }
    }

    /// Mutation body for the current record
    #[must_use]
    pub fn payload(&self) -> Value {
        self.record.to_payload(&self.meta)
    }

    /// Render every section
    ///
    /// # Errors
    /// [`EngineError::Configuration`] when a reference field lacks a binding.
    pub fn render(&self, submitting: bool) -> Result<RenderedForm, EngineError> {
        let mode = if self.mode == FormMode::View { Mode::View } else { Mode::Edit };
        let renderer = Renderer::new(&self.bindings, &self.errors);

        let sections = self
            .meta
            .grouped_fields()
            .into_iter()
            .map(|(title, fields)| -> Result<RenderedSection, EngineError> {
                let fields = fields
                    .into_iter()
                    .map(|field| renderer.render(field, self.record.get(&field.name), mode))
                    .collect::<Result<_, _>>()?;
                Ok(RenderedSection {
                    title: title.map(str::to_string),
                    fields,
                })
            })
            .collect::<Result<_, _>>()?;

        let inline = match &self.inline {
            Some(inline) => Some(Box::new(inline.form.render(inline.submitting)?)),
            None => None,
        };

        Ok(RenderedForm {
            instance: self.instance.to_string(),
            entity: self.meta.name().to_string(),
            mode: self.mode,
            submitting,
            sections,
            form_error: self.form_error.clone(),
            inline,
            inline_field: self.inline.as_ref().map(|i| i.field.clone()),
        })
    }

    /// Open a nested create form for a reference field's target
    ///
    /// # Errors
    /// - [`EngineError::UnknownField`] when `path` names no reference field
    /// - [`EngineError::Configuration`] when the field does not allow creation
    pub fn begin_inline(&mut self, path: &str) -> Result<&mut InlineCreate, EngineError> {
        let config = self.binding(path)?.config();
        let target = match (&config.target, config.allow_create) {
            (Some(target), true) => Arc::clone(target),
            _ => {
                return Err(EngineError::configuration(format!(
                    "field '{path}' does not allow creating records"
                )))
            }
        };
        if let Some(previous) = self.inline.take() {
            previous.form.close();
        }
        let record = FormRecord::new(&target);
        let form = Form::open(
            target,
            FormMode::Create,
            record,
            Arc::clone(&self.transport),
            self.resolver_config.clone(),
        );
        Ok(self.inline.insert(InlineCreate {
            field: path.to_string(),
            form: Box::new(form),
            submitting: false,
        }))
    }

    #[inline]
    #[must_use]
    pub fn inline(&self) -> Option<&InlineCreate> {
        self.inline.as_ref()
    }

    #[inline]
    pub fn inline_mut(&mut self) -> Option<&mut InlineCreate> {
        self.inline.as_mut()
    }

    /// Discard the nested create form
    pub fn cancel_inline(&mut self) -> bool {
        match self.inline.take() {
            Some(inline) => {
                inline.form.close();
                true
            }
            None => false,
        }
    }

    /// Whether `created` carries an identifier under the inline field's value projection
    #[must_use]
    pub fn inline_identifies(&self, created: &Value) -> bool {
        self.inline
            .as_ref()
            .and_then(|inline| self.bindings.get(&inline.field))
            .and_then(|binding| binding.config().id_of(created))
            .is_some()
    }

    /// Close the nested create form, selecting the record it created
    ///
    /// # Errors
    /// [`EngineError::Configuration`] when the record has no identifier.
    pub fn finish_inline(
        &mut self,
        created: &Value,
        listeners: &[Arc<dyn FieldListener>],
    ) -> Result<Value, EngineError> {
        let Some(inline) = self.inline.take() else {
            return Err(EngineError::NoOpenForm);
        };
        inline.form.close();
        self.select(&inline.field, created, listeners)
    }

    /// Stop every option resolver of this form (and its nested form)
    pub fn close(&self) {
        for binding in self.bindings.values() {
            binding.resolver().close();
        }
        if let Some(inline) = &self.inline {
            inline.form.close();
        }
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("instance", &self.instance)
            .field("entity", &self.meta.name())
            .field("mode", &self.mode)
            .field("record", &self.record)
            .field("errors", &self.errors)
            .field("form_error", &self.form_error)
            .field("inline", &self.inline)
            .finish_non_exhaustive()
    }
}

fn bind_fields(
    fields: &[FieldDescriptor],
    prefix: &str,
    transport: &Arc<dyn Transport>,
    config: &ResolverConfig,
    out: &mut HashMap<String, ReferenceField>,
) {
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };
        match &field.kind {
            FieldKind::Reference(reference) | FieldKind::ReferenceList(reference) => {
                let binding = ReferenceField::new(
                    path.clone(),
                    reference.clone(),
                    field.kind.is_multiple(),
                    Arc::clone(transport),
                    config.clone(),
                );
                out.insert(path, binding);
            }
            FieldKind::NestedObject(nested) => bind_fields(nested, &path, transport, config, out),
            _ => {}
        }
    }
}
