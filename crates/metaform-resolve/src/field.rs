//! Runtime binding of one reference field
//!
//! A [`ReferenceField`] bundles everything a reference control needs inside
//! one open form: its configuration, its private cache, the display hints it
//! was opened with and its option resolver.

use crate::cache::ReferenceCache;
use crate::reconcile::{
    id_value, offered_options, resolve_many, resolve_single, DisplayHint, HintMap,
};
use crate::resolver::{OptionResolver, ResolverConfig};
use metaform_meta::path::identifier;
use metaform_meta::{FieldDescriptor, ReferenceConfig};
use metaform_transport::Transport;
use serde_json::Value;
use std::sync::Arc;

/// Reference control state owned by one form instance
#[derive(Debug)]
pub struct ReferenceField {
    name: String,
    multiple: bool,
    hints: HintMap,
    resolver: OptionResolver,
}

impl ReferenceField {
    /// Binding with a fresh cache
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        reference: ReferenceConfig,
        multiple: bool,
        transport: Arc<dyn Transport>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            name: name.into(),
            multiple,
            hints: HintMap::new(),
            resolver: OptionResolver::new(reference, transport, ReferenceCache::new(), config),
        }
    }

    /// Binding for a reference or reference-list descriptor
    #[must_use]
    pub fn from_descriptor(
        field: &FieldDescriptor,
        transport: Arc<dyn Transport>,
        config: ResolverConfig,
    ) -> Option<Self> {
        let reference = field.kind.reference_config()?.clone();
        Some(Self::new(
            field.name.clone(),
            reference,
            field.kind.is_multiple(),
            transport,
            config,
        ))
    }

    /// Field name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the field holds an identifier list
    #[inline]
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// Reference configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ReferenceConfig {
        self.resolver.reference()
    }

    /// Private cache of this field
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ReferenceCache {
        self.resolver.cache()
    }

    /// Option resolver of this field
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &OptionResolver {
        &self.resolver
    }

    /// Register initial display hints
    pub fn add_hints(&mut self, hints: impl IntoIterator<Item = DisplayHint>) {
        self.hints
            .extend(hints.into_iter().map(|hint| (hint.id, hint.label)));
    }

    /// Write full records into the cache (embedded relations, created records)
    pub fn seed<'a>(&self, records: impl IntoIterator<Item = &'a Value>) -> usize {
        self.cache().insert_records(self.config(), records)
    }

    /// Records to display for the current value, in order
    #[must_use]
    pub fn resolve(&self, value: &Value) -> Vec<Value> {
        if self.multiple {
            resolve_many(self.config(), self.cache(), &self.hints, value)
        } else {
            resolve_single(self.config(), self.cache(), &self.hints, value)
                .into_iter()
                .collect()
        }
    }

    /// Labels to display for the current value, in order
    #[must_use]
    pub fn labels(&self, value: &Value) -> Vec<String> {
        self.resolve(value)
            .iter()
            .map(|record| self.config().label_of(record))
            .collect()
    }

    /// Options to offer: fetched options plus the current selection
    #[must_use]
    pub fn offered(&self, value: &Value) -> Vec<Value> {
        offered_options(self.config(), &self.resolver.options(), &self.resolve(value))
    }

    /// Select a record, returning the new field value
    ///
    /// The record is written into the cache before the value changes. Lists
    /// append unless the identifier is already selected. Records without an
    /// identifier leave the value unchanged and return `None`.
    #[must_use]
    pub fn select(&self, current: &Value, record: &Value) -> Option<Value> {
        let id = self.config().id_of(record)?;
        let raw = id_value(self.config(), record).unwrap_or_else(|| Value::String(id.clone()));
        self.cache().insert(id.clone(), record.clone());

        if !self.multiple {
            return Some(raw);
        }
        let mut items = current.as_array().cloned().unwrap_or_default();
        if !items.iter().any(|item| identifier(item).as_deref() == Some(id.as_str())) {
            items.push(raw);
        }
        Some(Value::Array(items))
    }

    /// Remove an identifier from the value, returning the new field value
    #[must_use]
    pub fn deselect(&self, current: &Value, id: &str) -> Value {
        if !self.multiple {
            return match identifier(current) {
                Some(existing) if existing == id => Value::Null,
                _ => current.clone(),
            };
        }
        let items = current
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| identifier(item).as_deref() != Some(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Value::Array(items)
    }
}
