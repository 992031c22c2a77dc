//! Entity metadata
//!
//! [`EntityMetadata`] is the immutable, validated description of one record
//! type. It can only be obtained from [`EntityMetadataBuilder::build`] (or a
//! catalog), so every instance in the program satisfies the definition
//! invariants: unique field names, declared sections, well-formed rules.

use crate::error::MetadataError;
use crate::field::{default_object, FieldDescriptor, FieldKind, TableDisplay};
use crate::validation::DefinitionIssue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Remote operation an entity may allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Create new records
    Create,
    /// List and view records
    Read,
    /// Edit existing records
    Update,
    /// Delete records
    Delete,
}

impl Operation {
    /// All operations
    pub const ALL: [Operation; 4] = [Self::Create, Self::Read, Self::Update, Self::Delete];
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Validated description of one entity type
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    name: String,
    endpoint: String,
    operations: BTreeSet<Operation>,
    sections: Vec<String>,
    fields: Vec<FieldDescriptor>,
}

impl EntityMetadata {
    /// Start building metadata for an entity
    #[inline]
    #[must_use]
    pub fn builder(name: impl Into<String>, endpoint: impl Into<String>) -> EntityMetadataBuilder {
        EntityMetadataBuilder::new(name, endpoint)
    }

    /// Entity name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote endpoint (`/employeebankaccounts`)
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Endpoint of a single record
    #[must_use]
    pub fn record_endpoint(&self, id: &str) -> String {
        format!("{}/{id}", self.endpoint.trim_end_matches('/'))
    }

    /// Allowed operations
    #[inline]
    #[must_use]
    pub fn operations(&self) -> &BTreeSet<Operation> {
        &self.operations
    }

    /// Whether an operation is allowed
    #[inline]
    #[must_use]
    pub fn allows(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    /// Declared sections in order
    #[inline]
    #[must_use]
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Fields in declaration order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Reference and reference-list fields
    pub fn reference_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.kind.is_reference())
    }

    /// Fields grouped by section
    ///
    /// Sections come in declared order (empty sections omitted), followed by
    /// a `None` group of unsectioned fields when there are any.
    #[must_use]
    pub fn grouped_fields(&self) -> Vec<(Option<&str>, Vec<&FieldDescriptor>)> {
        let mut groups: Vec<(Option<&str>, Vec<&FieldDescriptor>)> = self
            .sections
            .iter()
            .map(|section| {
                let fields: Vec<&FieldDescriptor> = self
                    .fields
                    .iter()
                    .filter(|f| f.section.as_deref() == Some(section.as_str()))
                    .collect();
                (Some(section.as_str()), fields)
            })
            .filter(|(_, fields)| !fields.is_empty())
            .collect();

        let unsectioned: Vec<&FieldDescriptor> =
            self.fields.iter().filter(|f| f.section.is_none()).collect();
        if !unsectioned.is_empty() {
            groups.push((None, unsectioned));
        }
        groups
    }

    /// Table columns in field order
    pub fn columns(&self) -> impl Iterator<Item = (&FieldDescriptor, &TableDisplay)> {
        self.fields
            .iter()
            .filter_map(|f| f.table_display.as_ref().map(|d| (f, d)))
    }

    /// Values a create form starts with
    #[must_use]
    pub fn default_values(&self) -> Map<String, Value> {
        default_object(&self.fields)
    }
}

/// Builder for [`EntityMetadata`]
#[derive(Debug, Clone)]
pub struct EntityMetadataBuilder {
    name: String,
    endpoint: String,
    operations: Option<BTreeSet<Operation>>,
    sections: Vec<String>,
    fields: Vec<FieldDescriptor>,
}

impl EntityMetadataBuilder {
    /// New builder; all operations allowed unless restricted
    #[must_use]
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            operations: None,
            sections: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Restrict allowed operations
    #[must_use]
    pub fn operations(mut self, operations: impl IntoIterator<Item = Operation>) -> Self {
        self.operations = Some(operations.into_iter().collect());
        self
    }

    /// Declare a section
    #[must_use]
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.sections.push(section.into());
        self
    }

    /// Add a field
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Add several fields
    #[must_use]
    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Validate and freeze the metadata
    ///
    /// # Errors
    /// Any definition mistake, see [`MetadataError`].
    pub fn build(self) -> Result<EntityMetadata, MetadataError> {
        if self.name.trim().is_empty() {
            return Err(MetadataError::MissingName);
        }
        if self.endpoint.trim().is_empty() {
            return Err(MetadataError::MissingEndpoint { entity: self.name });
        }

        let mut seen_sections = HashSet::new();
        for section in &self.sections {
            if !seen_sections.insert(section.as_str()) {
                return Err(MetadataError::DuplicateSection {
                    entity: self.name.clone(),
                    section: section.clone(),
                });
            }
        }

        check_fields(&self.name, &self.fields)?;

        for field in &self.fields {
            if let Some(section) = &field.section {
                if !seen_sections.contains(section.as_str()) {
                    return Err(MetadataError::UnknownSection {
                        field: field.name.clone(),
                        section: section.clone(),
                    });
                }
            }
        }

        Ok(EntityMetadata {
            name: self.name,
            endpoint: self.endpoint,
            operations: self
                .operations
                .unwrap_or_else(|| Operation::ALL.into_iter().collect()),
            sections: self.sections,
            fields: self.fields,
        })
    }
}

fn check_fields(entity: &str, fields: &[FieldDescriptor]) -> Result<(), MetadataError> {
    let mut names = HashSet::new();
    for field in fields {
        if field.name.trim().is_empty() {
            return Err(MetadataError::EmptyFieldName {
                entity: entity.to_string(),
            });
        }
        if !names.insert(field.name.as_str()) {
            return Err(MetadataError::DuplicateField {
                entity: entity.to_string(),
                field: field.name.clone(),
            });
        }
        check_field(entity, field)?;
    }
    Ok(())
}

fn check_field(entity: &str, field: &FieldDescriptor) -> Result<(), MetadataError> {
    match field.validation.definition_issue() {
        Some(DefinitionIssue::InvalidPattern { pattern, reason }) => {
            return Err(MetadataError::InvalidPattern {
                field: field.name.clone(),
                pattern,
                reason,
            });
        }
        Some(DefinitionIssue::InvalidRange { min, max }) => {
            return Err(MetadataError::InvalidRange {
                field: field.name.clone(),
                min,
                max,
            });
        }
        None => {}
    }

    match &field.kind {
        FieldKind::Enum(options) if options.is_empty() => Err(MetadataError::EmptyEnum {
            field: field.name.clone(),
        }),
        FieldKind::Reference(config) | FieldKind::ReferenceList(config) => {
            if config.endpoint.trim().is_empty() {
                Err(MetadataError::MissingReferenceEndpoint {
                    field: field.name.clone(),
                })
            } else if config.allow_create && config.target.is_none() {
                Err(MetadataError::MissingCreateTarget {
                    field: field.name.clone(),
                })
            } else {
                Ok(())
            }
        }
        FieldKind::NestedObject(nested) => check_fields(&format!("{entity}.{}", field.name), nested),
        _ => Ok(()),
    }
}
