//! Form records
//!
//! A [`FormRecord`] holds the values of the entity being created or edited.
//! Relational fields hold bare identifiers (or identifier lists); embedded
//! relation objects only exist transiently, in reference caches.

use metaform_meta::path::{identifier, is_blank};
use metaform_meta::{EntityMetadata, FieldDescriptor, FieldKind, ReferenceConfig};
use metaform_resolve::id_value;
use serde_json::{Map, Value};

/// Records embedded in a fetched record, keyed by the field that held them
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSeed {
    /// Reference field path (`bank`, `office.site`)
    pub field: String,
    /// Full target records
    pub records: Vec<Value>,
}

/// Values of one entity instance inside an open form
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormRecord {
    id: Option<String>,
    values: Map<String, Value>,
}

impl FormRecord {
    /// Fresh record with each field's default
    #[must_use]
    pub fn new(meta: &EntityMetadata) -> Self {
        Self {
            id: None,
            values: meta.default_values(),
        }
    }

    /// Fresh record with defaults overridden by `initial`
    ///
    /// Keys that are not fields of the entity are ignored.
    #[must_use]
    pub fn with_values(meta: &EntityMetadata, initial: &Map<String, Value>) -> Self {
        let mut record = Self::new(meta);
        for (name, value) in initial {
            if meta.field(name).is_some() {
                record.values.insert(name.clone(), value.clone());
            }
        }
        record
    }

    /// Record hydrated from a fetched entity
    ///
    /// Embedded relation objects (`bank: {id, name}`) are flattened to their
    /// identifiers and returned as cache seeds, keyed by dotted path for
    /// references inside nested objects (`office.site`).
    #[must_use]
    pub fn hydrate(meta: &EntityMetadata, fetched: &Value) -> (Self, Vec<RelationSeed>) {
        let id = fetched.get("id").and_then(identifier);
        let mut seeds = Vec::new();
        let values = hydrate_object(meta.fields(), "", fetched, &mut seeds);
        (Self { id, values }, seeds)
    }

    /// Identifier of the record being edited
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Value of a field (`Null` when unset)
    #[must_use]
    pub fn get(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&Value::Null)
    }

    /// Replace the value of a field
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Value at a dotted path (`address.city`), `Null` when absent
    #[must_use]
    pub fn get_path(&self, path: &str) -> &Value {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        segments
            .try_fold(self.get(first), |value, key| value.get(key))
            .unwrap_or(&Value::Null)
    }

    /// Replace the value at a dotted path, creating intermediate objects
    pub fn set_path(&mut self, path: &str, value: Value) {
        let Some((head, rest)) = path.split_once('.') else {
            self.set(path, value);
            return;
        };
        let mut slot = self
            .values
            .entry(head.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        for key in rest.split('.') {
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Some(map) = slot.as_object_mut() else { return };
            slot = map.entry(key.to_string()).or_insert(Value::Null);
        }
        *slot = value;
    }

    /// All values
    #[inline]
    #[must_use]
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Validate every field, collecting field-scoped errors
    pub fn validate(&self, meta: &EntityMetadata) -> Result<(), metaform_meta::ValidationErrors> {
        let mut errors = metaform_meta::ValidationErrors::new();
        for field in meta.fields() {
            field.validate_into("", self.get(&field.name), &mut errors);
        }
        errors.into_result()
    }

    /// Mutation body: editable fields, relations as `{ id }` / `[{ id }]`
    #[must_use]
    pub fn to_payload(&self, meta: &EntityMetadata) -> Value {
        Value::Object(payload_object(meta.fields(), &self.values))
    }
}

fn hydrate_object(
    fields: &[FieldDescriptor],
    prefix: &str,
    fetched: &Value,
    seeds: &mut Vec<RelationSeed>,
) -> Map<String, Value> {
    let mut values = Map::new();
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };
        let raw = fetched.get(&field.name).cloned().unwrap_or(Value::Null);
        let value = match &field.kind {
            FieldKind::Reference(config) => {
                let (value, records) = flatten_single(config, raw);
                push_seed(seeds, path, records);
                value
            }
            FieldKind::ReferenceList(config) => {
                let (value, records) = flatten_list(config, raw);
                push_seed(seeds, path, records);
                value
            }
            FieldKind::NestedObject(nested) if raw.is_object() => {
                Value::Object(hydrate_object(nested, &path, &raw, seeds))
            }
            _ if raw.is_null() => field.kind.empty_value(),
            _ => raw,
        };
        values.insert(field.name.clone(), value);
    }
    values
}

fn push_seed(seeds: &mut Vec<RelationSeed>, field: String, records: Vec<Value>) {
    if !records.is_empty() {
        seeds.push(RelationSeed { field, records });
    }
}

fn flatten_single(config: &ReferenceConfig, raw: Value) -> (Value, Vec<Value>) {
    match raw {
        Value::Object(_) => match id_value(config, &raw) {
            Some(id) => (id, vec![raw]),
            None => (Value::Null, Vec::new()),
        },
        scalar if identifier(&scalar).is_some() => (scalar, Vec::new()),
        _ => (Value::Null, Vec::new()),
    }
}

fn flatten_list(config: &ReferenceConfig, raw: Value) -> (Value, Vec<Value>) {
    let Value::Array(items) = raw else {
        return (Value::Array(Vec::new()), Vec::new());
    };
    let mut ids = Vec::with_capacity(items.len());
    let mut records = Vec::new();
    for item in items {
        let (id, mut embedded) = flatten_single(config, item);
        if !id.is_null() {
            ids.push(id);
            records.append(&mut embedded);
        }
    }
    (Value::Array(ids), records)
}

fn payload_object(fields: &[FieldDescriptor], values: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter(|field| !field.read_only)
        .map(|field| {
            let value = values.get(&field.name).unwrap_or(&Value::Null);
            (field.name.clone(), payload_value(field, value))
        })
        .collect()
}

fn payload_value(field: &FieldDescriptor, value: &Value) -> Value {
    match &field.kind {
        FieldKind::Reference(config) => reference_object(config, value).unwrap_or(Value::Null),
        FieldKind::ReferenceList(config) => Value::Array(
            value
                .as_array()
                .map(|ids| ids.iter().filter_map(|id| reference_object(config, id)).collect())
                .unwrap_or_default(),
        ),
        FieldKind::NestedObject(nested) => match value {
            Value::Object(map) => Value::Object(payload_object(nested, map)),
            other => other.clone(),
        },
        _ => value.clone(),
    }
}

fn reference_object(config: &ReferenceConfig, id: &Value) -> Option<Value> {
    if is_blank(id) || identifier(id).is_none() {
        return None;
    }
    let mut object = Map::new();
    object.insert(config.id_key().to_string(), id.clone());
    Some(Value::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaform_test_utils::{bank_account, project};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn employee() -> EntityMetadata {
        let site = ReferenceConfig::new("/sites");
        EntityMetadata::builder("Employee", "/employees")
            .field(FieldDescriptor::text("name"))
            .field(FieldDescriptor::nested(
                "office",
                vec![
                    FieldDescriptor::number("floor"),
                    FieldDescriptor::reference("site", site),
                ],
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn new_record_uses_defaults() {
        let meta = bank_account();
        let record = FormRecord::new(&meta);
        assert_eq!(record.get("type"), &json!("SAVINGS"));
        assert_eq!(record.get("primary"), &json!(false));
        assert_eq!(record.get("bank"), &Value::Null);
        assert_eq!(record.id(), None);
    }

    #[test]
    fn initial_values_override_known_fields_only() {
        let meta = bank_account();
        let initial = json!({"accountNumber": "1234", "bogus": 1});
        let record = FormRecord::with_values(&meta, initial.as_object().unwrap());
        assert_eq!(record.get("accountNumber"), &json!("1234"));
        assert!(!record.values().contains_key("bogus"));
    }

    #[test]
    fn hydrate_flattens_relations() {
        let meta = project();
        let fetched = json!({
            "id": 5,
            "title": "Apollo",
            "members": [{"id": 1, "firstName": "Ada", "lastName": "Lovelace"}, 2],
            "createdAt": "2024-01-01"
        });
        let (record, seeds) = FormRecord::hydrate(&meta, &fetched);
        assert_eq!(record.id(), Some("5"));
        assert_eq!(record.get("members"), &json!([1, 2]));
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].field, "members");
        assert_eq!(seeds[0].records.len(), 1);
    }

    #[test]
    fn hydrate_single_reference_object() {
        let meta = bank_account();
        let fetched = json!({
            "id": "a1",
            "accountNumber": "12345",
            "bank": {"id": "b1", "name": "Commercial Bank"}
        });
        let (record, seeds) = FormRecord::hydrate(&meta, &fetched);
        assert_eq!(record.get("bank"), &json!("b1"));
        assert_eq!(record.get("primary"), &json!(false));
        assert_eq!(seeds[0].records[0]["name"], "Commercial Bank");
    }

    #[test]
    fn hydrate_flattens_references_inside_nested_objects() {
        let meta = employee();
        let fetched = json!({
            "id": "e1",
            "name": "Ada",
            "office": {"floor": 3, "site": {"id": "s1", "name": "HQ"}}
        });
        let (record, seeds) = FormRecord::hydrate(&meta, &fetched);
        assert_eq!(record.get_path("office.site"), &json!("s1"));
        assert_eq!(record.get_path("office.floor"), &json!(3));
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].field, "office.site");
        assert_eq!(seeds[0].records[0]["name"], "HQ");
        assert_eq!(
            record.to_payload(&meta),
            json!({"name": "Ada", "office": {"floor": 3, "site": {"id": "s1"}}})
        );
    }

    #[test]
    fn payload_wraps_relations_and_skips_read_only() {
        let meta = project();
        let mut record = FormRecord::new(&meta);
        record.set("title", json!("Apollo"));
        record.set("members", json!([1, "2"]));
        record.set("createdAt", json!("2024-01-01"));
        assert_eq!(
            record.to_payload(&meta),
            json!({"title": "Apollo", "members": [{"id": 1}, {"id": "2"}]})
        );
    }

    #[test]
    fn payload_sends_null_for_empty_reference() {
        let meta = bank_account();
        let record = FormRecord::new(&meta);
        assert_eq!(record.to_payload(&meta)["bank"], Value::Null);
    }

    #[test]
    fn dotted_paths_reach_nested_values() {
        let meta = bank_account();
        let mut record = FormRecord::new(&meta);
        record.set_path("address.city", json!("Colombo"));
        assert_eq!(record.get_path("address.city"), &json!("Colombo"));
        assert_eq!(record.get_path("address.zip"), &Value::Null);
        record.set_path("accountNumber", json!("1234"));
        assert_eq!(record.get_path("accountNumber"), &json!("1234"));
    }

    #[test]
    fn validate_collects_all_fields() {
        let meta = bank_account();
        let mut record = FormRecord::new(&meta);
        record.set("accountNumber", json!("12"));
        let errors = record.validate(&meta).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.get("accountNumber").is_some());
        assert_eq!(errors.get("bank"), Some("Bank is required"));
    }
}
