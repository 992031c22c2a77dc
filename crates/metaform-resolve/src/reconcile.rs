//! Reference value reconciliation
//!
//! Turns the identifiers held in a form record into records for display,
//! consulting the cache first and initial display hints second.

use crate::cache::ReferenceCache;
use metaform_meta::path::{identifier, lookup};
use metaform_meta::ReferenceConfig;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Identifier → label hints supplied when an edit form opens
pub type HintMap = HashMap<String, String>;

/// Initial display hint for a reference value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayHint {
    /// Normalized identifier
    pub id: String,
    /// Label to show until the full record is known
    pub label: String,
}

impl DisplayHint {
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Parse `{ id, label }` or `{ id, name }`
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = identifier(value.get("id")?)?;
        let label = ["label", "name"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str))?;
        Some(Self::new(id, label))
    }

    /// Parse one hint object or an array of them, skipping malformed entries
    #[must_use]
    pub fn parse_many(value: &Value) -> Vec<Self> {
        match value {
            Value::Array(items) => items.iter().filter_map(Self::from_value).collect(),
            other => Self::from_value(other).into_iter().collect(),
        }
    }
}

/// Identifier of a record as stored in it, keeping numbers numeric
///
/// Only path projections can recover the raw value; other projections
/// yield `None`.
#[must_use]
pub fn id_value(config: &ReferenceConfig, record: &Value) -> Option<Value> {
    let path = config.value.as_path()?;
    lookup(record, path)
        .filter(|v| identifier(v).is_some())
        .cloned()
}

/// Resolve one identifier for display
///
/// Cache first; otherwise a hint is turned into a placeholder record which
/// is written into the cache. Unknown identifiers resolve to `None`.
#[must_use]
pub fn resolve_single(
    config: &ReferenceConfig,
    cache: &ReferenceCache,
    hints: &HintMap,
    value: &Value,
) -> Option<Value> {
    let id = identifier(value)?;
    if let Some(record) = cache.get(&id) {
        return Some(record);
    }
    let label = hints.get(&id)?;
    let placeholder = config.placeholder(&id, label);
    cache.insert_if_absent(id.clone(), placeholder);
    cache.get(&id)
}

/// Resolve an identifier list for display, in order
///
/// Unresolved identifiers are dropped from the result only; the value
/// itself is left untouched.
#[must_use]
pub fn resolve_many(
    config: &ReferenceConfig,
    cache: &ReferenceCache,
    hints: &HintMap,
    value: &Value,
) -> Vec<Value> {
    match value {
        Value::Array(ids) => ids
            .iter()
            .filter_map(|id| resolve_single(config, cache, hints, id))
            .collect(),
        Value::Null => Vec::new(),
        single => resolve_single(config, cache, hints, single).into_iter().collect(),
    }
}

/// Options to offer: fetched records first, then selected records not among them
#[must_use]
pub fn offered_options(config: &ReferenceConfig, fetched: &[Value], selected: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    fetched
        .iter()
        .chain(selected)
        .filter(|record| match config.id_of(record) {
            Some(id) => seen.insert(id),
            None => false,
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config() -> ReferenceConfig {
        ReferenceConfig::new("/banks")
    }

    #[test]
    fn hint_parsing() {
        assert_eq!(
            DisplayHint::from_value(&json!({"id": 42, "label": "Acme"})),
            Some(DisplayHint::new("42", "Acme"))
        );
        assert_eq!(
            DisplayHint::parse_many(&json!([{"id": "a", "name": "A"}, {"id": "b"}])),
            vec![DisplayHint::new("a", "A")]
        );
    }

    #[test]
    fn empty_value_resolves_to_none() {
        let cache = ReferenceCache::new();
        assert_eq!(resolve_single(&config(), &cache, &HintMap::new(), &json!(null)), None);
        assert_eq!(resolve_single(&config(), &cache, &HintMap::new(), &json!("")), None);
    }

    #[test]
    fn cache_wins_over_hint() {
        let cache = ReferenceCache::new();
        cache.insert("b1", json!({"id": "b1", "name": "Commercial Bank"}));
        let hints = HintMap::from([("b1".to_string(), "Stale".to_string())]);
        let record = resolve_single(&config(), &cache, &hints, &json!("b1")).unwrap();
        assert_eq!(config().label_of(&record), "Commercial Bank");
    }

    #[test]
    fn hint_becomes_cached_placeholder() {
        let cache = ReferenceCache::new();
        let hints = HintMap::from([("42".to_string(), "Acme".to_string())]);
        let record = resolve_single(&config(), &cache, &hints, &json!(42)).unwrap();
        assert_eq!(config().label_of(&record), "Acme");
        assert!(cache.contains("42"));
    }

    #[test]
    fn many_keeps_order_and_drops_unknown() {
        let cache = ReferenceCache::new();
        cache.insert("1", json!({"id": 1, "name": "One"}));
        cache.insert("3", json!({"id": 3, "name": "Three"}));
        let hints = HintMap::from([("2".to_string(), "Two".to_string())]);
        let labels: Vec<String> = resolve_many(&config(), &cache, &hints, &json!([3, 9, 2, 1]))
            .iter()
            .map(|r| config().label_of(r))
            .collect();
        assert_eq!(labels, vec!["Three", "Two", "One"]);
    }

    #[test]
    fn offered_options_union() {
        let fetched = vec![json!({"id": "b1", "name": "A"}), json!({"id": "b2", "name": "B"})];
        let selected = vec![json!({"id": "b2", "name": "B"}), json!({"id": "b9", "name": "Z"})];
        let ids: Vec<String> = offered_options(&config(), &fetched, &selected)
            .iter()
            .filter_map(|r| config().id_of(r))
            .collect();
        assert_eq!(ids, vec!["b1", "b2", "b9"]);
    }
}
