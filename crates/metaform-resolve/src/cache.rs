//! Reference resolution cache
//!
//! Maps normalized identifiers to the last fully-known record. Entries can be
//! replaced by fresher records but never removed; the type has no removal
//! operation. A cache belongs to one reference field of one open form.

use dashmap::DashMap;
use metaform_meta::path::identifier;
use metaform_meta::ReferenceConfig;
use serde_json::Value;
use std::sync::Arc;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of identifiers known
    pub entry_count: usize,
    /// Entries that are still display-hint placeholders
    pub placeholder_count: usize,
}

/// Append-only identifier → record cache
///
/// Cloning yields another handle to the same entries.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    inner: Arc<DashMap<String, Value>>,
}

impl ReferenceCache {
    /// Empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or refresh the record for an identifier
    pub fn insert(&self, id: impl Into<String>, record: Value) {
        self.inner.insert(id.into(), record);
    }

    /// Store a record only when the identifier is unknown
    ///
    /// Returns whether the record was stored. Used for display-hint
    /// placeholders, which must never shadow a real record.
    pub fn insert_if_absent(&self, id: impl Into<String>, record: Value) -> bool {
        let mut stored = false;
        self.inner.entry(id.into()).or_insert_with(|| {
            stored = true;
            record
        });
        stored
    }

    /// Store every record that yields an identifier through `config`
    ///
    /// Returns how many records were stored.
    pub fn insert_records<'a>(
        &self,
        config: &ReferenceConfig,
        records: impl IntoIterator<Item = &'a Value>,
    ) -> usize {
        let mut stored = 0;
        for record in records {
            if let Some(id) = config.id_of(record) {
                self.insert(id, record.clone());
                stored += 1;
            }
        }
        stored
    }

    /// Record for an identifier
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Value> {
        self.inner.get(id).map(|entry| entry.value().clone())
    }

    /// Record for an identifier held as a JSON value (`42` or `"42"`)
    #[must_use]
    pub fn get_value(&self, id: &Value) -> Option<Value> {
        identifier(id).and_then(|id| self.get(&id))
    }

    /// Whether an identifier is known
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    /// Number of identifiers known
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of the known identifiers
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.len(),
            placeholder_count: self
                .inner
                .iter()
                .filter(|entry| ReferenceConfig::is_placeholder(entry.value()))
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_replaces_but_keeps_identifier() {
        let cache = ReferenceCache::new();
        cache.insert("b1", json!({"id": "b1", "name": "Old"}));
        cache.insert("b1", json!({"id": "b1", "name": "New"}));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b1").unwrap()["name"], "New");
    }

    #[test]
    fn placeholders_never_shadow_records() {
        let cache = ReferenceCache::new();
        cache.insert("42", json!({"id": 42, "name": "Acme Corp"}));
        assert!(!cache.insert_if_absent("42", json!({"id": "42", "$label": "Acme"})));
        assert_eq!(cache.get("42").unwrap()["name"], "Acme Corp");
        assert!(cache.insert_if_absent("43", json!({"id": "43", "$label": "Other"})));
        assert_eq!(cache.stats().placeholder_count, 1);
    }

    #[test]
    fn numeric_and_string_ids_match() {
        let cache = ReferenceCache::new();
        let config = ReferenceConfig::new("/employees");
        assert_eq!(cache.insert_records(&config, &[json!({"id": 7}), json!({"name": "no id"})]), 1);
        assert!(cache.get_value(&json!(7)).is_some());
        assert!(cache.get_value(&json!("7")).is_some());
    }

    #[test]
    fn clones_share_entries() {
        let cache = ReferenceCache::new();
        let other = cache.clone();
        other.insert("x", json!({"id": "x"}));
        assert!(cache.contains("x"));
    }
}
