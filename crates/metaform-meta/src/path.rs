//! Dotted path access into JSON records
//!
//! Table columns and projections address nested relation objects with dotted
//! paths such as `bank.name`. Numeric segments index into arrays.

use serde_json::Value;

/// Look up a dotted path in a JSON value
///
/// An empty path returns the value itself.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Display text at a dotted path
///
/// Unlike [`lookup`], a non-numeric segment that lands on an array is applied
/// to every item, so `departments.title` over a list of departments renders
/// `Research, Ops`.
#[must_use]
pub fn display_at(value: &Value, path: &str) -> String {
    if path.is_empty() {
        return display_string(value);
    }
    let (segment, rest) = path.split_once('.').unwrap_or((path, ""));
    match value {
        Value::Object(map) => map
            .get(segment)
            .map(|next| display_at(next, rest))
            .unwrap_or_default(),
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => items
                .get(index)
                .map(|next| display_at(next, rest))
                .unwrap_or_default(),
            Err(_) => items
                .iter()
                .map(|item| display_at(item, path))
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        },
        _ => String::new(),
    }
}

/// Render a JSON value as display text
///
/// Null renders empty, strings render unquoted, arrays join their non-empty
/// items with `, `.
#[must_use]
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_string)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Normalize a scalar identifier to its string form
///
/// `42`, `"42"` and `" 42 "` are the same identifier. Blank strings, null and
/// composite values are not identifiers.
#[must_use]
pub fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether a value counts as "not filled in"
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
