//! Response envelope handling
//!
//! List endpoints answer either with a bare array or with an object wrapping
//! the array under `data` or `items`. Single-record endpoints answer with the
//! object itself or with `{ "data": object }`.

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Expected shape of list responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeShape {
    /// Accept any of the shapes below, in that order
    #[default]
    Auto,
    /// Bare JSON array
    Array,
    /// `{ "data": [...] }`
    Data,
    /// `{ "items": [...] }`
    Items,
}

impl EnvelopeShape {
    /// Extract the record list from a list response
    pub fn extract_items(self, response: Value) -> Result<Vec<Value>, TransportError> {
        match (self, response) {
            (Self::Auto | Self::Array, Value::Array(items)) => Ok(items),
            (Self::Auto, Value::Object(mut map)) => {
                let data = map.remove("data").filter(Value::is_array);
                match data.or_else(|| map.remove("items")) {
                    Some(Value::Array(items)) => Ok(items),
                    _ => Err(TransportError::Envelope(
                        "expected an array or an object with a `data` or `items` array".into(),
                    )),
                }
            }
            (Self::Data, Value::Object(mut map)) => take_array(map.remove("data"), "data"),
            (Self::Items, Value::Object(mut map)) => take_array(map.remove("items"), "items"),
            (shape, other) => Err(TransportError::Envelope(format!(
                "expected {} response, got {}",
                shape.describe(),
                kind_of(&other)
            ))),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Auto => "an array or enveloped",
            Self::Array => "an array",
            Self::Data => "a `data` enveloped",
            Self::Items => "an `items` enveloped",
        }
    }
}

/// Extract a single record from a fetch-one or create response
///
/// `{ "data": {...} }` is unwrapped; any other object is the record itself.
pub fn extract_record(response: Value) -> Result<Value, TransportError> {
    match response {
        Value::Object(mut map) => match map.remove("data") {
            Some(inner @ Value::Object(_)) => Ok(inner),
            Some(other) => {
                map.insert("data".to_string(), other);
                Ok(Value::Object(map))
            }
            None => Ok(Value::Object(map)),
        },
        other => Err(TransportError::Envelope(format!(
            "expected an object, got {}",
            kind_of(&other)
        ))),
    }
}

fn take_array(value: Option<Value>, key: &str) -> Result<Vec<Value>, TransportError> {
    match value {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(TransportError::Envelope(format!("missing `{key}` array"))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
