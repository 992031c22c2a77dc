//! Record projections
//!
//! A [`Projection`] turns a JSON record into a display string or identifier.
//! Reference fields use one for labels and one for values; table columns may
//! use one for composite cells.

use crate::path::{display_string, identifier, lookup};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Closure form of a projection
pub type ProjectionFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Projection from a record to a string
#[derive(Clone)]
pub enum Projection {
    /// Dotted path into the record (`bank.name`)
    Path(String),
    /// Template with `{path}` placeholders (`"{firstName} {lastName}"`)
    Template(String),
    /// Arbitrary closure, only available from code
    Custom(ProjectionFn),
}

impl Projection {
    /// Path projection
    #[inline]
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// Template projection
    #[inline]
    #[must_use]
    pub fn template(template: impl Into<String>) -> Self {
        Self::Template(template.into())
    }

    /// Closure projection
    #[inline]
    #[must_use]
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Parse the textual form used in catalog files
    ///
    /// Anything containing `{` is a template, everything else a path.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        if source.contains('{') {
            Self::Template(source.to_string())
        } else {
            Self::Path(source.to_string())
        }
    }

    /// Apply the projection; `None` when nothing displayable was found
    #[must_use]
    pub fn project(&self, record: &Value) -> Option<String> {
        match self {
            Self::Path(path) => lookup(record, path)
                .map(display_string)
                .filter(|s| !s.is_empty()),
            Self::Template(template) => render_template(template, record),
            Self::Custom(f) => f(record),
        }
    }

    /// Apply the projection as an identifier
    ///
    /// Path projections normalize numeric ids, so `{"id": 42}` yields `"42"`.
    #[must_use]
    pub fn project_id(&self, record: &Value) -> Option<String> {
        match self {
            Self::Path(path) => lookup(record, path).and_then(identifier),
            _ => self.project(record),
        }
    }

    /// The dotted path, for path projections
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
            Self::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl<'de> Deserialize<'de> for Projection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Ok(Self::parse(&source))
    }
}

fn render_template(template: &str, record: &Value) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut filled = false;
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        if let Some(value) = lookup(record, after[..end].trim()) {
            let text = display_string(value);
            if !text.is_empty() {
                filled = true;
                out.push_str(&text);
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    // Placeholders that resolved to nothing leave doubled spaces behind
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    filled.then_some(collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_projection() {
        let record = json!({"name": "Commercial Bank"});
        assert_eq!(
            Projection::path("name").project(&record),
            Some("Commercial Bank".to_string())
        );
        assert_eq!(Projection::path("code").project(&record), None);
    }

    #[test]
    fn template_projection() {
        let record = json!({"firstName": "Ada", "lastName": "Lovelace", "dept": {"code": "R&D"}});
        let p = Projection::template("{firstName} {lastName} ({dept.code})");
        assert_eq!(p.project(&record), Some("Ada Lovelace (R&D)".to_string()));
    }

    #[test]
    fn template_with_missing_parts_collapses() {
        let record = json!({"lastName": "Lovelace"});
        let p = Projection::template("{firstName} {lastName}");
        assert_eq!(p.project(&record), Some("Lovelace".to_string()));
        assert_eq!(p.project(&json!({})), None);
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let record = json!({"a": "x"});
        let p = Projection::template("{a} {b");
        assert_eq!(p.project(&record), Some("x {b".to_string()));
    }

    #[test]
    fn project_id_normalizes_numbers() {
        let record = json!({"id": 42});
        assert_eq!(Projection::path("id").project_id(&record), Some("42".to_string()));
    }

    #[test]
    fn custom_projection() {
        let p = Projection::custom(|r| r.get("code").map(|c| format!("#{c}")));
        assert_eq!(p.project(&json!({"code": 7})), Some("#7".to_string()));
        assert_eq!(format!("{p:?}"), "Custom(<fn>)");
    }

    #[test]
    fn parse_distinguishes_templates() {
        assert!(matches!(Projection::parse("bank.name"), Projection::Path(_)));
        assert!(matches!(Projection::parse("{a} {b}"), Projection::Template(_)));
    }
}
