//! Field validation rules
//!
//! A [`Validation`] is a set of [`Rule`]s plus an optional message that
//! replaces the rule-specific defaults. Rules skip blank values; whether a
//! value is required is a property of the field, not of its rules.

use crate::path::is_blank;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Closure form of a validation predicate
pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Single validation constraint
#[derive(Clone)]
pub enum Rule {
    /// Minimum text length in characters
    MinLength(usize),
    /// Maximum text length in characters
    MaxLength(usize),
    /// Text must match the regex
    Pattern(Regex),
    /// Numeric value within inclusive bounds
    Range {
        /// Lower bound
        min: Option<f64>,
        /// Upper bound
        max: Option<f64>,
    },
    /// Arbitrary predicate
    Custom(PredicateFn),
    /// Pattern that failed to compile; reported when the entity is built
    InvalidPattern {
        /// Pattern source
        pattern: String,
        /// Compiler message
        reason: String,
    },
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinLength(n) => f.debug_tuple("MinLength").field(n).finish(),
            Self::MaxLength(n) => f.debug_tuple("MaxLength").field(n).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(<fn>)"),
            Self::InvalidPattern { pattern, .. } => {
                f.debug_tuple("InvalidPattern").field(pattern).finish()
            }
        }
    }
}

impl Rule {
    /// Check the rule against a non-blank value
    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::MinLength(min) => match text_len(value) {
                Some(len) if len < *min => Err(format!("must be at least {min} characters")),
                _ => Ok(()),
            },
            Self::MaxLength(max) => match text_len(value) {
                Some(len) if len > *max => Err(format!("must be at most {max} characters")),
                _ => Ok(()),
            },
            Self::Pattern(re) => match value.as_str() {
                Some(text) if !re.is_match(text) => Err("has an invalid format".to_string()),
                _ => Ok(()),
            },
            Self::Range { min, max } => {
                let Some(n) = as_number(value) else {
                    return Err("must be a number".to_string());
                };
                if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                    Err(range_message(*min, *max))
                } else {
                    Ok(())
                }
            }
            Self::Custom(predicate) => {
                if predicate(value) {
                    Ok(())
                } else {
                    Err("is invalid".to_string())
                }
            }
            Self::InvalidPattern { .. } => Ok(()),
        }
    }
}

/// Definition problem found in a validation rule set
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionIssue {
    /// A pattern did not compile
    InvalidPattern {
        /// Pattern source
        pattern: String,
        /// Compiler message
        reason: String,
    },
    /// A range has `min > max`
    InvalidRange {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
}

/// Constraint set plus optional error message
#[derive(Debug, Clone, Default)]
pub struct Validation {
    rules: Vec<Rule>,
    message: Option<String>,
}

impl Validation {
    /// Empty validation (always passes)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add minimum length
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.rules.push(Rule::MinLength(min));
        self
    }

    /// Add maximum length
    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.rules.push(Rule::MaxLength(max));
        self
    }

    /// Add regex pattern
    ///
    /// A pattern that does not compile is kept as a definition issue and
    /// rejected when the owning entity is built.
    #[must_use]
    pub fn pattern(mut self, pattern: &str) -> Self {
        let rule = match Regex::new(pattern) {
            Ok(re) => Rule::Pattern(re),
            Err(err) => Rule::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            },
        };
        self.rules.push(rule);
        self
    }

    /// Add inclusive numeric range
    #[must_use]
    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.rules.push(Rule::Range { min, max });
        self
    }

    /// Add custom predicate
    #[must_use]
    pub fn custom<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule::Custom(Arc::new(predicate)));
        self
    }

    /// Replace rule-specific messages with a single message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Rules in declaration order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Configured message, if any
    #[inline]
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether no rules are configured
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First definition problem in this rule set
    #[must_use]
    pub fn definition_issue(&self) -> Option<DefinitionIssue> {
        self.rules.iter().find_map(|rule| match rule {
            Rule::InvalidPattern { pattern, reason } => Some(DefinitionIssue::InvalidPattern {
                pattern: pattern.clone(),
                reason: reason.clone(),
            }),
            Rule::Range {
                min: Some(min),
                max: Some(max),
            } if min > max => Some(DefinitionIssue::InvalidRange {
                min: *min,
                max: *max,
            }),
            _ => None,
        })
    }

    /// Check a value; blank values always pass
    ///
    /// Returns the configured message, or the first failing rule's default.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if is_blank(value) {
            return Ok(());
        }
        for rule in &self.rules {
            if let Err(default) = rule.check(value) {
                return Err(self.message.clone().unwrap_or(default));
            }
        }
        Ok(())
    }
}

/// Field-scoped validation errors keyed by field path
///
/// Nested object fields use dotted keys (`address.city`). Insertion order
/// follows field declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: IndexMap<String, String>,
}

impl ValidationErrors {
    /// Empty error set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; the first error for a field wins
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Error for one field
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    /// Drop the error for one field
    pub fn clear_field(&mut self, field: &str) {
        self.errors.shift_remove(field);
        let prefix = format!("{field}.");
        self.errors.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Merge another set into this one
    pub fn extend(&mut self, other: ValidationErrors) {
        for (field, message) in other.errors {
            self.insert(field, message);
        }
    }

    /// Whether no errors were recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate `(field, message)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Convert to `Result`, `Ok` when empty
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn text_len(value: &Value) -> Option<usize> {
    value.as_str().map(|s| s.chars().count())
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn range_message(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("must be between {min} and {max}"),
        (Some(min), None) => format!("must be at least {min}"),
        (None, Some(max)) => format!("must be at most {max}"),
        (None, None) => "is out of range".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn length_rules() {
        let v = Validation::new().min_length(3).max_length(5);
        assert!(v.check(&json!("abc")).is_ok());
        assert_eq!(
            v.check(&json!("ab")).unwrap_err(),
            "must be at least 3 characters"
        );
        assert!(v.check(&json!("abcdef")).is_err());
    }

    #[test]
    fn blank_values_pass() {
        let v = Validation::new().min_length(3);
        assert!(v.check(&json!("")).is_ok());
        assert!(v.check(&json!(null)).is_ok());
    }

    #[test]
    fn pattern_rule() {
        let v = Validation::new().pattern(r"^\d{4}$");
        assert!(v.check(&json!("1234")).is_ok());
        assert!(v.check(&json!("12a4")).is_err());
        assert!(v.definition_issue().is_none());
    }

    #[test]
    fn invalid_pattern_is_definition_issue() {
        let v = Validation::new().pattern("([");
        assert!(matches!(
            v.definition_issue(),
            Some(DefinitionIssue::InvalidPattern { .. })
        ));
    }

    #[test]
    fn range_rule_accepts_numeric_strings() {
        let v = Validation::new().range(Some(0.0), Some(100.0));
        assert!(v.check(&json!(50)).is_ok());
        assert!(v.check(&json!("75.5")).is_ok());
        assert_eq!(v.check(&json!(101)).unwrap_err(), "must be between 0 and 100");
        assert_eq!(v.check(&json!("abc")).unwrap_err(), "must be a number");
    }

    #[test]
    fn inverted_range_is_definition_issue() {
        let v = Validation::new().range(Some(5.0), Some(1.0));
        assert_eq!(
            v.definition_issue(),
            Some(DefinitionIssue::InvalidRange { min: 5.0, max: 1.0 })
        );
    }

    #[test]
    fn custom_message_overrides_defaults() {
        let v = Validation::new()
            .custom(|v| v.as_str().is_some_and(|s| s.starts_with("IBAN")))
            .with_message("Enter a valid IBAN");
        assert_eq!(v.check(&json!("XX12")).unwrap_err(), "Enter a valid IBAN");
        assert!(v.check(&json!("IBAN123")).is_ok());
    }

    #[test]
    fn errors_keep_first_message_and_clear_nested() {
        let mut errors = ValidationErrors::new();
        errors.insert("name", "first");
        errors.insert("name", "second");
        errors.insert("address.city", "required");
        assert_eq!(errors.get("name"), Some("first"));

        errors.clear_field("address");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.to_string(), "name: first");
    }

    proptest! {
        #[test]
        fn prop_min_length_matches_char_count(text in "\\PC{0,20}", min in 0usize..10) {
            let v = Validation::new().min_length(min);
            let value = json!(text.clone());
            let blank = text.trim().is_empty();
            let ok = v.check(&value).is_ok();
            prop_assert_eq!(ok, blank || text.chars().count() >= min);
        }
    }
}
