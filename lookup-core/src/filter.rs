//! Filter parameter values for dependent lookups.
//!
//! Callers send filter parameters as loosely-typed JSON (`"US"`, `42`,
//! `true`, `null`). Both resolution strategies compare against the text form
//! of the stored column, so every value is reduced to one canonical text
//! before comparison and `2`, `"2"` match the same rows.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::ValidationError;

/// A filter parameter value: string, number, boolean or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FilterValue {
    /// JSON `null`; matches rows whose filter column is absent.
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

impl FilterValue {
    /// Canonical text used for comparison, `None` for null.
    ///
    /// Booleans are `true`/`false`, numbers use their JSON rendering (so
    /// integers carry no fractional part), strings are taken verbatim.
    pub fn canonical(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }

    /// Convert an arbitrary JSON value, rejecting arrays and objects.
    pub fn from_json(name: &str, value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => Ok(Self::Number(n.clone())),
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(ValidationError::InvalidParameter {
                name: name.to_string(),
                reason: "expected a string, number, boolean or null".to_string(),
            }),
        }
    }

    /// Whether a stored filter value (text form, `None` when the column is
    /// null) matches this parameter.
    pub fn matches(&self, stored: Option<&str>) -> bool {
        match (self, stored) {
            (Self::Null, None) => true,
            (Self::Null, Some(_)) | (_, None) => false,
            (Self::Text(s), Some(stored)) => s == stored,
            (other, Some(stored)) => other.canonical().as_deref() == Some(stored),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.canonical() {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<u64> for FilterValue {
    fn from(value: u64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<f64> for FilterValue {
    /// Non-finite floats have no JSON form and become null.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_forms() {
        assert_eq!(FilterValue::from(true).canonical().as_deref(), Some("true"));
        assert_eq!(FilterValue::from(false).canonical().as_deref(), Some("false"));
        assert_eq!(FilterValue::from(42i64).canonical().as_deref(), Some("42"));
        assert_eq!(FilterValue::from(-7i64).canonical().as_deref(), Some("-7"));
        assert_eq!(FilterValue::from(2.5f64).canonical().as_deref(), Some("2.5"));
        assert_eq!(FilterValue::from("US").canonical().as_deref(), Some("US"));
        assert_eq!(FilterValue::Null.canonical(), None);
        assert_eq!(FilterValue::from(f64::NAN), FilterValue::Null);
    }

    #[test]
    fn test_deserialize_untagged() {
        let values: Vec<FilterValue> =
            serde_json::from_str(r#"["US", 12, true, null, 1.5]"#).unwrap();
        assert_eq!(
            values,
            vec![
                FilterValue::Text("US".to_string()),
                FilterValue::from(12i64),
                FilterValue::Bool(true),
                FilterValue::Null,
                FilterValue::from(1.5f64),
            ]
        );
    }

    #[test]
    fn test_deserialize_rejects_structures() {
        assert!(serde_json::from_str::<FilterValue>("[1, 2]").is_err());
        assert!(serde_json::from_str::<FilterValue>(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn test_from_json_rejects_structures() {
        let err = FilterValue::from_json("CountryId", &serde_json::json!([1])).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidParameter { .. }));
        assert_eq!(
            FilterValue::from_json("CountryId", &serde_json::json!(3)).unwrap(),
            FilterValue::from(3i64)
        );
    }

    #[test]
    fn test_matches_across_representations() {
        assert!(FilterValue::from(1i64).matches(Some("1")));
        assert!(FilterValue::from("1").matches(Some("1")));
        assert!(FilterValue::from(true).matches(Some("true")));
        assert!(FilterValue::from("true").matches(Some("true")));
        assert!(!FilterValue::from(1i64).matches(Some("01")));
        assert!(!FilterValue::from("US").matches(None));
    }

    #[test]
    fn test_null_matches_only_absent() {
        assert!(FilterValue::Null.matches(None));
        assert!(!FilterValue::Null.matches(Some("")));
        assert!(!FilterValue::Null.matches(Some("null")));
    }

    proptest! {
        #[test]
        fn prop_integer_and_text_forms_agree(n in any::<i64>()) {
            let stored = n.to_string();
            prop_assert!(FilterValue::from(n).matches(Some(&stored)));
            prop_assert!(FilterValue::from(stored.clone()).matches(Some(&stored)));
            prop_assert_eq!(FilterValue::from(n).canonical(), Some(stored));
        }

        #[test]
        fn prop_bool_and_text_forms_agree(b in any::<bool>()) {
            let stored = b.to_string();
            prop_assert!(FilterValue::from(b).matches(Some(&stored)));
            prop_assert!(FilterValue::from(stored.as_str()).matches(Some(&stored)));
        }

        #[test]
        fn prop_json_roundtrip_preserves_canonical(s in "[A-Za-z0-9 ]{0,12}") {
            let value = FilterValue::from(s.as_str());
            let json = serde_json::to_string(&value).unwrap();
            let back: FilterValue = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back.canonical(), Some(s));
        }
    }
}
